//! The world-state interface consumed by the interpreter, and an
//! in-memory journalled implementation of it.
//!
//! The production store (Merkle trie, persistence) is a collaborator;
//! [`MemoryState`] is the reference implementation used by the test
//! suite and by embedders that don't need a trie.

use alloy_primitives::{keccak256, Address, B256, U256};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use super::log::Log;

/// The keccak256 hash of the empty byte slice, i.e. the code hash of an
/// account with no code.
pub const KECCAK256_EMPTY: B256 = B256::new([
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03,
    0xc0, 0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85,
    0xa4, 0x70,
]);

/// The state operations the execution engine needs. Mutations are
/// buffered by the implementation and either kept on clean return or
/// rewound via [`StateDB::revert_to_snapshot`].
pub trait StateDB {
    fn get_balance(&self, addr: Address) -> U256;
    fn add_balance(&mut self, addr: Address, amount: U256);
    fn sub_balance(&mut self, addr: Address, amount: U256);

    fn get_nonce(&self, addr: Address) -> u64;
    fn set_nonce(&mut self, addr: Address, nonce: u64);

    fn get_code(&self, addr: Address) -> Vec<u8>;
    fn set_code(&mut self, addr: Address, code: Vec<u8>);
    fn get_code_hash(&self, addr: Address) -> B256;
    fn get_code_size(&self, addr: Address) -> usize;

    fn get_state(&self, addr: Address, key: B256) -> B256;
    fn set_state(&mut self, addr: Address, key: B256, value: B256);

    /// Whether the account exists in state.
    fn exist(&self, addr: Address) -> bool;
    /// Whether the account is empty: zero nonce, zero balance, no code.
    fn empty(&self, addr: Address) -> bool;

    /// Marks the account self-destructed and zeroes its balance. Returns
    /// false if the account does not exist.
    fn suicide(&mut self, addr: Address) -> bool;
    fn has_suicided(&self, addr: Address) -> bool;

    fn add_log(&mut self, log: Log);
    fn add_preimage(&mut self, hash: B256, preimage: Vec<u8>);

    fn add_refund(&mut self, gas: u64);
    fn get_refund(&self) -> u64;

    /// Returns an opaque token permitting a bulk rewind of every mutation
    /// made after this point.
    fn snapshot(&mut self) -> usize;
    fn revert_to_snapshot(&mut self, id: usize);
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Account {
    balance: U256,
    nonce: u64,
    code: Vec<u8>,
    storage: HashMap<B256, B256>,
    suicided: bool,
}

/// One undo step. Entries are appended as mutations happen and unwound
/// in reverse on revert.
#[derive(Clone, Debug)]
enum JournalEntry {
    AccountCreated { addr: Address },
    BalanceChange { addr: Address, prev: U256 },
    NonceChange { addr: Address, prev: u64 },
    CodeChange { addr: Address, prev: Vec<u8> },
    StorageChange { addr: Address, key: B256, prev: Option<B256> },
    SuicideChange { addr: Address, prev_suicided: bool, prev_balance: U256 },
    RefundChange { prev: u64 },
    LogAdded,
    PreimageAdded { hash: B256 },
}

/// An in-memory, journalled [`StateDB`].
#[derive(Clone, Debug, Default)]
pub struct MemoryState {
    accounts: HashMap<Address, Account>,
    journal: Vec<JournalEntry>,
    logs: Vec<Log>,
    preimages: HashMap<B256, Vec<u8>>,
    refund: u64,
}

impl MemoryState {
    /// Creates an empty state.
    pub fn new() -> MemoryState {
        MemoryState::default()
    }

    /// Creates the account if it is not yet present, journalling the
    /// creation so a revert removes it again.
    fn ensure_account(&mut self, addr: Address) -> &mut Account {
        if !self.accounts.contains_key(&addr) {
            self.journal.push(JournalEntry::AccountCreated { addr });
        }
        self.accounts.entry(addr).or_default()
    }

    /// Logs accumulated by the executed transaction, in emission order.
    pub fn logs(&self) -> &[Log] {
        &self.logs
    }

    /// Recorded SHA3 preimages, if preimage recording was enabled.
    pub fn preimages(&self) -> &HashMap<B256, Vec<u8>> {
        &self.preimages
    }

    fn undo(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::AccountCreated { addr } => {
                self.accounts.remove(&addr);
            }
            JournalEntry::BalanceChange { addr, prev } => {
                if let Some(acc) = self.accounts.get_mut(&addr) {
                    acc.balance = prev;
                }
            }
            JournalEntry::NonceChange { addr, prev } => {
                if let Some(acc) = self.accounts.get_mut(&addr) {
                    acc.nonce = prev;
                }
            }
            JournalEntry::CodeChange { addr, prev } => {
                if let Some(acc) = self.accounts.get_mut(&addr) {
                    acc.code = prev;
                }
            }
            JournalEntry::StorageChange { addr, key, prev } => {
                if let Some(acc) = self.accounts.get_mut(&addr) {
                    match prev {
                        Some(prev) => {
                            acc.storage.insert(key, prev);
                        }
                        None => {
                            acc.storage.remove(&key);
                        }
                    }
                }
            }
            JournalEntry::SuicideChange { addr, prev_suicided, prev_balance } => {
                if let Some(acc) = self.accounts.get_mut(&addr) {
                    acc.suicided = prev_suicided;
                    acc.balance = prev_balance;
                }
            }
            JournalEntry::RefundChange { prev } => {
                self.refund = prev;
            }
            JournalEntry::LogAdded => {
                self.logs.pop();
            }
            JournalEntry::PreimageAdded { hash } => {
                self.preimages.remove(&hash);
            }
        }
    }

    /// Dumps every account into a JSON-marshallable structure.
    pub fn raw_dump(&self) -> Dump {
        let mut accounts = HashMap::new();
        for (addr, acc) in &self.accounts {
            let mut storage = HashMap::new();
            for (key, value) in &acc.storage {
                storage.insert(format!("{key:x}"), format!("{value:x}"));
            }
            accounts.insert(
                format!("{addr:x}"),
                DumpAccount {
                    balance: acc.balance.to_string(),
                    nonce: acc.nonce,
                    root: format!("{:x}", B256::ZERO),
                    code_hash: format!("{:x}", keccak256(&acc.code)),
                    code: alloy_primitives::hex::encode(&acc.code),
                    storage,
                },
            );
        }
        Dump { root: format!("{:x}", B256::ZERO), accounts }
    }

    /// Dumps the state as indented JSON.
    pub fn dump(&self) -> Vec<u8> {
        serde_json::to_vec_pretty(&self.raw_dump()).unwrap_or_default()
    }
}

/// JSON shape of a single dumped account.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DumpAccount {
    pub balance: String,
    pub nonce: u64,
    pub root: String,
    #[serde(rename = "codeHash")]
    pub code_hash: String,
    pub code: String,
    pub storage: HashMap<String, String>,
}

/// JSON shape of a full state dump.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Dump {
    pub root: String,
    pub accounts: HashMap<String, DumpAccount>,
}

impl StateDB for MemoryState {
    fn get_balance(&self, addr: Address) -> U256 {
        self.accounts.get(&addr).map(|a| a.balance).unwrap_or_default()
    }

    fn add_balance(&mut self, addr: Address, amount: U256) {
        let acc = self.ensure_account(addr);
        let prev = acc.balance;
        acc.balance = prev.overflowing_add(amount).0;
        self.journal.push(JournalEntry::BalanceChange { addr, prev });
    }

    fn sub_balance(&mut self, addr: Address, amount: U256) {
        let acc = self.ensure_account(addr);
        let prev = acc.balance;
        acc.balance = prev.overflowing_sub(amount).0;
        self.journal.push(JournalEntry::BalanceChange { addr, prev });
    }

    fn get_nonce(&self, addr: Address) -> u64 {
        self.accounts.get(&addr).map(|a| a.nonce).unwrap_or_default()
    }

    fn set_nonce(&mut self, addr: Address, nonce: u64) {
        let acc = self.ensure_account(addr);
        let prev = acc.nonce;
        acc.nonce = nonce;
        self.journal.push(JournalEntry::NonceChange { addr, prev });
    }

    fn get_code(&self, addr: Address) -> Vec<u8> {
        self.accounts.get(&addr).map(|a| a.code.clone()).unwrap_or_default()
    }

    fn set_code(&mut self, addr: Address, code: Vec<u8>) {
        let acc = self.ensure_account(addr);
        let prev = std::mem::replace(&mut acc.code, code);
        self.journal.push(JournalEntry::CodeChange { addr, prev });
    }

    fn get_code_hash(&self, addr: Address) -> B256 {
        match self.accounts.get(&addr) {
            Some(acc) if acc.code.is_empty() => KECCAK256_EMPTY,
            Some(acc) => keccak256(&acc.code),
            None => B256::ZERO,
        }
    }

    fn get_code_size(&self, addr: Address) -> usize {
        self.accounts.get(&addr).map(|a| a.code.len()).unwrap_or_default()
    }

    fn get_state(&self, addr: Address, key: B256) -> B256 {
        self.accounts
            .get(&addr)
            .and_then(|a| a.storage.get(&key).copied())
            .unwrap_or_default()
    }

    fn set_state(&mut self, addr: Address, key: B256, value: B256) {
        let acc = self.ensure_account(addr);
        let prev = acc.storage.insert(key, value);
        self.journal.push(JournalEntry::StorageChange { addr, key, prev });
    }

    fn exist(&self, addr: Address) -> bool {
        self.accounts.contains_key(&addr)
    }

    fn empty(&self, addr: Address) -> bool {
        match self.accounts.get(&addr) {
            Some(acc) => acc.nonce == 0 && acc.balance.is_zero() && acc.code.is_empty(),
            None => true,
        }
    }

    fn suicide(&mut self, addr: Address) -> bool {
        match self.accounts.get_mut(&addr) {
            Some(acc) => {
                self.journal.push(JournalEntry::SuicideChange {
                    addr,
                    prev_suicided: acc.suicided,
                    prev_balance: acc.balance,
                });
                acc.suicided = true;
                acc.balance = U256::ZERO;
                true
            }
            None => false,
        }
    }

    fn has_suicided(&self, addr: Address) -> bool {
        self.accounts.get(&addr).map(|a| a.suicided).unwrap_or(false)
    }

    fn add_log(&mut self, log: Log) {
        self.journal.push(JournalEntry::LogAdded);
        self.logs.push(log);
    }

    fn add_preimage(&mut self, hash: B256, preimage: Vec<u8>) {
        if !self.preimages.contains_key(&hash) {
            self.journal.push(JournalEntry::PreimageAdded { hash });
            self.preimages.insert(hash, preimage);
        }
    }

    fn add_refund(&mut self, gas: u64) {
        self.journal.push(JournalEntry::RefundChange { prev: self.refund });
        self.refund += gas;
    }

    fn get_refund(&self) -> u64 {
        self.refund
    }

    fn snapshot(&mut self) -> usize {
        self.journal.len()
    }

    fn revert_to_snapshot(&mut self, id: usize) {
        while self.journal.len() > id {
            if let Some(entry) = self.journal.pop() {
                self.undo(entry);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::with_last_byte(n)
    }

    #[test]
    fn test_balance_journal() {
        let mut state = MemoryState::new();
        state.add_balance(addr(1), U256::from(100));
        let snap = state.snapshot();
        state.sub_balance(addr(1), U256::from(40));
        assert_eq!(state.get_balance(addr(1)), U256::from(60));
        state.revert_to_snapshot(snap);
        assert_eq!(state.get_balance(addr(1)), U256::from(100));
    }

    #[test]
    fn test_revert_removes_created_account() {
        let mut state = MemoryState::new();
        let snap = state.snapshot();
        state.add_balance(addr(2), U256::from(1));
        assert!(state.exist(addr(2)));
        state.revert_to_snapshot(snap);
        assert!(!state.exist(addr(2)));
    }

    #[test]
    fn test_storage_journal() {
        let mut state = MemoryState::new();
        let key = B256::with_last_byte(1);
        state.set_state(addr(1), key, B256::with_last_byte(0xaa));
        let snap = state.snapshot();
        state.set_state(addr(1), key, B256::with_last_byte(0xbb));
        state.set_state(addr(1), B256::with_last_byte(2), B256::with_last_byte(0xcc));
        state.revert_to_snapshot(snap);
        assert_eq!(state.get_state(addr(1), key), B256::with_last_byte(0xaa));
        assert_eq!(state.get_state(addr(1), B256::with_last_byte(2)), B256::ZERO);
    }

    #[test]
    fn test_nested_snapshots() {
        let mut state = MemoryState::new();
        state.add_balance(addr(1), U256::from(1));
        let outer = state.snapshot();
        state.add_balance(addr(1), U256::from(1));
        let inner = state.snapshot();
        state.add_balance(addr(1), U256::from(1));
        state.revert_to_snapshot(inner);
        assert_eq!(state.get_balance(addr(1)), U256::from(2));
        state.revert_to_snapshot(outer);
        assert_eq!(state.get_balance(addr(1)), U256::from(1));
    }

    #[test]
    fn test_suicide_zeroes_balance_and_reverts() {
        let mut state = MemoryState::new();
        state.add_balance(addr(3), U256::from(55));
        let snap = state.snapshot();
        assert!(state.suicide(addr(3)));
        assert!(state.has_suicided(addr(3)));
        assert_eq!(state.get_balance(addr(3)), U256::ZERO);
        state.revert_to_snapshot(snap);
        assert!(!state.has_suicided(addr(3)));
        assert_eq!(state.get_balance(addr(3)), U256::from(55));
    }

    #[test]
    fn test_suicide_on_missing_account() {
        let mut state = MemoryState::new();
        assert!(!state.suicide(addr(9)));
    }

    #[test]
    fn test_code_hash_cases() {
        let mut state = MemoryState::new();
        assert_eq!(state.get_code_hash(addr(1)), B256::ZERO);
        state.add_balance(addr(1), U256::from(1));
        assert_eq!(state.get_code_hash(addr(1)), KECCAK256_EMPTY);
        state.set_code(addr(1), vec![0x60, 0x00]);
        assert_eq!(state.get_code_hash(addr(1)), keccak256([0x60, 0x00]));
        assert_eq!(state.get_code_size(addr(1)), 2);
    }

    #[test]
    fn test_empty_and_exist() {
        let mut state = MemoryState::new();
        assert!(state.empty(addr(1)));
        assert!(!state.exist(addr(1)));
        state.set_nonce(addr(1), 0);
        assert!(state.empty(addr(1)));
        assert!(state.exist(addr(1)));
        state.set_nonce(addr(1), 1);
        assert!(!state.empty(addr(1)));
    }

    #[test]
    fn test_logs_and_refund_revert() {
        let mut state = MemoryState::new();
        let snap = state.snapshot();
        state.add_log(Log { address: addr(1), ..Default::default() });
        state.add_refund(15000);
        assert_eq!(state.logs().len(), 1);
        assert_eq!(state.get_refund(), 15000);
        state.revert_to_snapshot(snap);
        assert!(state.logs().is_empty());
        assert_eq!(state.get_refund(), 0);
    }

    #[test]
    fn test_dump_shape() {
        let mut state = MemoryState::new();
        state.add_balance(addr(1), U256::from(42));
        state.set_code(addr(1), vec![0x60, 0x00]);
        state.set_state(addr(1), B256::with_last_byte(1), B256::with_last_byte(2));

        let dump = state.raw_dump();
        assert_eq!(dump.accounts.len(), 1);
        let account = dump.accounts.values().next().expect("one account");
        assert_eq!(account.balance, "42");
        assert_eq!(account.code, "6000");
        assert_eq!(account.storage.len(), 1);

        let json: serde_json::Value =
            serde_json::from_slice(&state.dump()).expect("dump is valid json");
        assert!(json.get("accounts").is_some());
    }
}
