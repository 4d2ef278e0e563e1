//! The EVM facade: call, callcode, delegatecall, staticcall, create,
//! and create2.
//!
//! The facade owns everything that spans frames: the block and
//! transaction context, the state store handle, the active rule set and
//! instruction table, the shared return-data buffer, and the abort flag.
//! Nested calls re-enter here, incrementing the depth and recursing on
//! the same thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy_primitives::{keccak256, Address, B256, U256};
use kunlun_params::protocol::{CALL_CREATE_DEPTH, CREATE_DATA_GAS, MAX_CODE_SIZE, NUWA_MAX_CODE_SIZE};
use kunlun_params::{ChainConfig, GasTable, Rules};
use tracing::debug;

use super::contract::Contract;
use super::errors::VmError;
use super::interpreter::{Config, Interpreter};
use super::jump_table::{JumpTable, FUXI_INSTRUCTION_SET, PANGU_INSTRUCTION_SET};
use super::precompiles::{self, PrecompiledContracts};
use super::state::{StateDB, KECCAK256_EMPTY};

/// Immutable block and transaction context consumed by opcodes.
pub struct Context {
    /// Sender of the top-level transaction.
    pub origin: Address,
    /// Gas price of the transaction.
    pub gas_price: U256,
    /// Block beneficiary.
    pub coinbase: Address,
    /// Block gas limit.
    pub gas_limit: U256,
    /// Current block number.
    pub block_number: U256,
    /// Block timestamp.
    pub time: U256,
    /// Block difficulty.
    pub difficulty: U256,
    /// Resolves one of the most recent 256 block numbers to its hash.
    pub get_hash: Box<dyn Fn(u64) -> B256 + Send + Sync>,
    /// Hash of the message being executed, if any.
    pub msg_hash: Option<B256>,
}

impl Default for Context {
    fn default() -> Context {
        Context {
            origin: Address::ZERO,
            gas_price: U256::ZERO,
            coinbase: Address::ZERO,
            gas_limit: U256::ZERO,
            block_number: U256::ZERO,
            time: U256::ZERO,
            difficulty: U256::ZERO,
            get_hash: Box::new(|_| B256::ZERO),
            msg_hash: None,
        }
    }
}

/// Whether the account has enough balance for the transfer.
fn can_transfer(state: &dyn StateDB, addr: Address, amount: &U256) -> bool {
    state.get_balance(addr) >= *amount
}

/// Moves value between accounts. Creating the recipient, if needed, is
/// the store's concern.
fn transfer(state: &mut dyn StateDB, sender: Address, recipient: Address, amount: U256) {
    state.sub_balance(sender, amount);
    state.add_balance(recipient, amount);
}

/// One EVM instance per executed message. Not reentrant; nested calls
/// recurse through the facade methods.
pub struct Evm<'a> {
    /// Block and transaction context.
    pub context: Context,
    /// The world-state store.
    pub state: &'a mut dyn StateDB,
    /// Chain configuration the rules were derived from.
    pub chain_config: &'a ChainConfig,
    /// Rule set active at the current block.
    pub chain_rules: Rules,
    /// Interpreter options.
    pub vm_config: Config,
    /// Gas table active at the current block.
    pub gas_table: GasTable,
    /// The instruction set selected from the rules (or overridden).
    pub(crate) table: JumpTable,
    /// Current call depth, bounded at 1024.
    pub depth: usize,
    /// Set while executing a STATICCALL descendant.
    pub read_only: bool,
    /// The last call's return data, owned here and borrowed by the
    /// RETURNDATASIZE/RETURNDATACOPY opcodes.
    pub return_data: Vec<u8>,
    /// The 63/64-capped gas recorded by the call-family gas calculators
    /// for the opcode body to forward.
    pub call_gas_temp: u64,
    /// Cooperative cancellation flag, checked once per opcode.
    abort: Arc<AtomicBool>,
    /// Precompiled contracts active under the current rules.
    precompiles: &'static PrecompiledContracts,
}

impl<'a> Evm<'a> {
    /// Creates an EVM for one message execution. The instruction set and
    /// precompile set are selected from the chain rules at the context's
    /// block number.
    pub fn new(
        context: Context,
        state: &'a mut dyn StateDB,
        chain_config: &'a ChainConfig,
        mut vm_config: Config,
    ) -> Evm<'a> {
        let block_number: u64 = context.block_number.saturating_to();
        let chain_rules = chain_config.rules(block_number);
        let gas_table = chain_config.gas_table(block_number);

        let table = match vm_config.jump_table.take() {
            Some(table) => table,
            None if chain_rules.is_fuxi => FUXI_INSTRUCTION_SET.clone(),
            None => PANGU_INSTRUCTION_SET.clone(),
        };
        let precompiles = if chain_rules.is_fuxi_precompiled {
            &*precompiles::PRECOMPILED_FUXI
        } else {
            &*precompiles::PRECOMPILED_PANGU
        };

        Evm {
            context,
            state,
            chain_config,
            chain_rules,
            vm_config,
            gas_table,
            table,
            depth: 0,
            read_only: false,
            return_data: Vec::new(),
            call_gas_temp: 0,
            abort: Arc::new(AtomicBool::new(false)),
            precompiles,
        }
    }

    /// Aborts any in-flight execution at the next opcode boundary. The
    /// aborted frame returns empty with no error; discarding its side
    /// effects is the caller's responsibility.
    pub fn cancel(&self) {
        self.abort.store(true, Ordering::Release);
    }

    /// A handle that can cancel this EVM from another thread.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    pub(crate) fn aborted(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    fn run(&mut self, contract: &mut Contract, input: &[u8]) -> (Vec<u8>, Option<VmError>) {
        Interpreter::new(self).run(contract, input)
    }

    fn run_precompiled(
        &mut self,
        addr: Address,
        input: &[u8],
        gas: u64,
    ) -> (Vec<u8>, u64, Option<VmError>) {
        let precompiles = self.precompiles;
        let Some(p) = precompiles.get(&addr) else {
            return (Vec::new(), gas, None);
        };
        let required = p.required_gas(input);
        if gas < required {
            return (Vec::new(), 0, Some(VmError::OutOfGas));
        }
        match p.run(input) {
            Ok(out) => (out, gas - required, None),
            Err(err) => (Vec::new(), 0, Some(err)),
        }
    }

    /// Executes the code at `addr` with the given input, transferring
    /// `value` from `caller` to `addr`. Returns the output, the gas left
    /// for the caller, and the error, if any.
    pub fn call(
        &mut self,
        caller: Address,
        addr: Address,
        input: &[u8],
        gas: u64,
        value: U256,
        read_only: bool,
    ) -> (Vec<u8>, u64, Option<VmError>) {
        if self.vm_config.no_recursion && self.depth > 0 {
            return (Vec::new(), gas, None);
        }
        if self.depth as u64 > CALL_CREATE_DEPTH {
            return (Vec::new(), gas, Some(VmError::MaxCallDepth));
        }
        if !can_transfer(self.state, caller, &value) {
            return (Vec::new(), gas, Some(VmError::InsufficientBalance));
        }

        let snapshot = self.state.snapshot();
        let is_precompile = self.precompiles.contains_key(&addr);
        if !self.state.exist(addr)
            && !is_precompile
            && self.chain_rules.remove_empty_account
            && value.is_zero()
        {
            // Calling a nonexistent account without value changes nothing;
            // don't create an empty account for it.
            return (Vec::new(), gas, None);
        }
        transfer(self.state, caller, addr, value);

        let prev_read_only = self.read_only;
        self.read_only = prev_read_only || read_only;

        let (ret, gas_left, err) = if is_precompile {
            self.run_precompiled(addr, input, gas)
        } else {
            let code = self.state.get_code(addr);
            if code.is_empty() {
                (Vec::new(), gas, None)
            } else {
                let code_hash = self.state.get_code_hash(addr);
                let mut contract = Contract::new(caller, addr, value, gas);
                contract.set_code(code, code_hash);
                let (ret, err) = self.run(&mut contract, input);
                let gas_left = frame_gas(&contract, &err);
                (ret, gas_left, err)
            }
        };
        self.read_only = prev_read_only;

        if err.is_some() {
            self.state.revert_to_snapshot(snapshot);
        }
        (ret, gas_left, err)
    }

    /// Executes the code at `addr` in the caller's own context; the
    /// legacy value transfer goes from the caller to itself.
    pub fn call_code(
        &mut self,
        caller: Address,
        addr: Address,
        input: &[u8],
        gas: u64,
        value: U256,
    ) -> (Vec<u8>, u64, Option<VmError>) {
        if self.vm_config.no_recursion && self.depth > 0 {
            return (Vec::new(), gas, None);
        }
        if self.depth as u64 > CALL_CREATE_DEPTH {
            return (Vec::new(), gas, Some(VmError::MaxCallDepth));
        }
        if !can_transfer(self.state, caller, &value) {
            return (Vec::new(), gas, Some(VmError::InsufficientBalance));
        }

        let snapshot = self.state.snapshot();
        transfer(self.state, caller, caller, value);

        let (ret, gas_left, err) = if self.precompiles.contains_key(&addr) {
            self.run_precompiled(addr, input, gas)
        } else {
            let code = self.state.get_code(addr);
            if code.is_empty() {
                (Vec::new(), gas, None)
            } else {
                let code_hash = self.state.get_code_hash(addr);
                let mut contract = Contract::new(caller, caller, value, gas);
                contract.set_code(code, code_hash);
                let (ret, err) = self.run(&mut contract, input);
                let gas_left = frame_gas(&contract, &err);
                (ret, gas_left, err)
            }
        };

        if err.is_some() {
            self.state.revert_to_snapshot(snapshot);
        }
        (ret, gas_left, err)
    }

    /// Executes the code at `addr` in the caller's context, keeping the
    /// parent frame's caller and value. No value moves.
    pub fn delegate_call(
        &mut self,
        caller: Address,
        own_address: Address,
        value: U256,
        addr: Address,
        input: &[u8],
        gas: u64,
    ) -> (Vec<u8>, u64, Option<VmError>) {
        if self.vm_config.no_recursion && self.depth > 0 {
            return (Vec::new(), gas, None);
        }
        if self.depth as u64 > CALL_CREATE_DEPTH {
            return (Vec::new(), gas, Some(VmError::MaxCallDepth));
        }

        let snapshot = self.state.snapshot();

        let (ret, gas_left, err) = if self.precompiles.contains_key(&addr) {
            self.run_precompiled(addr, input, gas)
        } else {
            let code = self.state.get_code(addr);
            if code.is_empty() {
                (Vec::new(), gas, None)
            } else {
                let code_hash = self.state.get_code_hash(addr);
                let mut contract = Contract::new(caller, own_address, value, gas);
                contract.set_code(code, code_hash);
                let (ret, err) = self.run(&mut contract, input);
                let gas_left = frame_gas(&contract, &err);
                (ret, gas_left, err)
            }
        };

        if err.is_some() {
            self.state.revert_to_snapshot(snapshot);
        }
        (ret, gas_left, err)
    }

    /// Executes the code at `addr` with the read-only flag set for the
    /// frame and all its descendants. No value moves.
    pub fn static_call(
        &mut self,
        caller: Address,
        addr: Address,
        input: &[u8],
        gas: u64,
    ) -> (Vec<u8>, u64, Option<VmError>) {
        if self.vm_config.no_recursion && self.depth > 0 {
            return (Vec::new(), gas, None);
        }
        if self.depth as u64 > CALL_CREATE_DEPTH {
            return (Vec::new(), gas, Some(VmError::MaxCallDepth));
        }

        let snapshot = self.state.snapshot();
        let prev_read_only = self.read_only;
        self.read_only = true;

        let (ret, gas_left, err) = if self.precompiles.contains_key(&addr) {
            self.run_precompiled(addr, input, gas)
        } else {
            let code = self.state.get_code(addr);
            if code.is_empty() {
                (Vec::new(), gas, None)
            } else {
                let code_hash = self.state.get_code_hash(addr);
                let mut contract = Contract::new(caller, addr, U256::ZERO, gas);
                contract.set_code(code, code_hash);
                let (ret, err) = self.run(&mut contract, input);
                let gas_left = frame_gas(&contract, &err);
                (ret, gas_left, err)
            }
        };

        self.read_only = prev_read_only;
        if err.is_some() {
            self.state.revert_to_snapshot(snapshot);
        }
        (ret, gas_left, err)
    }

    /// Creates a contract at the address derived from the caller and its
    /// nonce. Returns the init code's output, the new address, the gas
    /// left, and the error, if any.
    pub fn create(
        &mut self,
        caller: Address,
        code: &[u8],
        gas: u64,
        value: U256,
    ) -> (Vec<u8>, Address, u64, Option<VmError>) {
        if self.vm_config.no_recursion && self.depth > 0 {
            return (Vec::new(), Address::ZERO, gas, None);
        }
        if self.depth as u64 > CALL_CREATE_DEPTH {
            return (Vec::new(), Address::ZERO, gas, Some(VmError::MaxCallDepth));
        }
        if !can_transfer(self.state, caller, &value) {
            return (Vec::new(), Address::ZERO, gas, Some(VmError::InsufficientBalance));
        }

        let nonce = self.state.get_nonce(caller);
        self.state.set_nonce(caller, nonce + 1);
        let addr = caller.create(nonce);
        self.create_at(caller, code, gas, value, addr)
    }

    /// Creates a contract at the salted address
    /// `Keccak256(0xff ‖ caller ‖ salt ‖ Keccak256(init))[12:]`.
    pub fn create2(
        &mut self,
        caller: Address,
        code: &[u8],
        gas: u64,
        value: U256,
        salt: U256,
    ) -> (Vec<u8>, Address, u64, Option<VmError>) {
        if self.vm_config.no_recursion && self.depth > 0 {
            return (Vec::new(), Address::ZERO, gas, None);
        }
        if self.depth as u64 > CALL_CREATE_DEPTH {
            return (Vec::new(), Address::ZERO, gas, Some(VmError::MaxCallDepth));
        }
        if !can_transfer(self.state, caller, &value) {
            return (Vec::new(), Address::ZERO, gas, Some(VmError::InsufficientBalance));
        }

        let nonce = self.state.get_nonce(caller);
        self.state.set_nonce(caller, nonce + 1);
        let addr = caller.create2(B256::from(salt), keccak256(code));
        self.create_at(caller, code, gas, value, addr)
    }

    fn create_at(
        &mut self,
        caller: Address,
        code: &[u8],
        gas: u64,
        value: U256,
        addr: Address,
    ) -> (Vec<u8>, Address, u64, Option<VmError>) {
        // An address hosting code or with a touched nonce cannot be
        // created over.
        let contract_hash = self.state.get_code_hash(addr);
        if self.state.get_nonce(addr) != 0
            || (contract_hash != B256::ZERO && contract_hash != KECCAK256_EMPTY)
        {
            debug!(address = %addr, "contract address collision");
            return (Vec::new(), Address::ZERO, 0, Some(VmError::ContractAddressCollision));
        }

        let snapshot = self.state.snapshot();
        if self.chain_rules.remove_empty_account {
            self.state.set_nonce(addr, 1);
        }
        transfer(self.state, caller, addr, value);

        let mut contract = Contract::new(caller, addr, value, gas);
        contract.set_code(code.to_vec(), B256::ZERO);

        let (ret, mut err) = self.run(&mut contract, &[]);

        let max_code_size =
            if self.chain_rules.is_nuwa { NUWA_MAX_CODE_SIZE } else { MAX_CODE_SIZE };
        let max_code_size_exceeded = err.is_none() && ret.len() > max_code_size;

        // A clean init return becomes the account code, charged per byte.
        if err.is_none() && !max_code_size_exceeded {
            let create_data_gas = ret.len() as u64 * CREATE_DATA_GAS;
            if contract.use_gas(create_data_gas) {
                self.state.set_code(addr, ret.clone());
            } else {
                err = Some(VmError::CodeStoreOutOfGas);
            }
        }
        if max_code_size_exceeded {
            err = Some(VmError::MaxCodeSizeExceeded);
        }

        // Rewind on any failure, except that pre-Pangu rules let a
        // code-store failure stand with empty code.
        if let Some(e) = &err {
            if self.chain_rules.is_pangu || *e != VmError::CodeStoreOutOfGas {
                self.state.revert_to_snapshot(snapshot);
                if !e.preserves_gas() {
                    contract.use_gas(contract.gas_remaining);
                }
            }
        }
        (ret, addr, contract.gas_remaining, err)
    }
}

/// Gas surviving a finished frame: everything on error (except revert),
/// nothing is taken on success or revert.
fn frame_gas(contract: &Contract, err: &Option<VmError>) -> u64 {
    match err {
        Some(e) if !e.preserves_gas() => 0,
        _ => contract.gas_remaining,
    }
}
