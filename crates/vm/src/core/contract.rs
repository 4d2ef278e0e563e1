//! The call frame handed to the interpreter.

use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};

use super::jumpdest::{self, Bitmap};
use super::opcodes::STOP;

/// One activation of bytecode execution: the executing address, its code,
/// the call data, the transferred value, and the frame's gas meter.
///
/// A contract is constructed at the start of a call or create, mutated
/// only by the interpreter loop for that frame, and discarded on return.
#[derive(Clone, Debug)]
pub struct Contract {
    /// Address that initiated this frame.
    caller_address: Address,
    /// Execution address. For DELEGATECALL/CALLCODE frames this is the
    /// caller's own address, not the address the code was loaded from.
    self_address: Address,

    /// Bytecode being executed.
    pub code: Vec<u8>,
    /// Keccak-256 of the code; zero for initcode frames.
    pub code_hash: B256,
    /// Call data.
    pub input: Vec<u8>,

    /// Transferred amount.
    pub value: U256,
    /// Monotonically non-increasing within the frame, except for the
    /// refund of a child call's unused gas.
    pub gas_remaining: u64,

    /// Memoised jump destination analysis for this frame's code.
    jumpdests: Option<Arc<Bitmap>>,
}

impl Contract {
    /// Creates a new frame. Code is attached separately with
    /// [`Contract::set_code`] once it has been loaded from state.
    pub fn new(caller: Address, address: Address, value: U256, gas: u64) -> Contract {
        Contract {
            caller_address: caller,
            self_address: address,
            code: Vec::new(),
            code_hash: B256::ZERO,
            input: Vec::new(),
            value,
            gas_remaining: gas,
            jumpdests: None,
        }
    }

    /// Attaches code and its hash to the frame.
    pub fn set_code(&mut self, code: Vec<u8>, code_hash: B256) {
        self.code = code;
        self.code_hash = code_hash;
        self.jumpdests = None;
    }

    /// The address whose storage and balance this frame operates on.
    pub fn address(&self) -> Address {
        self.self_address
    }

    /// The address that initiated this frame.
    pub fn caller(&self) -> Address {
        self.caller_address
    }

    /// Fetches the opcode at the given program counter. Bytes past the
    /// end of the code read as STOP.
    pub fn get_op(&self, pc: u64) -> u8 {
        if (pc as usize) < self.code.len() {
            self.code[pc as usize]
        } else {
            STOP
        }
    }

    /// Attempts to deduct gas from the frame, returning false if the
    /// frame does not have enough left.
    pub fn use_gas(&mut self, gas: u64) -> bool {
        if self.gas_remaining < gas {
            return false;
        }
        self.gas_remaining -= gas;
        true
    }

    /// Hands back unused gas from a returning child frame.
    pub fn refund_gas(&mut self, gas: u64) {
        self.gas_remaining += gas;
    }

    /// Whether `dest` is a valid dynamic jump target in this frame's
    /// code. The analysis is resolved through the shared cache on first
    /// use and memoised on the frame.
    pub fn valid_jumpdest(&mut self, dest: &U256) -> bool {
        if dest.bit_len() > 63 {
            return false;
        }
        let udest = dest.as_limbs()[0] as usize;
        if udest >= self.code.len() {
            return false;
        }
        let analysis = self
            .jumpdests
            .get_or_insert_with(|| jumpdest::shared_analysis(self.code_hash, &self.code));
        analysis.has(udest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::keccak256;

    use crate::core::opcodes::{JUMPDEST, PUSH1};

    fn frame_with_code(code: &[u8]) -> Contract {
        let mut contract =
            Contract::new(Address::ZERO, Address::ZERO, U256::ZERO, 100_000);
        contract.set_code(code.to_vec(), keccak256(code));
        contract
    }

    #[test]
    fn test_get_op_past_end_is_stop() {
        let contract = frame_with_code(&[PUSH1, 0x01]);
        assert_eq!(contract.get_op(0), PUSH1);
        assert_eq!(contract.get_op(2), STOP);
        assert_eq!(contract.get_op(u64::MAX), STOP);
    }

    #[test]
    fn test_use_gas() {
        let mut contract = frame_with_code(&[]);
        assert!(contract.use_gas(99_999));
        assert!(!contract.use_gas(2));
        assert_eq!(contract.gas_remaining, 1);
        contract.refund_gas(10);
        assert_eq!(contract.gas_remaining, 11);
    }

    #[test]
    fn test_valid_jumpdest() {
        let mut contract = frame_with_code(&[PUSH1, JUMPDEST, JUMPDEST]);
        assert!(!contract.valid_jumpdest(&U256::from(1)));
        assert!(contract.valid_jumpdest(&U256::from(2)));
        assert!(!contract.valid_jumpdest(&U256::from(3)));
        assert!(!contract.valid_jumpdest(&U256::MAX));
    }
}
