//! The interpreter main loop.
//!
//! Runs a frame's bytecode until STOP/RETURN/REVERT/SELFDESTRUCT, an
//! error, or an external abort. Any error returned from here is a
//! revert-and-consume-all-gas condition for the frame; no error-specific
//! handling happens further down.

use alloy_primitives::{keccak256, B256};
use tracing::{debug, trace};

use super::contract::Contract;
use super::errors::VmError;
use super::evm::Evm;
use super::gas::to_word_size;
use super::jump_table::JumpTable;
use super::memory::Memory;
use super::opcodes::{OpCode, CALL};
use super::stack::{ReturnStack, Stack};

/// Configuration options for the [`Interpreter`].
#[derive(Default)]
pub struct Config {
    /// Enables per-opcode tracing through [`Config::tracer`].
    pub debug: bool,
    /// The opcode logger invoked when `debug` is set.
    pub tracer: Option<Box<dyn Tracer + Send>>,
    /// Disables call, callcode, delegatecall, staticcall, and create in
    /// nested frames.
    pub no_recursion: bool,
    /// Disables gas metering. Debug only; consensus requires metering.
    pub disable_gas_metering: bool,
    /// Records SHA3 preimages into the state store.
    pub enable_preimage_recording: bool,
    /// Overrides the fork-selected instruction set.
    pub jump_table: Option<JumpTable>,
}

/// Per-opcode state capture hook.
pub trait Tracer {
    #[allow(clippy::too_many_arguments)]
    fn capture_state(
        &mut self,
        pc: u64,
        op: u8,
        gas: u64,
        cost: u64,
        memory: &Memory,
        stack: &Stack,
        depth: usize,
        err: Option<&VmError>,
    );
}

/// The interpreter drives one frame at a time; nested calls re-enter the
/// EVM facade, which constructs a fresh interpreter on the same thread.
pub struct Interpreter<'a, 'e> {
    evm: &'a mut Evm<'e>,
}

impl<'a, 'e> Interpreter<'a, 'e> {
    /// Creates an interpreter borrowing the EVM for one frame.
    pub fn new(evm: &'a mut Evm<'e>) -> Interpreter<'a, 'e> {
        Interpreter { evm }
    }

    /// In read-only mode no state-modifying operation may run. The value
    /// operand of CALL counts: transferring value mutates state too.
    fn enforce_restrictions(
        &self,
        op: u8,
        writes: bool,
        stack: &Stack,
    ) -> Result<(), VmError> {
        if self.evm.read_only {
            let transfers_value =
                op == CALL && stack.back(2).map(|v| !v.is_zero()).unwrap_or(false);
            if writes || transfers_value {
                debug!(op = %OpCode(op), "write attempted in static context");
                return Err(VmError::WriteProtection);
            }
        }
        Ok(())
    }

    /// Loops and evaluates the contract's code with the given input,
    /// returning the return bytes and an error if one occurred.
    pub fn run(&mut self, contract: &mut Contract, input: &[u8]) -> (Vec<u8>, Option<VmError>) {
        // Call depth is restricted to 1024 by the facade's depth check.
        self.evm.depth += 1;
        let out = self.run_loop(contract, input);
        self.evm.depth -= 1;
        out
    }

    fn run_loop(&mut self, contract: &mut Contract, input: &[u8]) -> (Vec<u8>, Option<VmError>) {
        trace!(
            address = %contract.address(),
            input_len = input.len(),
            gas = contract.gas_remaining,
            "interpreter enter"
        );

        // The previous call's return data doesn't survive frame entry;
        // every returning call overwrites the buffer anyway.
        self.evm.return_data.clear();

        if contract.code.is_empty() {
            return (Vec::new(), None);
        }
        // codehash keys the jump dest cache
        if contract.code_hash == B256::ZERO {
            contract.code_hash = keccak256(&contract.code);
        }
        contract.input = input.to_vec();

        let mut memory = Memory::new();
        let mut stack = Stack::new();
        let mut rstack = ReturnStack::new();
        // For optimisation reasons the pc is a u64; practically no
        // program will ever go above 2^64.
        let mut pc = 0u64;

        while !self.evm.aborted() {
            let op = contract.get_op(pc);
            let operation = self.evm.table.0[op as usize];

            if let Err(err) = self.enforce_restrictions(op, operation.writes, &stack) {
                return (Vec::new(), Some(err));
            }
            if !operation.valid {
                debug!(op = %OpCode(op), pc, "invalid opcode");
                return (Vec::new(), Some(VmError::InvalidCode(op)));
            }

            // make sure there are enough stack items available and room
            // for the pushes
            if stack.len() < operation.min_stack {
                return (
                    Vec::new(),
                    Some(VmError::StackUnderflow {
                        stack_len: stack.len(),
                        required: operation.min_stack,
                    }),
                );
            }
            if stack.len() > operation.max_stack {
                return (
                    Vec::new(),
                    Some(VmError::StackOverflow {
                        stack_len: stack.len(),
                        limit: operation.max_stack,
                    }),
                );
            }

            // calculate the new memory size so the expansion can be
            // priced and performed before execution
            let mut memory_size = 0u64;
            if let Some(memory_size_fn) = operation.memory_size {
                let needed = match memory_size_fn(&stack) {
                    Ok(needed) => needed,
                    Err(err) => return (Vec::new(), Some(err)),
                };
                // memory is expanded in words of 32 bytes; gas is also
                // calculated in words
                memory_size = match to_word_size(needed).checked_mul(32) {
                    Some(size) => size,
                    None => return (Vec::new(), Some(VmError::GasUintOverflow)),
                };
            }

            let mut cost = operation.constant_gas;
            if !self.evm.vm_config.disable_gas_metering {
                if let Some(dynamic_gas) = operation.dynamic_gas {
                    let gas_table = self.evm.gas_table;
                    let dynamic = match dynamic_gas(
                        &gas_table,
                        self.evm,
                        contract,
                        &stack,
                        &memory,
                        memory_size,
                    ) {
                        Ok(dynamic) => dynamic,
                        Err(_) => return (Vec::new(), Some(VmError::OutOfGas)),
                    };
                    cost = match cost.checked_add(dynamic) {
                        Some(cost) => cost,
                        None => return (Vec::new(), Some(VmError::OutOfGas)),
                    };
                }
                if !contract.use_gas(cost) {
                    return (Vec::new(), Some(VmError::OutOfGas));
                }
            }

            if memory_size > 0 {
                memory.resize(memory_size);
            }

            if self.evm.vm_config.debug {
                let depth = self.evm.depth;
                let gas = contract.gas_remaining;
                if let Some(tracer) = self.evm.vm_config.tracer.as_mut() {
                    tracer.capture_state(pc, op, gas, cost, &memory, &stack, depth, None);
                }
            }

            let res = (operation.execute)(
                &mut pc,
                self.evm,
                contract,
                &mut memory,
                &mut stack,
                &mut rstack,
            );

            match res {
                Err(err) => {
                    if self.evm.vm_config.debug {
                        let depth = self.evm.depth;
                        let gas = contract.gas_remaining;
                        if let Some(tracer) = self.evm.vm_config.tracer.as_mut() {
                            tracer.capture_state(
                                pc, op, gas, cost, &memory, &stack, depth,
                                Some(&err),
                            );
                        }
                    }
                    return (Vec::new(), Some(err));
                }
                Ok(ret) => {
                    // an operation with returning data refreshes the
                    // interpreter's return buffer
                    if operation.returns {
                        self.evm.return_data = ret.clone();
                    }
                    if operation.reverts {
                        return (ret, Some(VmError::ExecutionReverted));
                    }
                    if operation.halts {
                        return (ret, None);
                    }
                    if !operation.jumps {
                        pc += 1;
                    }
                }
            }
        }
        // aborted by the parent context
        (Vec::new(), None)
    }
}
