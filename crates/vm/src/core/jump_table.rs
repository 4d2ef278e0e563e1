//! Per-fork tables of opcode descriptors.
//!
//! Each of the 256 table entries carries the semantic function of the
//! opcode plus everything the interpreter validates and charges before
//! invoking it: stack depth bounds, memory footprint, constant and
//! dynamic gas, and the control-flow flags.

use kunlun_params::protocol::{CREATE2_GAS, CREATE_GAS, JUMPDEST_GAS, STACK_LIMIT};
use lazy_static::lazy_static;

use super::contract::Contract;
use super::errors::VmError;
use super::evm::Evm;
use super::gas::{
    self, GasFunc, MemorySizeFunc, GAS_BEGIN_SUB, GAS_EXT_STEP, GAS_FASTEST_STEP, GAS_FAST_STEP,
    GAS_JUMP_SUB, GAS_MID_STEP, GAS_QUICK_STEP, GAS_RETURN_SUB, GAS_SLOW_STEP,
};
use super::instructions::*;
use super::memory::Memory;
use super::opcodes::*;
use super::stack::{ReturnStack, Stack};

/// The semantic function of an opcode.
pub type ExecutionFunc = fn(
    &mut u64,
    &mut Evm<'_>,
    &mut Contract,
    &mut Memory,
    &mut Stack,
    &mut ReturnStack,
) -> Result<Vec<u8>, VmError>;

/// One jump table entry.
#[derive(Clone, Copy, Debug)]
pub struct Operation {
    /// The opcode body, invoked after validation, metering, and memory
    /// expansion.
    pub execute: ExecutionFunc,
    /// Gas charged regardless of operands.
    pub constant_gas: u64,
    /// Operand-dependent gas, charged together with `constant_gas`
    /// before execution.
    pub dynamic_gas: Option<GasFunc>,
    /// Minimum stack depth required.
    pub min_stack: usize,
    /// Maximum stack depth that still leaves room for the pushes.
    pub max_stack: usize,
    /// The highest memory byte the opcode will touch, if it touches
    /// memory at all.
    pub memory_size: Option<MemorySizeFunc>,
    /// Terminates execution cleanly.
    pub halts: bool,
    /// Sets the program counter itself.
    pub jumps: bool,
    /// Mutates state; rejected in a static context.
    pub writes: bool,
    /// Signals REVERT.
    pub reverts: bool,
    /// Leaves bytes in the interpreter's return-data buffer.
    pub returns: bool,
    /// Defined in this instruction set.
    pub valid: bool,
}

/// The stack depth an opcode popping `pops` items requires.
const fn min_stack(pops: usize, _pushes: usize) -> usize {
    pops
}

/// The deepest stack that still accommodates the opcode's net growth.
const fn max_stack(pops: usize, pushes: usize) -> usize {
    STACK_LIMIT as usize + pops - pushes
}

fn op_undefined(
    _pc: &mut u64,
    _evm: &mut Evm<'_>,
    _contract: &mut Contract,
    _memory: &mut Memory,
    _stack: &mut Stack,
    _rstack: &mut ReturnStack,
) -> Result<Vec<u8>, VmError> {
    // Unreachable: the interpreter rejects invalid entries before execute.
    Err(VmError::InvalidCode(0))
}

const UNDEFINED: Operation = Operation {
    execute: op_undefined,
    constant_gas: 0,
    dynamic_gas: None,
    min_stack: 0,
    max_stack: 0,
    memory_size: None,
    halts: false,
    jumps: false,
    writes: false,
    reverts: false,
    returns: false,
    valid: false,
};

/// Base for defined entries; every use overrides `execute` and the stack
/// bounds.
const BASE: Operation = Operation {
    execute: op_undefined,
    constant_gas: 0,
    dynamic_gas: None,
    min_stack: 0,
    max_stack: 0,
    memory_size: None,
    halts: false,
    jumps: false,
    writes: false,
    reverts: false,
    returns: false,
    valid: true,
};

/// An instruction set: 256 descriptors indexed by opcode byte.
#[derive(Clone)]
pub struct JumpTable(pub [Operation; 256]);

impl JumpTable {
    /// The instruction set active from Pangu until Fuxi.
    pub fn pangu() -> JumpTable {
        let mut tbl = [UNDEFINED; 256];

        tbl[STOP as usize] = Operation {
            execute: op_stop,
            min_stack: min_stack(0, 0),
            max_stack: max_stack(0, 0),
            halts: true,
            ..BASE
        };
        tbl[ADD as usize] = Operation {
            execute: op_add,
            constant_gas: GAS_FASTEST_STEP,
            min_stack: min_stack(2, 1),
            max_stack: max_stack(2, 1),
            ..BASE
        };
        tbl[MUL as usize] = Operation {
            execute: op_mul,
            constant_gas: GAS_FAST_STEP,
            min_stack: min_stack(2, 1),
            max_stack: max_stack(2, 1),
            ..BASE
        };
        tbl[SUB as usize] = Operation {
            execute: op_sub,
            constant_gas: GAS_FASTEST_STEP,
            min_stack: min_stack(2, 1),
            max_stack: max_stack(2, 1),
            ..BASE
        };
        tbl[DIV as usize] = Operation {
            execute: op_div,
            constant_gas: GAS_FAST_STEP,
            min_stack: min_stack(2, 1),
            max_stack: max_stack(2, 1),
            ..BASE
        };
        tbl[SDIV as usize] = Operation {
            execute: op_sdiv,
            constant_gas: GAS_FAST_STEP,
            min_stack: min_stack(2, 1),
            max_stack: max_stack(2, 1),
            ..BASE
        };
        tbl[MOD as usize] = Operation {
            execute: op_mod,
            constant_gas: GAS_FAST_STEP,
            min_stack: min_stack(2, 1),
            max_stack: max_stack(2, 1),
            ..BASE
        };
        tbl[SMOD as usize] = Operation {
            execute: op_smod,
            constant_gas: GAS_FAST_STEP,
            min_stack: min_stack(2, 1),
            max_stack: max_stack(2, 1),
            ..BASE
        };
        tbl[ADDMOD as usize] = Operation {
            execute: op_addmod,
            constant_gas: GAS_MID_STEP,
            min_stack: min_stack(3, 1),
            max_stack: max_stack(3, 1),
            ..BASE
        };
        tbl[MULMOD as usize] = Operation {
            execute: op_mulmod,
            constant_gas: GAS_MID_STEP,
            min_stack: min_stack(3, 1),
            max_stack: max_stack(3, 1),
            ..BASE
        };
        tbl[EXP as usize] = Operation {
            execute: op_exp,
            dynamic_gas: Some(gas::gas_exp as GasFunc),
            min_stack: min_stack(2, 1),
            max_stack: max_stack(2, 1),
            ..BASE
        };
        tbl[SIGNEXTEND as usize] = Operation {
            execute: op_sign_extend,
            constant_gas: GAS_FAST_STEP,
            min_stack: min_stack(2, 1),
            max_stack: max_stack(2, 1),
            ..BASE
        };

        tbl[LT as usize] = Operation {
            execute: op_lt,
            constant_gas: GAS_FASTEST_STEP,
            min_stack: min_stack(2, 1),
            max_stack: max_stack(2, 1),
            ..BASE
        };
        tbl[GT as usize] = Operation {
            execute: op_gt,
            constant_gas: GAS_FASTEST_STEP,
            min_stack: min_stack(2, 1),
            max_stack: max_stack(2, 1),
            ..BASE
        };
        tbl[SLT as usize] = Operation {
            execute: op_slt,
            constant_gas: GAS_FASTEST_STEP,
            min_stack: min_stack(2, 1),
            max_stack: max_stack(2, 1),
            ..BASE
        };
        tbl[SGT as usize] = Operation {
            execute: op_sgt,
            constant_gas: GAS_FASTEST_STEP,
            min_stack: min_stack(2, 1),
            max_stack: max_stack(2, 1),
            ..BASE
        };
        tbl[EQ as usize] = Operation {
            execute: op_eq,
            constant_gas: GAS_FASTEST_STEP,
            min_stack: min_stack(2, 1),
            max_stack: max_stack(2, 1),
            ..BASE
        };
        tbl[ISZERO as usize] = Operation {
            execute: op_iszero,
            constant_gas: GAS_FASTEST_STEP,
            min_stack: min_stack(1, 1),
            max_stack: max_stack(1, 1),
            ..BASE
        };
        tbl[AND as usize] = Operation {
            execute: op_and,
            constant_gas: GAS_FASTEST_STEP,
            min_stack: min_stack(2, 1),
            max_stack: max_stack(2, 1),
            ..BASE
        };
        tbl[OR as usize] = Operation {
            execute: op_or,
            constant_gas: GAS_FASTEST_STEP,
            min_stack: min_stack(2, 1),
            max_stack: max_stack(2, 1),
            ..BASE
        };
        tbl[XOR as usize] = Operation {
            execute: op_xor,
            constant_gas: GAS_FASTEST_STEP,
            min_stack: min_stack(2, 1),
            max_stack: max_stack(2, 1),
            ..BASE
        };
        tbl[NOT as usize] = Operation {
            execute: op_not,
            constant_gas: GAS_FASTEST_STEP,
            min_stack: min_stack(1, 1),
            max_stack: max_stack(1, 1),
            ..BASE
        };
        tbl[BYTE as usize] = Operation {
            execute: op_byte,
            constant_gas: GAS_FASTEST_STEP,
            min_stack: min_stack(2, 1),
            max_stack: max_stack(2, 1),
            ..BASE
        };

        tbl[SHA3 as usize] = Operation {
            execute: op_sha3,
            dynamic_gas: Some(gas::gas_sha3 as GasFunc),
            min_stack: min_stack(2, 1),
            max_stack: max_stack(2, 1),
            memory_size: Some(gas::memory_sha3 as MemorySizeFunc),
            ..BASE
        };

        tbl[ADDRESS as usize] = Operation {
            execute: op_address,
            constant_gas: GAS_QUICK_STEP,
            min_stack: min_stack(0, 1),
            max_stack: max_stack(0, 1),
            ..BASE
        };
        tbl[BALANCE as usize] = Operation {
            execute: op_balance,
            dynamic_gas: Some(gas::gas_balance as GasFunc),
            min_stack: min_stack(1, 1),
            max_stack: max_stack(1, 1),
            ..BASE
        };
        tbl[ORIGIN as usize] = Operation {
            execute: op_origin,
            constant_gas: GAS_QUICK_STEP,
            min_stack: min_stack(0, 1),
            max_stack: max_stack(0, 1),
            ..BASE
        };
        tbl[CALLER as usize] = Operation {
            execute: op_caller,
            constant_gas: GAS_QUICK_STEP,
            min_stack: min_stack(0, 1),
            max_stack: max_stack(0, 1),
            ..BASE
        };
        tbl[CALLVALUE as usize] = Operation {
            execute: op_call_value,
            constant_gas: GAS_QUICK_STEP,
            min_stack: min_stack(0, 1),
            max_stack: max_stack(0, 1),
            ..BASE
        };
        tbl[CALLDATALOAD as usize] = Operation {
            execute: op_call_data_load,
            constant_gas: GAS_FASTEST_STEP,
            min_stack: min_stack(1, 1),
            max_stack: max_stack(1, 1),
            ..BASE
        };
        tbl[CALLDATASIZE as usize] = Operation {
            execute: op_call_data_size,
            constant_gas: GAS_QUICK_STEP,
            min_stack: min_stack(0, 1),
            max_stack: max_stack(0, 1),
            ..BASE
        };
        tbl[CALLDATACOPY as usize] = Operation {
            execute: op_call_data_copy,
            constant_gas: GAS_FASTEST_STEP,
            dynamic_gas: Some(gas::gas_calldata_copy as GasFunc),
            min_stack: min_stack(3, 0),
            max_stack: max_stack(3, 0),
            memory_size: Some(gas::memory_calldata_copy as MemorySizeFunc),
            ..BASE
        };
        tbl[CODESIZE as usize] = Operation {
            execute: op_code_size,
            constant_gas: GAS_QUICK_STEP,
            min_stack: min_stack(0, 1),
            max_stack: max_stack(0, 1),
            ..BASE
        };
        tbl[CODECOPY as usize] = Operation {
            execute: op_code_copy,
            constant_gas: GAS_FASTEST_STEP,
            dynamic_gas: Some(gas::gas_code_copy as GasFunc),
            min_stack: min_stack(3, 0),
            max_stack: max_stack(3, 0),
            memory_size: Some(gas::memory_code_copy as MemorySizeFunc),
            ..BASE
        };
        tbl[GASPRICE as usize] = Operation {
            execute: op_gasprice,
            constant_gas: GAS_QUICK_STEP,
            min_stack: min_stack(0, 1),
            max_stack: max_stack(0, 1),
            ..BASE
        };
        tbl[EXTCODESIZE as usize] = Operation {
            execute: op_ext_code_size,
            dynamic_gas: Some(gas::gas_ext_code_size as GasFunc),
            min_stack: min_stack(1, 1),
            max_stack: max_stack(1, 1),
            ..BASE
        };
        tbl[EXTCODECOPY as usize] = Operation {
            execute: op_ext_code_copy,
            dynamic_gas: Some(gas::gas_ext_code_copy as GasFunc),
            min_stack: min_stack(4, 0),
            max_stack: max_stack(4, 0),
            memory_size: Some(gas::memory_ext_code_copy as MemorySizeFunc),
            ..BASE
        };

        tbl[BLOCKHASH as usize] = Operation {
            execute: op_blockhash,
            constant_gas: GAS_EXT_STEP,
            min_stack: min_stack(1, 1),
            max_stack: max_stack(1, 1),
            ..BASE
        };
        tbl[COINBASE as usize] = Operation {
            execute: op_coinbase,
            constant_gas: GAS_QUICK_STEP,
            min_stack: min_stack(0, 1),
            max_stack: max_stack(0, 1),
            ..BASE
        };
        tbl[TIMESTAMP as usize] = Operation {
            execute: op_timestamp,
            constant_gas: GAS_QUICK_STEP,
            min_stack: min_stack(0, 1),
            max_stack: max_stack(0, 1),
            ..BASE
        };
        tbl[NUMBER as usize] = Operation {
            execute: op_number,
            constant_gas: GAS_QUICK_STEP,
            min_stack: min_stack(0, 1),
            max_stack: max_stack(0, 1),
            ..BASE
        };
        tbl[DIFFICULTY as usize] = Operation {
            execute: op_difficulty,
            constant_gas: GAS_QUICK_STEP,
            min_stack: min_stack(0, 1),
            max_stack: max_stack(0, 1),
            ..BASE
        };
        tbl[GASLIMIT as usize] = Operation {
            execute: op_gas_limit,
            constant_gas: GAS_QUICK_STEP,
            min_stack: min_stack(0, 1),
            max_stack: max_stack(0, 1),
            ..BASE
        };

        tbl[POP as usize] = Operation {
            execute: op_pop,
            constant_gas: GAS_QUICK_STEP,
            min_stack: min_stack(1, 0),
            max_stack: max_stack(1, 0),
            ..BASE
        };
        tbl[MLOAD as usize] = Operation {
            execute: op_mload,
            constant_gas: GAS_FASTEST_STEP,
            dynamic_gas: Some(gas::gas_mem as GasFunc),
            min_stack: min_stack(1, 1),
            max_stack: max_stack(1, 1),
            memory_size: Some(gas::memory_mload as MemorySizeFunc),
            ..BASE
        };
        tbl[MSTORE as usize] = Operation {
            execute: op_mstore,
            constant_gas: GAS_FASTEST_STEP,
            dynamic_gas: Some(gas::gas_mem as GasFunc),
            min_stack: min_stack(2, 0),
            max_stack: max_stack(2, 0),
            memory_size: Some(gas::memory_mstore as MemorySizeFunc),
            ..BASE
        };
        tbl[MSTORE8 as usize] = Operation {
            execute: op_mstore8,
            constant_gas: GAS_FASTEST_STEP,
            dynamic_gas: Some(gas::gas_mem as GasFunc),
            min_stack: min_stack(2, 0),
            max_stack: max_stack(2, 0),
            memory_size: Some(gas::memory_mstore8 as MemorySizeFunc),
            ..BASE
        };
        tbl[SLOAD as usize] = Operation {
            execute: op_sload,
            dynamic_gas: Some(gas::gas_sload as GasFunc),
            min_stack: min_stack(1, 1),
            max_stack: max_stack(1, 1),
            ..BASE
        };
        tbl[SSTORE as usize] = Operation {
            execute: op_sstore,
            dynamic_gas: Some(gas::gas_sstore as GasFunc),
            min_stack: min_stack(2, 0),
            max_stack: max_stack(2, 0),
            writes: true,
            ..BASE
        };
        tbl[JUMP as usize] = Operation {
            execute: op_jump,
            constant_gas: GAS_MID_STEP,
            min_stack: min_stack(1, 0),
            max_stack: max_stack(1, 0),
            jumps: true,
            ..BASE
        };
        tbl[JUMPI as usize] = Operation {
            execute: op_jumpi,
            constant_gas: GAS_SLOW_STEP,
            min_stack: min_stack(2, 0),
            max_stack: max_stack(2, 0),
            jumps: true,
            ..BASE
        };
        tbl[PC as usize] = Operation {
            execute: op_pc,
            constant_gas: GAS_QUICK_STEP,
            min_stack: min_stack(0, 1),
            max_stack: max_stack(0, 1),
            ..BASE
        };
        tbl[MSIZE as usize] = Operation {
            execute: op_msize,
            constant_gas: GAS_QUICK_STEP,
            min_stack: min_stack(0, 1),
            max_stack: max_stack(0, 1),
            ..BASE
        };
        tbl[GAS as usize] = Operation {
            execute: op_gas,
            constant_gas: GAS_QUICK_STEP,
            min_stack: min_stack(0, 1),
            max_stack: max_stack(0, 1),
            ..BASE
        };
        tbl[JUMPDEST as usize] = Operation {
            execute: op_jumpdest,
            constant_gas: JUMPDEST_GAS,
            min_stack: min_stack(0, 0),
            max_stack: max_stack(0, 0),
            ..BASE
        };

        macro_rules! push_op {
            ($($code:ident => $n:literal),* $(,)?) => {
                $(
                    tbl[$code as usize] = Operation {
                        execute: op_push::<$n>,
                        constant_gas: GAS_FASTEST_STEP,
                        min_stack: min_stack(0, 1),
                        max_stack: max_stack(0, 1),
                        ..BASE
                    };
                )*
            };
        }
        push_op! {
            PUSH1 => 1, PUSH2 => 2, PUSH3 => 3, PUSH4 => 4, PUSH5 => 5, PUSH6 => 6,
            PUSH7 => 7, PUSH8 => 8, PUSH9 => 9, PUSH10 => 10, PUSH11 => 11, PUSH12 => 12,
            PUSH13 => 13, PUSH14 => 14, PUSH15 => 15, PUSH16 => 16, PUSH17 => 17, PUSH18 => 18,
            PUSH19 => 19, PUSH20 => 20, PUSH21 => 21, PUSH22 => 22, PUSH23 => 23, PUSH24 => 24,
            PUSH25 => 25, PUSH26 => 26, PUSH27 => 27, PUSH28 => 28, PUSH29 => 29, PUSH30 => 30,
            PUSH31 => 31, PUSH32 => 32,
        }

        macro_rules! dup_op {
            ($($code:ident => $n:literal),* $(,)?) => {
                $(
                    tbl[$code as usize] = Operation {
                        execute: op_dup::<$n>,
                        constant_gas: GAS_FASTEST_STEP,
                        min_stack: min_stack($n, $n + 1),
                        max_stack: max_stack($n, $n + 1),
                        ..BASE
                    };
                )*
            };
        }
        dup_op! {
            DUP1 => 1, DUP2 => 2, DUP3 => 3, DUP4 => 4, DUP5 => 5, DUP6 => 6, DUP7 => 7,
            DUP8 => 8, DUP9 => 9, DUP10 => 10, DUP11 => 11, DUP12 => 12, DUP13 => 13,
            DUP14 => 14, DUP15 => 15, DUP16 => 16,
        }

        macro_rules! swap_op {
            ($($code:ident => $n:literal),* $(,)?) => {
                $(
                    tbl[$code as usize] = Operation {
                        execute: op_swap::<$n>,
                        constant_gas: GAS_FASTEST_STEP,
                        min_stack: min_stack($n + 1, $n + 1),
                        max_stack: max_stack($n + 1, $n + 1),
                        ..BASE
                    };
                )*
            };
        }
        swap_op! {
            SWAP1 => 1, SWAP2 => 2, SWAP3 => 3, SWAP4 => 4, SWAP5 => 5, SWAP6 => 6, SWAP7 => 7,
            SWAP8 => 8, SWAP9 => 9, SWAP10 => 10, SWAP11 => 11, SWAP12 => 12, SWAP13 => 13,
            SWAP14 => 14, SWAP15 => 15, SWAP16 => 16,
        }

        macro_rules! log_op {
            ($($code:ident => $n:literal),* $(,)?) => {
                $(
                    tbl[$code as usize] = Operation {
                        execute: op_log::<$n>,
                        dynamic_gas: Some(gas::gas_log::<$n> as GasFunc),
                        min_stack: min_stack($n + 2, 0),
                        max_stack: max_stack($n + 2, 0),
                        memory_size: Some(gas::memory_log as MemorySizeFunc),
                        writes: true,
                        ..BASE
                    };
                )*
            };
        }
        log_op! { LOG0 => 0, LOG1 => 1, LOG2 => 2, LOG3 => 3, LOG4 => 4 }

        tbl[CREATE as usize] = Operation {
            execute: op_create,
            constant_gas: CREATE_GAS,
            dynamic_gas: Some(gas::gas_mem as GasFunc),
            min_stack: min_stack(3, 1),
            max_stack: max_stack(3, 1),
            memory_size: Some(gas::memory_create as MemorySizeFunc),
            writes: true,
            returns: true,
            ..BASE
        };
        tbl[CALL as usize] = Operation {
            execute: op_call,
            dynamic_gas: Some(gas::gas_call as GasFunc),
            min_stack: min_stack(7, 1),
            max_stack: max_stack(7, 1),
            memory_size: Some(gas::memory_call as MemorySizeFunc),
            returns: true,
            ..BASE
        };
        tbl[CALLCODE as usize] = Operation {
            execute: op_call_code,
            dynamic_gas: Some(gas::gas_call_code as GasFunc),
            min_stack: min_stack(7, 1),
            max_stack: max_stack(7, 1),
            memory_size: Some(gas::memory_call as MemorySizeFunc),
            returns: true,
            ..BASE
        };
        tbl[RETURN as usize] = Operation {
            execute: op_return,
            dynamic_gas: Some(gas::gas_mem as GasFunc),
            min_stack: min_stack(2, 0),
            max_stack: max_stack(2, 0),
            memory_size: Some(gas::memory_return as MemorySizeFunc),
            halts: true,
            returns: true,
            ..BASE
        };
        tbl[DELEGATECALL as usize] = Operation {
            execute: op_delegate_call,
            dynamic_gas: Some(gas::gas_delegate_call as GasFunc),
            min_stack: min_stack(6, 1),
            max_stack: max_stack(6, 1),
            memory_size: Some(gas::memory_delegate_call as MemorySizeFunc),
            returns: true,
            ..BASE
        };
        tbl[STATICCALL as usize] = Operation {
            execute: op_static_call,
            dynamic_gas: Some(gas::gas_static_call as GasFunc),
            min_stack: min_stack(6, 1),
            max_stack: max_stack(6, 1),
            memory_size: Some(gas::memory_static_call as MemorySizeFunc),
            returns: true,
            ..BASE
        };
        tbl[REVERT as usize] = Operation {
            execute: op_revert,
            dynamic_gas: Some(gas::gas_mem as GasFunc),
            min_stack: min_stack(2, 0),
            max_stack: max_stack(2, 0),
            memory_size: Some(gas::memory_revert as MemorySizeFunc),
            reverts: true,
            returns: true,
            ..BASE
        };
        tbl[SELFDESTRUCT as usize] = Operation {
            execute: op_suicide,
            dynamic_gas: Some(gas::gas_suicide as GasFunc),
            min_stack: min_stack(1, 0),
            max_stack: max_stack(1, 0),
            halts: true,
            writes: true,
            ..BASE
        };

        JumpTable(tbl)
    }

    /// The Fuxi instruction set: Pangu plus the bit-shift, subroutine,
    /// returndata, extcodehash, chainid, selfbalance, and create2
    /// opcodes.
    pub fn fuxi() -> JumpTable {
        let mut table = Self::pangu();
        let tbl = &mut table.0;

        tbl[SHL as usize] = Operation {
            execute: op_shl,
            constant_gas: GAS_FASTEST_STEP,
            min_stack: min_stack(2, 1),
            max_stack: max_stack(2, 1),
            ..BASE
        };
        tbl[SHR as usize] = Operation {
            execute: op_shr,
            constant_gas: GAS_FASTEST_STEP,
            min_stack: min_stack(2, 1),
            max_stack: max_stack(2, 1),
            ..BASE
        };
        tbl[SAR as usize] = Operation {
            execute: op_sar,
            constant_gas: GAS_FASTEST_STEP,
            min_stack: min_stack(2, 1),
            max_stack: max_stack(2, 1),
            ..BASE
        };
        tbl[RETURNDATASIZE as usize] = Operation {
            execute: op_return_data_size,
            constant_gas: GAS_QUICK_STEP,
            min_stack: min_stack(0, 1),
            max_stack: max_stack(0, 1),
            ..BASE
        };
        tbl[RETURNDATACOPY as usize] = Operation {
            execute: op_return_data_copy,
            constant_gas: GAS_FASTEST_STEP,
            dynamic_gas: Some(gas::gas_return_data_copy as GasFunc),
            min_stack: min_stack(3, 0),
            max_stack: max_stack(3, 0),
            memory_size: Some(gas::memory_return_data_copy as MemorySizeFunc),
            ..BASE
        };
        tbl[EXTCODEHASH as usize] = Operation {
            execute: op_ext_code_hash,
            dynamic_gas: Some(gas::gas_ext_code_hash as GasFunc),
            min_stack: min_stack(1, 1),
            max_stack: max_stack(1, 1),
            ..BASE
        };
        tbl[CHAINID as usize] = Operation {
            execute: op_chain_id,
            constant_gas: GAS_QUICK_STEP,
            min_stack: min_stack(0, 1),
            max_stack: max_stack(0, 1),
            ..BASE
        };
        tbl[SELFBALANCE as usize] = Operation {
            execute: op_self_balance,
            constant_gas: GAS_FAST_STEP,
            min_stack: min_stack(0, 1),
            max_stack: max_stack(0, 1),
            ..BASE
        };
        tbl[BEGINSUB as usize] = Operation {
            execute: op_begin_sub,
            constant_gas: GAS_BEGIN_SUB,
            min_stack: min_stack(0, 0),
            max_stack: max_stack(0, 0),
            ..BASE
        };
        tbl[RETURNSUB as usize] = Operation {
            execute: op_return_sub,
            constant_gas: GAS_RETURN_SUB,
            min_stack: min_stack(0, 0),
            max_stack: max_stack(0, 0),
            jumps: true,
            ..BASE
        };
        tbl[JUMPSUB as usize] = Operation {
            execute: op_jump_sub,
            constant_gas: GAS_JUMP_SUB,
            min_stack: min_stack(1, 0),
            max_stack: max_stack(1, 0),
            jumps: true,
            ..BASE
        };
        tbl[CREATE2 as usize] = Operation {
            execute: op_create2,
            constant_gas: CREATE2_GAS,
            dynamic_gas: Some(gas::gas_create2 as GasFunc),
            min_stack: min_stack(4, 1),
            max_stack: max_stack(4, 1),
            memory_size: Some(gas::memory_create2 as MemorySizeFunc),
            writes: true,
            returns: true,
            ..BASE
        };

        table
    }
}

lazy_static! {
    /// The Pangu instruction set, shared by every interpreter.
    pub static ref PANGU_INSTRUCTION_SET: JumpTable = JumpTable::pangu();
    /// The Fuxi instruction set, shared by every interpreter.
    pub static ref FUXI_INSTRUCTION_SET: JumpTable = JumpTable::fuxi();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pangu_rejects_fuxi_opcodes() {
        let pangu = JumpTable::pangu();
        for op in [SHL, SHR, SAR, RETURNDATASIZE, RETURNDATACOPY, EXTCODEHASH, CHAINID,
            SELFBALANCE, BEGINSUB, RETURNSUB, JUMPSUB, CREATE2]
        {
            assert!(!pangu.0[op as usize].valid, "0x{op:02x} must be invalid under pangu");
        }
    }

    #[test]
    fn test_fuxi_extends_pangu() {
        let fuxi = JumpTable::fuxi();
        for op in [SHL, SHR, SAR, RETURNDATASIZE, RETURNDATACOPY, EXTCODEHASH, CHAINID,
            SELFBALANCE, BEGINSUB, RETURNSUB, JUMPSUB, CREATE2]
        {
            assert!(fuxi.0[op as usize].valid, "0x{op:02x} must be valid under fuxi");
        }
        // the shared base is untouched
        assert!(fuxi.0[ADD as usize].valid);
        assert!(!fuxi.0[0x0c].valid);
    }

    #[test]
    fn test_flag_sets() {
        let fuxi = JumpTable::fuxi();
        for op in [STOP, RETURN, SELFDESTRUCT] {
            assert!(fuxi.0[op as usize].halts);
        }
        for op in [JUMP, JUMPI, JUMPSUB, RETURNSUB] {
            assert!(fuxi.0[op as usize].jumps);
        }
        for op in [SSTORE, CREATE, CREATE2, SELFDESTRUCT, LOG0, LOG4] {
            assert!(fuxi.0[op as usize].writes);
        }
        assert!(fuxi.0[REVERT as usize].reverts);
        for op in [CALL, CALLCODE, DELEGATECALL, STATICCALL, CREATE, CREATE2, RETURN, REVERT] {
            assert!(fuxi.0[op as usize].returns);
        }
    }

    #[test]
    fn test_stack_bounds() {
        let fuxi = JumpTable::fuxi();
        let call = &fuxi.0[CALL as usize];
        assert_eq!(call.min_stack, 7);
        assert_eq!(call.max_stack, STACK_LIMIT as usize + 6);
        let push = &fuxi.0[PUSH1 as usize];
        assert_eq!(push.min_stack, 0);
        assert_eq!(push.max_stack, STACK_LIMIT as usize - 1);
    }
}
