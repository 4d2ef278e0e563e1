/// The call frame handed to the interpreter
pub mod contract;

/// Tagged execution errors
pub mod errors;

/// The call/callcode/delegatecall/staticcall/create/create2 facade
pub mod evm;

/// Per-opcode gas cost calculators
pub mod gas;

/// The fetch-validate-meter-execute loop
pub mod interpreter;

/// Semantic implementations of each opcode
pub mod instructions;

/// Per-fork tables of opcode descriptors
pub mod jump_table;

/// Valid jump destination analysis, cached by code hash
pub mod jumpdest;

/// Log records emitted by the LOG* opcodes
pub mod log;

/// Expandable, word-aligned byte memory
pub mod memory;

/// Opcode bytes and names
pub mod opcodes;

/// Precompiled contracts at fixed addresses
pub mod precompiles;

/// The operand stack and the subroutine return stack
pub mod stack;

/// The world-state interface and the in-memory reference store
pub mod state;
