//! Tagged execution errors.
//!
//! Every error except [`VmError::ExecutionReverted`] is a
//! revert-and-consume-all-gas condition for the failing frame. Parent
//! frames never observe a child's error directly; they see a `0` pushed on
//! their stack and, for reverts, the returned bytes.

/// Errors produced while executing bytecode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VmError {
    #[error("out of gas")]
    OutOfGas,
    #[error("contract creation code storage out of gas")]
    CodeStoreOutOfGas,
    #[error("max call depth exceeded")]
    MaxCallDepth,
    #[error("insufficient balance for transfer")]
    InsufficientBalance,
    #[error("contract address collision")]
    ContractAddressCollision,
    #[error("invalid opcode 0x{0:02x}")]
    InvalidCode(u8),
    #[error("invalid jump destination {dest}")]
    InvalidJump { dest: u64 },
    #[error("invalid subroutine entry")]
    InvalidSubroutineEntry,
    #[error("invalid retsub")]
    InvalidRetsub,
    #[error("return stack limit reached")]
    ReturnStackExceeded,
    #[error("return data out of bounds")]
    ReturnDataOutOfBounds,
    #[error("execution reverted")]
    ExecutionReverted,
    #[error("write protection")]
    WriteProtection,
    #[error("gas uint64 overflow")]
    GasUintOverflow,
    #[error("max code size exceeded")]
    MaxCodeSizeExceeded,
    #[error("stack underflow ({stack_len} < {required})")]
    StackUnderflow { stack_len: usize, required: usize },
    #[error("stack limit reached ({stack_len} > {limit})")]
    StackOverflow { stack_len: usize, limit: usize },
}

impl VmError {
    /// Whether the remaining gas of the failing frame survives the error.
    /// Only an explicit REVERT preserves gas; everything else consumes the
    /// whole frame.
    pub fn preserves_gas(&self) -> bool {
        matches!(self, VmError::ExecutionReverted)
    }
}
