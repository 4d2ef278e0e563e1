//! Kunlun bytecode execution engine.
//!
//! This crate implements the interpreter that deterministically executes
//! untrusted contract bytecode against a world state: the 256-bit operand
//! stack, the expandable word-aligned memory, the subroutine return stack,
//! per-fork opcode dispatch tables, precise gas metering, call-frame
//! management, and contract creation.
//!
//! The world state itself is a collaborator reached through the
//! [`StateDB`](core::state::StateDB) trait; an in-memory journalled
//! implementation is provided for tests and light embedders.

/// Core VM implementation: stack, memory, opcodes, gas, interpreter,
/// and the call/create facade
pub mod core;

pub use crate::core::{
    contract::Contract,
    errors::VmError,
    evm::{Context, Evm},
    interpreter::{Config, Interpreter, Tracer},
    state::{MemoryState, StateDB},
};
