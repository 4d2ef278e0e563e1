//! Chain configuration and protocol constants for the Kunlun virtual machine.
//!
//! This crate carries everything the execution engine consumes as data: the
//! per-network [`ChainConfig`](config::ChainConfig) with its hard-fork
//! schedule, the [`Rules`](config::Rules) snapshot derived from a block
//! height, the consensus gas and size constants, and the non-consensus
//! network parameter tables shared between clients.

/// Chain configuration, hard-fork schedule, and derived rules
pub mod config;

/// Per-fork gas cost table for table-driven opcodes
pub mod gas_table;

/// Non-consensus network parameters and message status tables
pub mod network;

/// Consensus gas and size constants
pub mod protocol;

pub use config::{ChainConfig, ConfigCompatError, Rules};
pub use gas_table::GasTable;
