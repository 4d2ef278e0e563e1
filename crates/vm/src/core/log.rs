//! Log records emitted by the LOG0..LOG4 opcodes.

use alloy_primitives::{Address, B256};

/// A single log record handed to the state store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Log {
    /// Address of the contract that emitted the log.
    pub address: Address,
    /// Indexed topics, at most four.
    pub topics: Vec<B256>,
    /// Unindexed payload.
    pub data: Vec<u8>,
    /// Block the log was emitted in. Non-consensus, assigned here because
    /// the state store doesn't know the current block number.
    pub block_number: u64,
}
