//! Consensus-critical gas and size constants.
//!
//! Every value here is observable on-chain: changing one forks the network.

/// Maximum size of a single transaction, in bytes.
pub const MAXIMUM_TX_SIZE: u64 = 128 * 1024;
/// Maximum size extra data may be after genesis.
pub const MAXIMUM_EXTRA_DATA_SIZE: u64 = 32;
/// Times ceil(log256(exponent)) for the EXP instruction.
pub const EXP_BYTE_GAS: u64 = 10;
/// Cost of an SLOAD.
pub const SLOAD_GAS: u64 = 50;
/// Paid for CALL when the value transfer is non-zero.
pub const CALL_VALUE_TRANSFER_GAS: u64 = 9000;
/// Paid for CALL when the destination address didn't exist prior.
pub const CALL_NEW_ACCOUNT_GAS: u64 = 25000;
/// Per transaction not creating a contract.
pub const TX_GAS: u64 = 1000;
/// Per transaction that creates a contract.
pub const TX_GAS_CONTRACT_CREATION: u64 = 53000;
/// Per byte of transaction data that equals zero.
pub const TX_DATA_ZERO_GAS: u64 = 4;
/// Per byte of transaction data that is not equal to zero.
pub const TX_DATA_NON_ZERO_GAS: u64 = 68;
/// Divisor for the quadratic particle of the memory cost equation.
pub const QUAD_COEFF_DIV: u64 = 512;
/// Once per SSTORE operation that sets a zero slot to a non-zero value.
pub const SSTORE_SET_GAS: u64 = 20000;
/// Once per SSTORE operation if the zeroness changes from zero.
pub const SSTORE_RESET_GAS: u64 = 5000;
/// Once per SSTORE operation if the zeroness doesn't change.
pub const SSTORE_CLEAR_GAS: u64 = 5000;
/// Refunded once per SSTORE operation that clears a non-zero slot.
pub const SSTORE_REFUND_GAS: u64 = 15000;
/// Per byte in a LOG* operation's data.
pub const LOG_DATA_GAS: u64 = 8;
/// Free gas given at the beginning of a value-bearing call.
pub const CALL_STIPEND: u64 = 2300;

/// Once per SHA3 operation.
pub const SHA3_GAS: u64 = 30;
/// Once per word of the SHA3 operation's data.
pub const SHA3_WORD_GAS: u64 = 6;
/// Cost of a JUMPDEST.
pub const JUMPDEST_GAS: u64 = 1;
/// Once per CALL operation & message call transaction.
pub const CALL_GAS: u64 = 40;
/// The cost of a BALANCE operation.
pub const BALANCE_GAS: u64 = 700;
/// Cost of EXTCODEHASH.
pub const EXTCODEHASH_GAS: u64 = 400;
/// Per byte of created contract code stored in state.
pub const CREATE_DATA_GAS: u64 = 200;
/// Maximum depth of the call/create stack.
pub const CALL_CREATE_DEPTH: u64 = 1024;
/// Once per EXP instruction.
pub const EXP_GAS: u64 = 10;
/// Per LOG* operation.
pub const LOG_GAS: u64 = 375;
/// Per word copied by the *COPY operations, rounded up.
pub const COPY_GAS: u64 = 3;
/// Maximum size of the VM operand stack.
pub const STACK_LIMIT: u64 = 1024;
/// Maximum size of the VM subroutine return stack.
pub const RETURN_STACK_LIMIT: u64 = 1023;
/// Multiplied by the number of topics of a LOG* operation.
pub const LOG_TOPIC_GAS: u64 = 375;
/// Once per CREATE operation & contract-creation transaction.
pub const CREATE_GAS: u64 = 32000;
/// Once per CREATE2 operation.
pub const CREATE2_GAS: u64 = 32000;
/// Refunded following a SELFDESTRUCT operation.
pub const SUICIDE_REFUND_GAS: u64 = 24000;
/// Times the number of 32-byte words of referenced memory.
pub const MEMORY_GAS: u64 = 3;

/// Maximum bytecode to permit for a contract.
pub const MAX_CODE_SIZE: usize = 204800;
/// Maximum bytecode to permit for a contract under Nuwa rules.
pub const NUWA_MAX_CODE_SIZE: usize = 204800;

/// Maximum value (2**60) for a chain id.
pub const MAX_CHAIN_ID: u64 = 1 << 60;

// Precompiled contract gas prices.

/// Elliptic curve sender recovery gas price.
pub const ECRECOVER_GAS: u64 = 3000;
/// Base price for a SHA256 operation.
pub const SHA256_BASE_GAS: u64 = 60;
/// Per-word price for a SHA256 operation.
pub const SHA256_PER_WORD_GAS: u64 = 12;
/// Base price for a RIPEMD160 operation.
pub const RIPEMD160_BASE_GAS: u64 = 600;
/// Per-word price for a RIPEMD160 operation.
pub const RIPEMD160_PER_WORD_GAS: u64 = 120;
/// Base price for a data copy operation.
pub const IDENTITY_BASE_GAS: u64 = 15;
/// Per-word price for a data copy operation.
pub const IDENTITY_PER_WORD_GAS: u64 = 3;
/// Divisor for the quadratic particle of big-int modular exponentiation.
pub const MOD_EXP_QUAD_COEFF_DIV: u64 = 20;

// Block-level bounds, consumed by collaborators.

/// The bound divisor of the gas limit, used in update calculations.
pub const GAS_LIMIT_BOUND_DIVISOR: u64 = 1024;
/// Minimum the gas limit may ever be.
pub const MIN_GAS_LIMIT: u64 = 5000;
/// Gas limit of the genesis block.
pub const GENESIS_GAS_LIMIT: u64 = 9_000_000;
/// The artificial gas limit target.
pub const TARGET_GAS_LIMIT: u64 = 18_000_000;
/// The bound divisor of the difficulty, used in the update calculations.
pub const DIFFICULTY_BOUND_DIVISOR: u64 = 2048;
/// Difficulty of the genesis block.
pub const GENESIS_DIFFICULTY: u64 = 131_072;
/// The minimum that the difficulty may ever be.
pub const MINIMUM_DIFFICULTY: u64 = 131_072;
