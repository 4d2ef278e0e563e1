//! The per-fork gas table consumed by table-driven opcodes.

/// Costs for the opcodes whose price is looked up at interpreter
/// construction rather than baked into the instruction set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasTable {
    pub ext_code_size: u64,
    pub ext_code_copy: u64,
    pub ext_code_hash: u64,
    pub balance: u64,
    pub sload: u64,
    pub calls: u64,
    pub suicide: u64,
    pub exp_byte: u64,
}

/// The gas table active since Pangu. Later rule sets have not repriced
/// these opcodes, so this is the table returned at every height.
pub const GAS_TABLE_PANGU: GasTable = GasTable {
    ext_code_size: 700,
    ext_code_copy: 700,
    ext_code_hash: 400,
    balance: 700,
    sload: 50,
    calls: 40,
    suicide: 5000,
    exp_byte: 10,
};
