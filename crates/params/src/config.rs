//! Chain configuration and the hard-fork schedule.
//!
//! A [`ChainConfig`] is stored per network (it is keyed by the genesis
//! block in the database) and determines which consensus rule set is
//! active at a given height. [`Rules`] is the flattened, copyable view
//! handed to the execution engine.

use serde::{Deserialize, Serialize};

use crate::gas_table::{GasTable, GAS_TABLE_PANGU};

/// Network id of the main network.
pub const MAIN_NETWORK_ID: u64 = 99;
/// Network id of the test network.
pub const TEST_NETWORK_ID: u64 = 101;
/// Network id of the dev network.
pub const DEV_NETWORK_ID: u64 = 100;
/// Alternate priority network id.
pub const NETWORK_ID_188: u64 = 188;

/// The core config which determines the blockchain settings.
///
/// Any network, identified by its genesis block, can have its own set of
/// configuration options. A fork field of `None` means the fork is never
/// scheduled; `Some(0)` means the chain launched with the fork active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    /// Chain id, identifies the current chain and is used for replay protection.
    pub chain_id: u64,
    /// Pangu switch block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pangu_block: Option<u64>,
    /// Nuwa switch block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nuwa_block: Option<u64>,
    /// Fuxi switch block for the opcode upgrade.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuxi_block: Option<u64>,
    /// Fuxi switch block for defusing the difficulty bomb.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_bomb_defuse_block: Option<u64>,
    /// Enables transactions signed by the ethereum tool chain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_classic_tx: Option<u64>,
    /// Enables the new precompiled contracts shipped with Fuxi.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_fuxi_precompiled: Option<u64>,
    /// Remove empty accounts on touch. Should be set to true on all
    /// post-Pangu networks.
    #[serde(default)]
    pub remove_empty_account: bool,
}

/// The chain parameters to run a node on the main network.
pub const MAINNET_CONFIG: ChainConfig = ChainConfig {
    chain_id: MAIN_NETWORK_ID,
    pangu_block: Some(0),
    nuwa_block: Some(647_200),
    fuxi_block: Some(6_435_000),
    diff_bomb_defuse_block: Some(6_462_000),
    enable_classic_tx: Some(1_000_000_000_000),
    enable_fuxi_precompiled: Some(1_000_000_000_000),
    remove_empty_account: true,
};

/// The chain parameters to run a node on the test network.
pub const TESTNET_CONFIG: ChainConfig = ChainConfig {
    chain_id: TEST_NETWORK_ID,
    pangu_block: Some(0),
    nuwa_block: Some(616_700),
    fuxi_block: Some(4_900_000),
    diff_bomb_defuse_block: Some(5_042_000),
    enable_classic_tx: Some(5_260_000),
    enable_fuxi_precompiled: Some(5_330_000),
    remove_empty_account: true,
};

/// A config with every protocol change activated at block zero, for
/// development chains and tests.
pub const ALL_PROTOCOL_CHANGES: ChainConfig = ChainConfig {
    chain_id: DEV_NETWORK_ID,
    pangu_block: Some(0),
    nuwa_block: Some(0),
    fuxi_block: Some(0),
    diff_bomb_defuse_block: Some(0),
    enable_classic_tx: Some(0),
    enable_fuxi_precompiled: Some(0),
    remove_empty_account: true,
};

/// Returns whether the chain id has priority in the txpool.
pub fn priority_chain(chain_id: u64) -> bool {
    chain_id == MAIN_NETWORK_ID || chain_id == NETWORK_ID_188
}

/// Returns whether the chain id has clearance in the txpool.
pub fn clearance_chain(chain_id: u64) -> bool {
    chain_id == TEST_NETWORK_ID
}

impl ChainConfig {
    /// Returns whether num is either equal to the Pangu block or greater.
    pub fn is_pangu(&self, num: u64) -> bool {
        is_forked(self.pangu_block, num)
    }

    /// Returns whether num is either equal to the Nuwa block or greater.
    pub fn is_nuwa(&self, num: u64) -> bool {
        is_forked(self.nuwa_block, num)
    }

    /// Returns whether num is either equal to the Fuxi block or greater.
    pub fn is_fuxi(&self, num: u64) -> bool {
        is_forked(self.fuxi_block, num)
    }

    /// Returns whether the difficulty bomb is defused at num.
    pub fn is_diff_bomb_defused(&self, num: u64) -> bool {
        is_forked(self.diff_bomb_defuse_block, num)
    }

    /// Returns whether ethereum-toolchain transactions are accepted at num.
    pub fn is_classic_tx(&self, num: u64) -> bool {
        is_forked(self.enable_classic_tx, num)
    }

    /// Returns whether the Fuxi precompiled contracts are live at num.
    pub fn is_fuxi_precompiled(&self, num: u64) -> bool {
        is_forked(self.enable_fuxi_precompiled, num)
    }

    /// Replaces the empty-account check of the upstream protocol; empty
    /// accounts are removed on every post-Pangu network.
    pub fn is_remove_empty_account(&self, num: u64) -> bool {
        is_forked(self.pangu_block, num)
    }

    /// Returns the gas table corresponding to the current phase.
    ///
    /// The returned table's fields shouldn't, under any circumstances, be
    /// changed.
    pub fn gas_table(&self, _num: u64) -> GasTable {
        GAS_TABLE_PANGU
    }

    /// Returns the flattened rule set active at the given block number.
    pub fn rules(&self, num: u64) -> Rules {
        Rules {
            chain_id: self.chain_id,
            is_pangu: self.is_pangu(num),
            is_nuwa: self.is_nuwa(num),
            is_fuxi: self.is_fuxi(num),
            is_diff_bomb_defused: self.is_diff_bomb_defused(num),
            is_classic_tx: self.is_classic_tx(num),
            is_fuxi_precompiled: self.is_fuxi_precompiled(num),
            remove_empty_account: self.remove_empty_account,
        }
    }

    /// Checks whether scheduled fork transitions have been imported with a
    /// mismatching chain configuration, iterating to the lowest conflict.
    pub fn check_compatible(
        &self,
        newcfg: &ChainConfig,
        height: u64,
    ) -> Option<ConfigCompatError> {
        let mut head = height;
        let mut lasterr: Option<ConfigCompatError> = None;
        loop {
            let err = self.check_compatible_at(newcfg, head);
            match err {
                None => break,
                Some(err) => {
                    if let Some(last) = &lasterr {
                        if last.rewind_to == err.rewind_to {
                            break;
                        }
                    }
                    head = err.rewind_to;
                    lasterr = Some(err);
                }
            }
        }
        lasterr
    }

    fn check_compatible_at(&self, newcfg: &ChainConfig, head: u64) -> Option<ConfigCompatError> {
        if is_fork_incompatible(self.pangu_block, newcfg.pangu_block, head) {
            return Some(ConfigCompatError::new(
                "Pangu fork block",
                self.pangu_block,
                newcfg.pangu_block,
            ));
        }
        if is_fork_incompatible(self.nuwa_block, newcfg.nuwa_block, head) {
            return Some(ConfigCompatError::new(
                "Nuwa fork block",
                self.nuwa_block,
                newcfg.nuwa_block,
            ));
        }
        if is_fork_incompatible(self.fuxi_block, newcfg.fuxi_block, head) {
            return Some(ConfigCompatError::new(
                "Fuxi fork block",
                self.fuxi_block,
                newcfg.fuxi_block,
            ));
        }
        None
    }
}

/// Returns true if a fork scheduled at s1 cannot be rescheduled to block s2
/// because the head is already past the fork.
fn is_fork_incompatible(s1: Option<u64>, s2: Option<u64>, head: u64) -> bool {
    (is_forked(s1, head) || is_forked(s2, head)) && s1 != s2
}

/// Returns whether a fork scheduled at block s is active at the given head.
fn is_forked(s: Option<u64>, head: u64) -> bool {
    match s {
        Some(s) => s <= head,
        None => false,
    }
}

/// Rules is the flattened view of a [`ChainConfig`] at a fixed block
/// height. It is a one-time snapshot and shouldn't be carried across
/// transition phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rules {
    pub chain_id: u64,
    pub is_pangu: bool,
    pub is_nuwa: bool,
    pub is_fuxi: bool,
    pub is_diff_bomb_defused: bool,
    pub is_classic_tx: bool,
    pub is_fuxi_precompiled: bool,
    pub remove_empty_account: bool,
}

/// Raised if the locally-stored blockchain is initialised with a
/// ChainConfig that would alter history already executed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("mismatching {what} in database (have {stored:?}, want {new:?}, rewindto {rewind_to})")]
pub struct ConfigCompatError {
    /// Name of the conflicting fork field.
    pub what: &'static str,
    /// Fork height in the stored configuration.
    pub stored: Option<u64>,
    /// Fork height in the new configuration.
    pub new: Option<u64>,
    /// The block number the local chain must be rewound to.
    pub rewind_to: u64,
}

impl ConfigCompatError {
    fn new(what: &'static str, stored: Option<u64>, new: Option<u64>) -> Self {
        let rew = match (stored, new) {
            (None, n) => n,
            (Some(s), None) => Some(s),
            (Some(s), Some(n)) if s < n => Some(s),
            (_, n) => n,
        };
        let rewind_to = match rew {
            Some(r) if r > 0 => r - 1,
            _ => 0,
        };
        ConfigCompatError { what, stored, new, rewind_to }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mainnet_fork_order() {
        assert!(MAINNET_CONFIG.is_pangu(0));
        assert!(!MAINNET_CONFIG.is_nuwa(0));
        assert!(MAINNET_CONFIG.is_nuwa(647_200));
        assert!(!MAINNET_CONFIG.is_fuxi(6_434_999));
        assert!(MAINNET_CONFIG.is_fuxi(6_435_000));
        assert!(!MAINNET_CONFIG.is_fuxi_precompiled(6_435_000));
    }

    #[test]
    fn test_rules_snapshot() {
        let rules = MAINNET_CONFIG.rules(6_500_000);
        assert_eq!(rules.chain_id, MAIN_NETWORK_ID);
        assert!(rules.is_pangu && rules.is_nuwa && rules.is_fuxi);
        assert!(rules.is_diff_bomb_defused);
        assert!(!rules.is_classic_tx);
    }

    #[test]
    fn test_unscheduled_fork_is_never_active() {
        let cfg = ChainConfig { fuxi_block: None, ..MAINNET_CONFIG };
        assert!(!cfg.is_fuxi(u64::MAX));
    }

    #[test]
    fn test_compatible_reschedule_ahead_of_head() {
        let stored = TESTNET_CONFIG;
        let mut newcfg = TESTNET_CONFIG;
        newcfg.fuxi_block = Some(4_950_000);
        // Head has not reached either schedule, so the change is fine.
        assert!(stored.check_compatible(&newcfg, 1_000_000).is_none());
    }

    #[test]
    fn test_incompatible_reschedule_past_head() {
        let stored = TESTNET_CONFIG;
        let mut newcfg = TESTNET_CONFIG;
        newcfg.fuxi_block = Some(5_000_000);
        let err = stored.check_compatible(&newcfg, 4_900_000).expect("must conflict");
        assert_eq!(err.what, "Fuxi fork block");
        assert_eq!(err.stored, Some(4_900_000));
        assert_eq!(err.new, Some(5_000_000));
        assert_eq!(err.rewind_to, 4_899_999);
    }

    #[test]
    fn test_lowest_conflict_wins() {
        let stored = TESTNET_CONFIG;
        let mut newcfg = TESTNET_CONFIG;
        newcfg.nuwa_block = Some(700_000);
        newcfg.fuxi_block = Some(5_000_000);
        let err = stored.check_compatible(&newcfg, 5_000_000).expect("must conflict");
        assert_eq!(err.what, "Nuwa fork block");
        assert_eq!(err.rewind_to, 616_699);
    }

    #[test]
    fn test_config_json_field_names() {
        let json = serde_json::to_string(&TESTNET_CONFIG).expect("serialize");
        assert!(json.contains("\"chainId\":101"));
        assert!(json.contains("\"panguBlock\":0"));
        assert!(json.contains("\"fuxiBlock\":4900000"));
        assert!(json.contains("\"enableFuxiPrecompiled\":5330000"));
        assert!(json.contains("\"removeEmptyAccount\":true"));

        let back: ChainConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, TESTNET_CONFIG);
    }
}
