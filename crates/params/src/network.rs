//! Network parameters that need to be constant between clients, but
//! aren't necessarily consensus related.

/// Number of blocks a single bloom bit section vector contains.
pub const BLOOM_BITS_BLOCKS: u64 = 4096;
/// Per-block limit on direct calls.
pub const DIRECT_CALL_LIMIT_PER_BLOCK: u64 = 2048;
/// Gas limit for a direct call.
pub const DIRECT_CALL_GAS_LIMIT: u64 = 4_000_000;
/// Per-block limit on subchain messages.
pub const SUBCHAIN_MSG_LIMIT: usize = 1000;

// push message types
pub const DIRECT_CALL: i32 = 1;
pub const BROAD_CAST: i32 = 2;
pub const CONTROL_MSG: i32 = 3;
pub const SHAKE_HAND: i32 = 4;
pub const PING: i32 = 5;

// control status
pub const NONE_CTL: i32 = -1;
pub const REG_OPEN: i32 = 0;
pub const REG_CLOSE: i32 = 1;
pub const CREATE_PROPOSAL: i32 = 2;
pub const DISPUTE_PROPOSAL: i32 = 3;
pub const APPROVE_PROPOSAL: i32 = 4;
pub const REG_ADD: i32 = 5;
pub const REG_AS_MONITOR: i32 = 6;
pub const REG_AS_BACKUP: i32 = 7;
pub const UPDATE_LAST_FLUSH_BLK: i32 = 8;
pub const DISTRIBUTE_PROPOSAL: i32 = 9;
pub const RESET_ALL: i32 = 10;
pub const UPLOAD_REDEEM_DATA: i32 = 11;
pub const ENTER_AND_REDEEM: i32 = 12;
pub const REQUEST_RELEASE_IMMEDIATE_AND_VSS_GROUP_CONFIG: i32 = 13;
pub const ENABLE_RNG: i32 = 14;
pub const VSS_GROUP_CONFIG: i32 = 15;
pub const DISTRIBUTE_PROPOSAL_AND_VSS_GROUP_CONFIG: i32 = 16;

// broadcast status
pub const NEW_BLOCK: i32 = 0;
pub const SYNC_REQUEST: i32 = 1;
pub const SYNC_COMPLETE: i32 = 2;
pub const RNG_SHARES: i32 = 3;
pub const SIG_SHARES: i32 = 4;
pub const REQUEST_SIG_SHARES: i32 = 5;
pub const NEW_PROPOSAL: i32 = 6;

/// Human-readable name of a push message type.
pub fn push_type_name(status: i32) -> &'static str {
    match status {
        DIRECT_CALL => "<DirectCall>",
        BROAD_CAST => "<BroadCast>",
        CONTROL_MSG => "<ControlMsg>",
        SHAKE_HAND => "<ShakeHand>",
        PING => "<Ping>",
        _ => "",
    }
}

/// Human-readable name of a control status code.
pub fn push_status_name(status: i32) -> &'static str {
    match status {
        NONE_CTL => "<None>",
        REG_OPEN => "<RegOpen>",
        REG_CLOSE => "<RegClose>",
        CREATE_PROPOSAL => "<CreateProposal>",
        DISPUTE_PROPOSAL => "<DisputeProposal>",
        APPROVE_PROPOSAL => "<ApproveProposal>",
        REG_ADD => "<RegAdd>",
        REG_AS_MONITOR => "<RegAsMonitor>",
        REG_AS_BACKUP => "<RegAsBackup>",
        UPDATE_LAST_FLUSH_BLK => "<UpdateLastFlushBlk>",
        DISTRIBUTE_PROPOSAL => "<DistributeProposal>",
        RESET_ALL => "<ResetAll>",
        UPLOAD_REDEEM_DATA => "<UploadRedeemData>",
        ENTER_AND_REDEEM => "<EnterAndRedeem>",
        REQUEST_RELEASE_IMMEDIATE_AND_VSS_GROUP_CONFIG => {
            "<RequestReleaseImmediateAndVSSGroupConfig>"
        }
        ENABLE_RNG => "<EnableRNG>",
        VSS_GROUP_CONFIG => "<VSSGroupConfig>",
        DISTRIBUTE_PROPOSAL_AND_VSS_GROUP_CONFIG => "<DistributeProposalAndVSSGroupConfig>",
        _ => "",
    }
}

/// Human-readable name of a broadcast status code.
pub fn broadcast_status_name(status: i32) -> &'static str {
    match status {
        NEW_BLOCK => "<NewBlock>",
        SYNC_REQUEST => "<SyncRequest>",
        SYNC_COMPLETE => "<SyncComplete>",
        RNG_SHARES => "<RNGShares>",
        SIG_SHARES => "<SigShares>",
        REQUEST_SIG_SHARES => "<RequestSigShares>",
        NEW_PROPOSAL => "<NewProposal>",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_names_are_total() {
        for status in NEW_BLOCK..=NEW_PROPOSAL {
            assert!(!broadcast_status_name(status).is_empty(), "status {status} unnamed");
        }
    }

    #[test]
    fn test_request_sig_shares_named() {
        assert_eq!(broadcast_status_name(REQUEST_SIG_SHARES), "<RequestSigShares>");
    }
}
