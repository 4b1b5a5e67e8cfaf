//! # Status Snapshots
//!
//! Read-only consensus state for external monitoring.

use super::config::ConsensusKind;
use serde::Serialize;
use sl_01_ledger::{NodeId, ShardId};

/// Consensus engine snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsensusStatus {
    /// Variant tag
    pub kind: ConsensusKind,
    /// Local node
    pub node_id: NodeId,
    /// Shard driven by this engine
    pub shard_id: ShardId,
    /// Chain height
    pub height: u64,
    /// Mempool size
    pub pending_transactions: usize,
    /// Proposal loop running
    pub running: bool,
    /// Variant-specific fields
    pub variant: VariantStatus,
}

/// Variant-specific status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VariantStatus {
    /// PoS
    StakeWeighted {
        /// Registered validators
        validators: usize,
        /// Sum of stakes
        total_stake: u64,
        /// Election round at the current height
        round: u64,
    },
    /// PoW
    WorkBased {
        /// Leading hex zeros required
        difficulty: u32,
        /// Required hash prefix
        target: String,
        /// A mining attempt is in flight
        mining: bool,
        /// Blocks mined locally
        blocks_mined: u64,
    },
    /// PBFT
    QuorumVoting {
        /// Current view
        view: u64,
        /// Last committed sequence
        sequence: u64,
        /// Votes needed per phase
        quorum: usize,
        /// Validator set size
        validators: usize,
        /// Primary of the current view
        primary: NodeId,
        /// Rounds collecting votes
        active_rounds: usize,
    },
}
