//! # Node Errors

use crate::config::ConfigError;
use sl_01_ledger::LedgerError;
use sl_02_consensus::ConsensusError;
use sl_03_relay::RelayError;
use sl_04_sharding::ShardError;
use thiserror::Error;

/// Errors surfaced by [`ShardNode`](crate::ShardNode) entry points.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Configuration rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Transaction or block rejected by the ledger.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Block or message rejected by consensus.
    #[error(transparent)]
    Consensus(#[from] ConsensusError),

    /// Relay rejected a transfer or vote.
    #[error(transparent)]
    Relay(#[from] RelayError),

    /// Topology lookup or cross-shard hand-off failed.
    #[error(transparent)]
    Shard(#[from] ShardError),
}

/// Result alias for node operations.
pub type NodeResult<T> = Result<T, NodeError>;
