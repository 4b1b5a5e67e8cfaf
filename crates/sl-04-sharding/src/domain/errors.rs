//! # Domain Errors
//!
//! Error types for the Sharding subsystem.

use sl_01_ledger::{Hash, LedgerError, NodeId, ShardId};
use thiserror::Error;

/// Sharding error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShardError {
    /// Shard id outside the topology.
    #[error("No such shard: {0}")]
    NoSuchShard(ShardId),

    /// Node has no shard assignment.
    #[error("Node not assigned: {0}")]
    NodeNotAssigned(NodeId),

    /// Transfer failed ledger validation.
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(#[from] LedgerError),

    /// Source and target shard are equal.
    #[error("Not a cross-shard transaction: {0}")]
    NotCrossShard(Hash),

    /// Transfer is not tracked by the dual-confirmation channel.
    #[error("Unknown cross-shard transfer: {0}")]
    UnknownTransfer(Hash),

    /// Confirming shard is neither the transfer's source nor its target.
    #[error("Shard {shard} is not a party to transfer {hash}")]
    NotParticipant {
        /// Transfer hash
        hash: Hash,
        /// Confirming shard
        shard: ShardId,
    },

    /// Transfer already handed to the relay.
    #[error("Cross-shard transfer already submitted: {0}")]
    AlreadyExists(Hash),

    /// Relay gateway refused the transfer.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ShardError {
    /// Duplicates are idempotent no-ops, not failures.
    pub fn is_duplicate(&self) -> bool {
        match self {
            Self::AlreadyExists(_) => true,
            Self::InvalidTransaction(e) => e.is_duplicate(),
            _ => false,
        }
    }
}

/// Result alias for sharding operations.
pub type ShardResult<T> = Result<T, ShardError>;
