//! # Relay Events and Transfer States

use serde::Serialize;
use sl_01_ledger::{Hash, ShardId};

/// Position of one cross-shard transfer in the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TransferState {
    /// Waiting in its target shard's queue
    Queued,
    /// Included in a relay block
    Batched(String),
    /// Relay block has received votes
    Validating(String),
    /// Relay block finalized; terminal
    Finalized(String),
}

impl TransferState {
    /// Relay block holding the transfer, if batched.
    pub fn relay_block(&self) -> Option<&str> {
        match self {
            Self::Queued => None,
            Self::Batched(id) | Self::Validating(id) | Self::Finalized(id) => Some(id),
        }
    }
}

/// Published on the relay's event channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RelayEvent {
    /// A target queue was batched.
    RelayBlockCreated {
        /// Relay block id
        id: String,
        /// Target shard
        target: ShardId,
    },
    /// Validation threshold reached.
    RelayBlockFinalized {
        /// Relay block id
        id: String,
        /// Target shard
        target: ShardId,
        /// Finalized transfers
        transaction_hashes: Vec<Hash>,
    },
    /// Structural check failed; transfers must be resubmitted.
    RelayBlockDropped {
        /// Relay block id
        id: String,
        /// Failed check
        reason: String,
    },
}

/// Result of recording votes on a relay block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RelayOutcome {
    /// Still below threshold.
    Pending {
        /// Positive votes so far
        approvals: usize,
    },
    /// This call finalized the block.
    Finalized,
    /// The block was finalized earlier.
    AlreadyFinalized,
    /// Vote came from an unregistered node.
    Ignored,
}
