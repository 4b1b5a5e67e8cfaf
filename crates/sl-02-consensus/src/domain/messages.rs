//! # Consensus Messages
//!
//! Payloads handed to the `broadcast` callback and received through
//! `deliver`. Framing and serialization belong to the transport.

use serde::{Deserialize, Serialize};
use sl_01_ledger::{Block, Hash, NodeId};

/// Consensus wire message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsensusMessage {
    /// A committed PoS or PoW block announced to peers.
    Block(Block),

    /// PBFT primary proposes `block` for `(view, sequence)`.
    PrePrepare {
        /// View of the primary
        view: u64,
        /// Sequence number (block height)
        sequence: u64,
        /// Proposed block
        block: Block,
    },

    /// A participant accepted the proposal.
    Prepare {
        /// View
        view: u64,
        /// Sequence number
        sequence: u64,
        /// Hash of the accepted block
        block_hash: Hash,
        /// Voter
        from: NodeId,
    },

    /// A participant observed a prepare quorum.
    Commit {
        /// View
        view: u64,
        /// Sequence number
        sequence: u64,
        /// Hash of the prepared block
        block_hash: Hash,
        /// Voter
        from: NodeId,
    },
}

impl ConsensusMessage {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Block(_) => "block",
            Self::PrePrepare { .. } => "pre-prepare",
            Self::Prepare { .. } => "prepare",
            Self::Commit { .. } => "commit",
        }
    }
}
