//! # Domain Errors
//!
//! Error types for the Consensus subsystem.

use sl_01_ledger::{LedgerError, NodeId};
use thiserror::Error;

/// Consensus error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsensusError {
    /// Mempool holds nothing this engine may propose.
    #[error("No pending work")]
    NoPendingWork,

    /// Local node is not the leader for this round.
    #[error("Not the proposer for round {round}")]
    NotProposer {
        /// Round (PoS) or view (PBFT)
        round: u64,
    },

    /// Block failed the variant's agreement rule.
    #[error("Consensus rejected block: {0}")]
    Rejected(String),

    /// Chain-level failure (structural validation or admission).
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Stake below the configured minimum.
    #[error("Stake {stake} below minimum {minimum}")]
    BelowMinimumStake {
        /// Offered stake
        stake: u64,
        /// Required minimum
        minimum: u64,
    },

    /// Sender is not part of the validator set.
    #[error("Unknown validator: {0}")]
    UnknownValidator(NodeId),

    /// Validator set is empty.
    #[error("No validators registered")]
    NoValidators,

    /// Mining stopped by the cancel flag.
    #[error("Mining cancelled")]
    MiningCancelled,

    /// Vote or proposal for a stale view or an already committed sequence.
    #[error("Replayed message: view {view}, sequence {sequence}")]
    Replay {
        /// Message view
        view: u64,
        /// Message sequence
        sequence: u64,
    },

    /// Message type not handled by this engine.
    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ConsensusError {
    /// Errors that only mean "nothing to do this tick".
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::NoPendingWork | Self::NotProposer { .. })
    }
}

/// Result type for consensus operations.
pub type ConsensusResult<T> = Result<T, ConsensusError>;
