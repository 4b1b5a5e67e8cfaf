//! # Domain Errors
//!
//! Error types for the Relay subsystem.

use sl_01_ledger::{Hash, LedgerError};
use thiserror::Error;

/// Relay error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// Source and target shard are equal.
    #[error("Not a cross-shard transaction: {0}")]
    NotCrossShard(Hash),

    /// Transfer is already tracked by the relay.
    #[error("Transfer already submitted: {0}")]
    AlreadyExists(Hash),

    /// Transfer failed ledger validation.
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(#[from] LedgerError),

    /// No pending or finalized relay block with this id.
    #[error("Unknown relay block: {0}")]
    UnknownRelayBlock(String),

    /// Structural check failed; the block was dropped.
    #[error("Relay block {id} failed validation: {reason}")]
    RelayValidationFailed {
        /// Relay block id
        id: String,
        /// Failed check
        reason: String,
    },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
