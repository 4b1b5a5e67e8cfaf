//! # Domain Errors
//!
//! Error types for the Ledger subsystem.

use super::hash::Hash;
use thiserror::Error;

/// Shard identifier.
pub type ShardId = u32;

/// Node identifier (also used for account addresses).
pub type NodeId = String;

/// Ledger error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Malformed transaction or block fields at construction time.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Transaction failed validation.
    #[error("Invalid transaction {hash}: {reason}")]
    InvalidTransaction {
        /// Hash of the rejected transaction
        hash: Hash,
        /// Why it was rejected
        reason: String,
    },

    /// Signature rejected by the configured verifier.
    #[error("Signature rejected for transaction {0}")]
    InvalidSignature(Hash),

    /// Duplicate hash in history or mempool.
    #[error("Transaction already exists: {0}")]
    AlreadyExists(Hash),

    /// Mempool at capacity.
    #[error("Mempool full: capacity {capacity}")]
    MempoolFull {
        /// Configured capacity
        capacity: usize,
    },

    /// Block failed validation against the chain head.
    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    /// Hex decoding failure.
    #[error("Invalid hex: {0}")]
    InvalidHex(String),
}

impl LedgerError {
    /// Duplicates are idempotent no-ops, not failures.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_block_error() {
        let err = LedgerError::InvalidBlock("height 7 does not follow 5".to_string());
        assert!(err.to_string().contains("height 7"));
    }

    #[test]
    fn test_mempool_full_error() {
        let err = LedgerError::MempoolFull { capacity: 10 };
        assert!(err.to_string().contains("10"));
    }

    #[test]
    fn test_duplicate_is_idempotent() {
        assert!(LedgerError::AlreadyExists(Hash::ZERO).is_duplicate());
        assert!(!LedgerError::InvalidInput("x".into()).is_duplicate());
    }
}
