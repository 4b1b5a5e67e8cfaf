//! # SL-01 Ledger
//!
//! Ledger entities and the per-shard chain.
//!
//! **Subsystem ID:** 1
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! - Immutable-after-creation [`Transaction`] and [`Block`] records with
//!   deterministic hashing over a fixed field order
//! - Merkle root over the ordered transaction hashes of a block
//! - [`Chain`]: one shard's append-only block list, its mempool and a
//!   hash index over history
//!
//! ## Commit Invariant
//!
//! `Chain::add_block` appends the block, indexes its transactions and drains
//! them from the mempool under one write lock. No reader can observe the
//! post-commit block list together with the pre-drain mempool.
//!
//! ## Module Structure
//!
//! ```text
//! sl-01-ledger/
//! ├── domain/          # Hash, Transaction, Block, merkle root, errors
//! ├── chain.rs         # Chain (blocks + mempool + index)
//! ├── ports/           # TransactionSigner, SignatureVerifier, TimeSource
//! └── adapters/        # HMAC-SHA256 keyed signer
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod chain;
pub mod domain;
pub mod ports;

/// Deterministic fixtures for tests.
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-exports
pub use adapters::HmacSigner;
pub use chain::{Chain, ChainConfig, ChainEvent, ChainStatus};
pub use domain::{
    merkle_root, Block, Hash, LedgerError, LedgerResult, NodeId, ShardId, Transaction,
    TransferRequest, GENESIS_PROPOSER,
};
pub use ports::{
    PresenceVerifier, SignatureVerifier, SystemTimeSource, TimeSource, TransactionSigner,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
