//! # Shard-Ledger Test Suite
//!
//! Cross-crate flows that no single subsystem crate can exercise alone.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── cross_shard_flow.rs    # submit → relay → inject → dual confirmation
//!     ├── quorum_network.rs      # four PBFT replicas over LocalNetwork
//!     └── consensus_variants.rs  # PoS/PoW commit and block replay
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p sl-tests
//! cargo test -p sl-tests integration::quorum_network
//! ```

pub mod integration;
