//! # SL-04 Sharding
//!
//! Shard topology, node placement and transaction routing.
//!
//! **Subsystem ID:** 4
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! - Partition the ledger into `layer_count × shard_count` shards, each
//!   owning its own [`Chain`](sl_01_ledger::Chain)
//! - Keep every node in exactly one shard (reassignment is remove-then-add)
//! - Route transactions to their owning shard by stable hash
//! - Hand cross-shard transfers to the relay through [`CrossShardGateway`]
//!   and track source/target acknowledgement in [`DualConfirmationChannel`]
//!
//! ## Module Structure
//!
//! ```text
//! sl-04-sharding/
//! ├── domain/           # Shard, TopologyConfig, status, errors
//! ├── algorithms/       # Stable-hash assignment and routing
//! ├── cross_channel.rs  # Dual confirmation
//! ├── manager.rs        # TopologyManager
//! └── ports/            # CrossShardGateway
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algorithms;
pub mod cross_channel;
pub mod domain;
pub mod manager;
pub mod ports;

// Re-exports
pub use algorithms::{assign_node, route_within_layer, stable_hash};
pub use cross_channel::{DualConfirmationChannel, DUAL_CONFIRMATION_THRESHOLD};
pub use domain::{Shard, ShardError, ShardResult, ShardStatus, TopologyConfig, TopologyStatus};
pub use manager::TopologyManager;
pub use ports::{CrossShardGateway, RecordingGateway};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
