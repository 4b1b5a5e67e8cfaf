//! # Shard Assignment
//!
//! Deterministic node placement and transaction routing. Both reduce a
//! string to a stable 64-bit value so that every node computes the same
//! answer from the same topology.

use crate::domain::TopologyConfig;
use sl_01_ledger::{Hash, ShardId};

/// First 8 bytes of SHA-256 over `key`, big-endian.
pub fn stable_hash(key: &str) -> u64 {
    Hash::digest(key.as_bytes()).prefix_u64()
}

/// Shard for `node` across the whole topology.
pub fn assign_node(node: &str, config: &TopologyConfig) -> ShardId {
    let total = u64::from(config.total_shards().max(1));
    // total fits in u32, so the remainder does too
    (stable_hash(node) % total) as ShardId
}

/// Shard owning `recipient` within `layer`.
pub fn route_within_layer(recipient: &str, layer: u32, config: &TopologyConfig) -> ShardId {
    let per_layer = u64::from(config.shard_count.max(1));
    let index = (stable_hash(recipient) % per_layer) as u32;
    config.shard_id(layer, index)
}
