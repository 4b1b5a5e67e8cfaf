//! # Topology Status

use serde::Serialize;
use sl_01_ledger::{NodeId, ShardId};

/// One shard's snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardStatus {
    /// Shard id
    pub id: ShardId,
    /// Layer
    pub layer: u32,
    /// Member node ids, sorted
    pub members: Vec<NodeId>,
    /// Relay-node count
    pub relay_nodes: usize,
    /// Cross-shard transfers sent from this shard
    pub outgoing_transfers: usize,
    /// Chain height
    pub height: u64,
    /// Mempool size
    pub pending_transactions: usize,
}

/// Whole-topology snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopologyStatus {
    /// Shards per layer
    pub shard_count: u32,
    /// Layers
    pub layer_count: u32,
    /// Assigned nodes
    pub assigned_nodes: usize,
    /// Transfers awaiting a second confirmation
    pub pending_confirmations: usize,
    /// Transfers confirmed by both shards
    pub confirmed_transfers: usize,
    /// Per-shard snapshots, by id
    pub shards: Vec<ShardStatus>,
}
