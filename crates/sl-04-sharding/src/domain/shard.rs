//! # Shard

use super::ShardStatus;
use sl_01_ledger::{Chain, Hash, NodeId, ShardId};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// One partition of the ledger and the nodes serving it.
pub struct Shard {
    id: ShardId,
    layer: u32,
    members: BTreeSet<NodeId>,
    relay_nodes: BTreeSet<NodeId>,
    chain: Arc<Chain>,
    outgoing: HashSet<Hash>,
}

impl Shard {
    /// Empty shard owning `chain`.
    pub fn new(id: ShardId, layer: u32, chain: Arc<Chain>) -> Self {
        Self {
            id,
            layer,
            members: BTreeSet::new(),
            relay_nodes: BTreeSet::new(),
            chain,
            outgoing: HashSet::new(),
        }
    }

    /// Shard id.
    pub fn id(&self) -> ShardId {
        self.id
    }

    /// Layer the shard belongs to.
    pub fn layer(&self) -> u32 {
        self.layer
    }

    /// Member nodes, sorted.
    pub fn members(&self) -> &BTreeSet<NodeId> {
        &self.members
    }

    /// Members authorized to relay.
    pub fn relay_nodes(&self) -> &BTreeSet<NodeId> {
        &self.relay_nodes
    }

    /// The shard's chain.
    pub fn chain(&self) -> &Arc<Chain> {
        &self.chain
    }

    /// Whether `node` is a member.
    pub fn contains(&self, node: &str) -> bool {
        self.members.contains(node)
    }

    /// Cross-shard transfers sent from this shard.
    pub fn outgoing(&self) -> &HashSet<Hash> {
        &self.outgoing
    }

    pub(crate) fn add_member(&mut self, node: NodeId, is_relay: bool) {
        if is_relay {
            self.relay_nodes.insert(node.clone());
        } else {
            self.relay_nodes.remove(&node);
        }
        self.members.insert(node);
    }

    pub(crate) fn remove_member(&mut self, node: &str) -> bool {
        self.relay_nodes.remove(node);
        self.members.remove(node)
    }

    pub(crate) fn record_outgoing(&mut self, hash: Hash) -> bool {
        self.outgoing.insert(hash)
    }

    /// Monitoring snapshot.
    pub fn status(&self) -> ShardStatus {
        ShardStatus {
            id: self.id,
            layer: self.layer,
            members: self.members.iter().cloned().collect(),
            relay_nodes: self.relay_nodes.len(),
            outgoing_transfers: self.outgoing.len(),
            height: self.chain.get_height(),
            pending_transactions: self.chain.pending_count(),
        }
    }
}

impl std::fmt::Debug for Shard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shard")
            .field("id", &self.id)
            .field("layer", &self.layer)
            .field("members", &self.members)
            .field("relay_nodes", &self.relay_nodes)
            .finish_non_exhaustive()
    }
}
