//! # Topology Manager
//!
//! Owns every shard and the node → shard map. Node reassignment removes
//! the node from its previous shard and adds it to the new one inside one
//! write guard, so a node is never observed in two shards.

use crate::algorithms::{assign_node, route_within_layer};
use crate::cross_channel::DualConfirmationChannel;
use crate::domain::{Shard, ShardError, ShardResult, ShardStatus, TopologyConfig, TopologyStatus};
use crate::ports::CrossShardGateway;
use parking_lot::RwLock;
use sl_01_ledger::{Chain, NodeId, ShardId, Transaction};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn, Span};

struct TopologyInner {
    shards: BTreeMap<ShardId, Shard>,
    node_to_shard: HashMap<NodeId, ShardId>,
}

/// Shard registry, node placement and cross-shard hand-off.
pub struct TopologyManager {
    config: TopologyConfig,
    inner: RwLock<TopologyInner>,
    confirmations: DualConfirmationChannel,
    gateway: Option<Arc<dyn CrossShardGateway>>,
    span: Span,
}

impl TopologyManager {
    /// Topology with one fresh chain per shard.
    pub fn new(config: TopologyConfig) -> ShardResult<Self> {
        config.validate()?;
        let span = tracing::info_span!("topology");
        let mut shards = BTreeMap::new();
        for layer in 0..config.layer_count {
            for index in 0..config.shard_count {
                let id = config.shard_id(layer, index);
                let chain = Chain::with_config(id, config.chain.clone())
                    .with_span(tracing::info_span!(parent: &span, "chain", shard = id));
                shards.insert(id, Shard::new(id, layer, Arc::new(chain)));
            }
        }
        info!(
            parent: &span,
            shards = shards.len(),
            layers = config.layer_count,
            "[sl-04] Topology created"
        );

        Ok(Self {
            config,
            inner: RwLock::new(TopologyInner {
                shards,
                node_to_shard: HashMap::new(),
            }),
            confirmations: DualConfirmationChannel::new()
                .with_span(tracing::info_span!(parent: &span, "dual_confirmation")),
            gateway: None,
            span,
        })
    }

    /// Forward cross-shard transfers through `gateway`.
    pub fn with_gateway(mut self, gateway: Arc<dyn CrossShardGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Log under `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Topology shape.
    pub fn config(&self) -> &TopologyConfig {
        &self.config
    }

    /// Dual-confirmation tracking for cross-shard transfers.
    pub fn confirmations(&self) -> &DualConfirmationChannel {
        &self.confirmations
    }

    /// Move `node` into `shard`, replacing any earlier assignment.
    pub fn assign_node_to_shard(
        &self,
        node: impl Into<NodeId>,
        shard: ShardId,
        is_relay: bool,
    ) -> ShardResult<()> {
        let node = node.into();
        let mut inner = self.inner.write();
        if !inner.shards.contains_key(&shard) {
            return Err(ShardError::NoSuchShard(shard));
        }

        let previous = inner.node_to_shard.insert(node.clone(), shard);
        if let Some(old) = previous.filter(|old| *old != shard) {
            if let Some(old_shard) = inner.shards.get_mut(&old) {
                old_shard.remove_member(&node);
            }
        }
        if let Some(target) = inner.shards.get_mut(&shard) {
            target.add_member(node.clone(), is_relay);
        }
        info!(parent: &self.span, %node, shard, is_relay, previous = ?previous, "[sl-04] Node assigned");
        Ok(())
    }

    /// Assign `node` to the shard its stable hash selects.
    pub fn auto_assign_node_to_shard(
        &self,
        node: impl Into<NodeId>,
        is_relay: bool,
    ) -> ShardResult<ShardId> {
        let node = node.into();
        let shard = assign_node(&node, &self.config);
        self.assign_node_to_shard(node, shard, is_relay)?;
        Ok(shard)
    }

    /// Drop `node` from the topology. Returns its former shard.
    pub fn remove_node(&self, node: &str) -> Option<ShardId> {
        let mut inner = self.inner.write();
        let shard = inner.node_to_shard.remove(node)?;
        if let Some(entry) = inner.shards.get_mut(&shard) {
            entry.remove_member(node);
        }
        debug!(parent: &self.span, node, shard, "[sl-04] Node removed");
        Some(shard)
    }

    /// Shard `node` is assigned to.
    pub fn get_node_shard(&self, node: &str) -> ShardResult<ShardId> {
        self.inner
            .read()
            .node_to_shard
            .get(node)
            .copied()
            .ok_or_else(|| ShardError::NodeNotAssigned(node.to_string()))
    }

    /// Snapshot of one shard.
    pub fn get_shard(&self, shard: ShardId) -> ShardResult<ShardStatus> {
        self.inner
            .read()
            .shards
            .get(&shard)
            .map(Shard::status)
            .ok_or(ShardError::NoSuchShard(shard))
    }

    /// Chain owned by `shard`.
    pub fn chain_for(&self, shard: ShardId) -> ShardResult<Arc<Chain>> {
        self.inner
            .read()
            .shards
            .get(&shard)
            .map(|entry| Arc::clone(entry.chain()))
            .ok_or(ShardError::NoSuchShard(shard))
    }

    /// All shard ids, ascending.
    pub fn shard_ids(&self) -> Vec<ShardId> {
        self.inner.read().shards.keys().copied().collect()
    }

    /// Relay nodes across all shards, sorted.
    pub fn relay_nodes(&self) -> Vec<NodeId> {
        let inner = self.inner.read();
        let mut nodes: Vec<NodeId> = inner
            .shards
            .values()
            .flat_map(|shard| shard.relay_nodes().iter().cloned())
            .collect();
        nodes.sort();
        nodes
    }

    /// Owning shard for `tx`: its target when that shard exists, otherwise
    /// the recipient's shard within the source shard's layer.
    pub fn route_transaction(&self, tx: &Transaction) -> ShardId {
        let inner = self.inner.read();
        if inner.shards.contains_key(&tx.target_shard()) {
            return tx.target_shard();
        }
        let layer = if inner.shards.contains_key(&tx.source_shard()) {
            self.config.layer_of(tx.source_shard())
        } else {
            0
        };
        route_within_layer(tx.recipient(), layer, &self.config)
    }

    /// Validate a cross-shard transfer, record it as outgoing on its source
    /// shard, track it for dual confirmation and forward it to the relay.
    pub fn process_cross_shard_transaction(&self, tx: Transaction) -> ShardResult<()> {
        let hash = tx.hash();
        if !tx.is_cross_shard() {
            return Err(ShardError::NotCrossShard(hash));
        }
        tx.check()?;

        {
            let mut inner = self.inner.write();
            if !inner.shards.contains_key(&tx.target_shard()) {
                return Err(ShardError::NoSuchShard(tx.target_shard()));
            }
            let source = inner
                .shards
                .get_mut(&tx.source_shard())
                .ok_or(ShardError::NoSuchShard(tx.source_shard()))?;
            source.record_outgoing(hash);
        }

        self.confirmations.register(tx.clone())?;
        if let Some(gateway) = &self.gateway {
            match gateway.forward(tx.clone()) {
                Ok(()) => {}
                Err(err) if err.is_duplicate() => {
                    debug!(parent: &self.span, %hash, "[sl-04] Transfer already with the relay");
                    return Err(err);
                }
                Err(err) => {
                    warn!(parent: &self.span, %hash, error = %err, "[sl-04] Gateway refused transfer");
                    return Err(err);
                }
            }
        }
        info!(
            parent: &self.span,
            %hash,
            source = tx.source_shard(),
            target = tx.target_shard(),
            "[sl-04] Cross-shard transfer handed to relay"
        );
        Ok(())
    }

    /// Topology snapshot.
    pub fn status(&self) -> TopologyStatus {
        let (pending, confirmed) = self.confirmations.counts();
        let inner = self.inner.read();
        TopologyStatus {
            shard_count: self.config.shard_count,
            layer_count: self.config.layer_count,
            assigned_nodes: inner.node_to_shard.len(),
            pending_confirmations: pending,
            confirmed_transfers: confirmed,
            shards: inner.shards.values().map(Shard::status).collect(),
        }
    }
}

impl std::fmt::Debug for TopologyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopologyManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::RecordingGateway;
    use sl_01_ledger::test_utils::signed_transfer;
    use tokio_test::{assert_err, assert_ok};

    fn manager() -> TopologyManager {
        TopologyManager::new(TopologyConfig {
            shard_count: 2,
            layer_count: 2,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_shards_and_chains_created() {
        let manager = manager();
        assert_eq!(manager.shard_ids(), vec![0, 1, 2, 3]);
        let chain = manager.chain_for(3).unwrap();
        assert_eq!(chain.shard_id(), 3);
        assert_eq!(manager.get_shard(2).unwrap().layer, 1);
        assert_err!(manager.chain_for(4));
    }

    #[test]
    fn test_reassignment_moves_node() {
        let manager = manager();
        assert_ok!(manager.assign_node_to_shard("n1", 0, true));
        assert_ok!(manager.assign_node_to_shard("n1", 1, false));

        assert_eq!(manager.get_node_shard("n1"), Ok(1));
        assert!(manager.get_shard(0).unwrap().members.is_empty());
        assert_eq!(manager.get_shard(0).unwrap().relay_nodes, 0);
        assert_eq!(manager.get_shard(1).unwrap().members, vec!["n1".to_string()]);
        assert!(manager.relay_nodes().is_empty());
    }

    #[test]
    fn test_assign_to_missing_shard() {
        let manager = manager();
        assert_eq!(
            manager.assign_node_to_shard("n1", 9, false),
            Err(ShardError::NoSuchShard(9))
        );
        assert_eq!(
            manager.get_node_shard("n1"),
            Err(ShardError::NodeNotAssigned("n1".into()))
        );
    }

    #[test]
    fn test_auto_assign_is_idempotent() {
        let manager = manager();
        let first = assert_ok!(manager.auto_assign_node_to_shard("node-7", true));
        let second = assert_ok!(manager.auto_assign_node_to_shard("node-7", true));
        assert_eq!(first, second);
        assert_eq!(manager.status().assigned_nodes, 1);
        assert_eq!(manager.relay_nodes(), vec!["node-7".to_string()]);
        let members: usize = manager.status().shards.iter().map(|s| s.members.len()).sum();
        assert_eq!(members, 1);
    }

    #[test]
    fn test_remove_node() {
        let manager = manager();
        manager.assign_node_to_shard("n1", 2, true).unwrap();
        assert_eq!(manager.remove_node("n1"), Some(2));
        assert_eq!(manager.remove_node("n1"), None);
        assert!(manager.relay_nodes().is_empty());
    }

    #[test]
    fn test_route_uses_valid_target() {
        let manager = manager();
        let tx = signed_transfer("a", "b", 1, 0, 3);
        assert_eq!(manager.route_transaction(&tx), 3);
    }

    #[test]
    fn test_route_falls_back_to_recipient_within_source_layer() {
        let manager = manager();
        for n in 0..20 {
            let tx = signed_transfer("a", &format!("recipient-{n}"), 1, 2, 99);
            let shard = manager.route_transaction(&tx);
            assert!(shard == 2 || shard == 3);
            assert_eq!(shard, manager.route_transaction(&tx));
        }
    }

    #[test]
    fn test_cross_shard_transfer_forwarded_and_tracked() {
        let gateway = Arc::new(RecordingGateway::new());
        let manager = manager().with_gateway(gateway.clone());
        let tx = signed_transfer("a", "b", 5, 0, 1);

        assert_ok!(manager.process_cross_shard_transaction(tx.clone()));
        assert_eq!(gateway.take(), vec![tx.clone()]);
        assert_eq!(manager.get_shard(0).unwrap().outgoing_transfers, 1);
        assert_eq!(manager.status().pending_confirmations, 1);

        manager.confirmations().confirm_transaction(&tx.hash(), 0).unwrap();
        manager.confirmations().confirm_transaction(&tx.hash(), 1).unwrap();
        assert_eq!(manager.status().confirmed_transfers, 1);
    }

    #[test]
    fn test_cross_shard_rejections() {
        let gateway = Arc::new(RecordingGateway::new());
        let manager = manager().with_gateway(gateway.clone());

        let same = signed_transfer("a", "b", 5, 1, 1);
        assert_eq!(
            manager.process_cross_shard_transaction(same.clone()),
            Err(ShardError::NotCrossShard(same.hash()))
        );
        assert_eq!(
            manager.process_cross_shard_transaction(signed_transfer("a", "b", 5, 0, 8)),
            Err(ShardError::NoSuchShard(8))
        );
        assert_eq!(
            manager.process_cross_shard_transaction(signed_transfer("a", "b", 5, 8, 0)),
            Err(ShardError::NoSuchShard(8))
        );
        assert!(gateway.is_empty());
    }

    #[test]
    fn test_concurrent_reassignment_keeps_single_membership() {
        let manager = Arc::new(manager());
        let handles: Vec<_> = (0..4u32)
            .map(|t| {
                let manager = Arc::clone(&manager);
                std::thread::spawn(move || {
                    for n in 0..50u32 {
                        manager
                            .assign_node_to_shard(format!("n{}", n % 5), (t + n) % 4, n % 2 == 0)
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let status = manager.status();
        let members: usize = status.shards.iter().map(|s| s.members.len()).sum();
        assert_eq!(members, 5);
        assert_eq!(status.assigned_nodes, 5);
    }
}
