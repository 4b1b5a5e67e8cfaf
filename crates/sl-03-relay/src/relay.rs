//! # Cross-Channel Relay
//!
//! State machine for cross-shard transfers. All relay state lives behind one
//! `RwLock`; batching (snapshot-and-clear of a target queue) and
//! finalization each happen inside a single write guard, so a submitted
//! transfer is never lost or batched twice and a block finalizes once.

use crate::domain::{
    Channel, ChannelStatus, RelayBlock, RelayConfig, RelayError, RelayEvent, RelayOutcome,
    RelayResult, RelayStatus, TransferState,
};
use parking_lot::RwLock;
use sl_01_ledger::{Hash, NodeId, ShardId, SystemTimeSource, TimeSource, Transaction};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn, Span};

const EVENT_CAPACITY: usize = 256;

#[derive(Default)]
struct RelayInner {
    relay_nodes: BTreeSet<NodeId>,
    channels: BTreeMap<(ShardId, ShardId), Channel>,
    queues: HashMap<ShardId, Vec<Transaction>>,
    pending: HashMap<String, RelayBlock>,
    finalized: HashMap<String, RelayBlock>,
    // finalization order
    finalized_order: Vec<String>,
    delivered: HashSet<String>,
    transfers: HashMap<Hash, TransferState>,
    next_seq: u64,
}

impl RelayInner {
    fn lookup(&self, id: &str) -> Option<&RelayBlock> {
        self.pending.get(id).or_else(|| self.finalized.get(id))
    }
}

/// Batching relay between shards.
pub struct CrossChannelRelay {
    config: RelayConfig,
    inner: RwLock<RelayInner>,
    events: broadcast::Sender<RelayEvent>,
    time: Arc<dyn TimeSource>,
    span: Span,
}

impl CrossChannelRelay {
    /// Relay with the given thresholds.
    pub fn new(config: RelayConfig) -> RelayResult<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            config,
            inner: RwLock::new(RelayInner::default()),
            events,
            time: Arc::new(SystemTimeSource),
            span: tracing::info_span!("relay"),
        })
    }

    /// Stamp relay blocks from `time`.
    pub fn with_time_source(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = time;
        self
    }

    /// Log under `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Thresholds in use.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Subscribe to relay block lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: RelayEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    /// Authorize `node` to validate relay blocks.
    pub fn register_relay_node(&self, node: impl Into<NodeId>) {
        let node = node.into();
        if self.inner.write().relay_nodes.insert(node.clone()) {
            info!(parent: &self.span, %node, "[sl-03] Relay node registered");
        }
    }

    /// Revoke a relay node; false if it was not registered.
    pub fn remove_relay_node(&self, node: &str) -> bool {
        self.inner.write().relay_nodes.remove(node)
    }

    /// Registered relay nodes, sorted.
    pub fn relay_nodes(&self) -> Vec<NodeId> {
        self.inner.read().relay_nodes.iter().cloned().collect()
    }

    /// Queue a cross-shard transfer. Returns the relay block id when this
    /// submission filled the target queue.
    pub fn submit_cross_shard_transaction(&self, tx: Transaction) -> RelayResult<Option<String>> {
        let hash = tx.hash();
        if !tx.is_cross_shard() {
            return Err(RelayError::NotCrossShard(hash));
        }
        tx.check()?;

        let (source, target) = (tx.source_shard(), tx.target_shard());
        let created = {
            let mut inner = self.inner.write();
            if inner.transfers.contains_key(&hash) {
                return Err(RelayError::AlreadyExists(hash));
            }
            inner.transfers.insert(hash, TransferState::Queued);
            inner
                .channels
                .entry((source, target))
                .or_insert_with(|| Channel::new(source, target))
                .push(tx.clone());
            let queue = inner.queues.entry(target).or_default();
            queue.push(tx);
            let queued = queue.len();
            debug!(parent: &self.span, %hash, source, target, queued, "[sl-03] Cross-shard transfer queued");

            if queued >= self.config.batch_threshold {
                self.batch_locked(&mut inner, target)
            } else {
                None
            }
        };

        if let Some(id) = &created {
            self.publish(RelayEvent::RelayBlockCreated {
                id: id.clone(),
                target,
            });
        }
        Ok(created)
    }

    /// Snapshot and clear the target queue into a new relay block.
    fn batch_locked(&self, inner: &mut RelayInner, target: ShardId) -> Option<String> {
        let transactions = std::mem::take(inner.queues.get_mut(&target)?);
        if transactions.is_empty() {
            return None;
        }

        let id = format!("relay_{target}_{}", inner.next_seq);
        inner.next_seq += 1;
        let block = RelayBlock::new(id.clone(), self.time.now_millis(), target, transactions);
        for hash in block.transaction_hashes() {
            inner
                .transfers
                .insert(hash, TransferState::Batched(id.clone()));
        }
        info!(
            parent: &self.span,
            %id,
            hash = %block.hash(),
            transactions = block.transactions().len(),
            target,
            "[sl-03] Relay block created"
        );
        inner.pending.insert(id.clone(), block);
        Some(id)
    }

    /// Batch whatever is queued for `target` regardless of the threshold.
    pub fn force_create_relay_block(&self, target: ShardId) -> Option<String> {
        let created = self.batch_locked(&mut self.inner.write(), target);
        if let Some(id) = &created {
            self.publish(RelayEvent::RelayBlockCreated {
                id: id.clone(),
                target,
            });
        }
        created
    }

    /// Run the structural check on behalf of each of `validators`, recording
    /// a positive vote per pass, until the validation threshold finalizes
    /// the block. A failed check drops the block.
    pub fn validate_relay_block(&self, id: &str, validators: &[NodeId]) -> RelayResult<RelayOutcome> {
        let mut outcome = RelayOutcome::Pending { approvals: 0 };
        for node in validators {
            let check = {
                let inner = self.inner.read();
                if inner.finalized.contains_key(id) {
                    return Ok(RelayOutcome::AlreadyFinalized);
                }
                let block = inner
                    .pending
                    .get(id)
                    .ok_or_else(|| RelayError::UnknownRelayBlock(id.to_string()))?;
                if !inner.relay_nodes.contains(node) {
                    warn!(parent: &self.span, %id, %node, "[sl-03] Validation by unregistered node skipped");
                    continue;
                }
                block.structural_check()
            };

            if let Err(reason) = check {
                self.drop_relay_block(id, &reason);
                return Err(RelayError::RelayValidationFailed {
                    id: id.to_string(),
                    reason,
                });
            }
            outcome = self.record_validation_vote(id, node, true)?;
            if matches!(
                outcome,
                RelayOutcome::Finalized | RelayOutcome::AlreadyFinalized
            ) {
                break;
            }
        }
        Ok(outcome)
    }

    /// Validate on behalf of every registered relay node.
    pub fn validate_with_registered_nodes(&self, id: &str) -> RelayResult<RelayOutcome> {
        let nodes = self.relay_nodes();
        self.validate_relay_block(id, &nodes)
    }

    /// Record a vote from `node`. Negative votes are kept but never count;
    /// votes from unregistered nodes are ignored.
    pub fn record_validation_vote(
        &self,
        id: &str,
        node: &str,
        accept: bool,
    ) -> RelayResult<RelayOutcome> {
        let approvals = {
            let mut inner = self.inner.write();
            if inner.finalized.contains_key(id) {
                return Ok(RelayOutcome::AlreadyFinalized);
            }
            if !inner.relay_nodes.contains(node) {
                debug!(parent: &self.span, %id, %node, "[sl-03] Vote from unregistered node ignored");
                return Ok(RelayOutcome::Ignored);
            }

            let inner = &mut *inner;
            let block = inner
                .pending
                .get_mut(id)
                .ok_or_else(|| RelayError::UnknownRelayBlock(id.to_string()))?;
            block.record_vote(node.to_string(), accept);
            let approvals = block.approvals();
            for hash in block.transaction_hashes() {
                inner
                    .transfers
                    .insert(hash, TransferState::Validating(id.to_string()));
            }
            approvals
        };

        debug!(parent: &self.span, %id, %node, accept, approvals, "[sl-03] Relay vote recorded");
        if approvals >= self.config.validation_threshold {
            return Ok(if self.finalize_relay_block(id) {
                RelayOutcome::Finalized
            } else {
                RelayOutcome::AlreadyFinalized
            });
        }
        Ok(RelayOutcome::Pending { approvals })
    }

    /// Move a pending relay block to the finalized set. Returns false when
    /// it is already finalized, unknown, or short of the validation
    /// threshold.
    pub fn finalize_relay_block(&self, id: &str) -> bool {
        let event = {
            let mut inner = self.inner.write();
            let approvals = inner.pending.get(id).map(RelayBlock::approvals);
            match approvals {
                None => return false,
                Some(approvals) if approvals < self.config.validation_threshold => {
                    debug!(parent: &self.span, %id, approvals, "[sl-03] Finalization refused below threshold");
                    return false;
                }
                Some(_) => {}
            }
            let Some(mut block) = inner.pending.remove(id) else {
                return false;
            };
            block.mark_finalized();

            let hashes = block.transaction_hashes();
            for &target in block.target_shards() {
                for &source in block.source_shards() {
                    if let Some(channel) = inner.channels.get_mut(&(source, target)) {
                        channel.mark_processed(block.timestamp());
                        channel.forget(&hashes);
                    }
                }
            }
            for hash in &hashes {
                inner
                    .transfers
                    .insert(*hash, TransferState::Finalized(id.to_string()));
            }

            info!(
                parent: &self.span,
                %id,
                approvals = block.approvals(),
                transactions = hashes.len(),
                "[sl-03] Relay block finalized"
            );
            let target = block.target_shards().first().copied().unwrap_or_default();
            inner.finalized_order.push(id.to_string());
            inner.finalized.insert(id.to_string(), block);
            RelayEvent::RelayBlockFinalized {
                id: id.to_string(),
                target,
                transaction_hashes: hashes,
            }
        };
        self.publish(event);
        true
    }

    fn drop_relay_block(&self, id: &str, reason: &str) {
        {
            let mut inner = self.inner.write();
            let Some(block) = inner.pending.remove(id) else {
                return;
            };
            let hashes = block.transaction_hashes();
            for hash in &hashes {
                inner.transfers.remove(hash);
            }
            for channel in inner.channels.values_mut() {
                channel.forget(&hashes);
            }
        }
        warn!(parent: &self.span, %id, reason, "[sl-03] Relay block dropped");
        self.publish(RelayEvent::RelayBlockDropped {
            id: id.to_string(),
            reason: reason.to_string(),
        });
    }

    /// Transfers of every finalized relay block targeting `target`, in
    /// finalization order.
    pub fn get_cross_shard_transactions(&self, target: ShardId) -> Vec<Transaction> {
        let inner = self.inner.read();
        inner
            .finalized_order
            .iter()
            .filter_map(|id| inner.finalized.get(id))
            .filter(|block| block.target_shards().contains(&target))
            .flat_map(|block| block.transactions().iter().cloned())
            .collect()
    }

    /// Finalized transfers for `target` not handed out before.
    pub fn take_deliverable(&self, target: ShardId) -> Vec<Transaction> {
        let mut inner = self.inner.write();
        let inner = &mut *inner;
        let mut out = Vec::new();
        for id in &inner.finalized_order {
            let Some(block) = inner.finalized.get(id) else {
                continue;
            };
            if block.target_shards().contains(&target) && inner.delivered.insert(id.clone()) {
                out.extend(block.transactions().iter().cloned());
            }
        }
        out
    }

    /// Lifecycle position of a transfer.
    pub fn transfer_state(&self, hash: &Hash) -> Option<TransferState> {
        self.inner.read().transfers.get(hash).cloned()
    }

    /// Pending or finalized relay block.
    pub fn get_relay_block(&self, id: &str) -> Option<RelayBlock> {
        self.inner.read().lookup(id).cloned()
    }

    /// Ids of relay blocks collecting votes, sorted.
    pub fn pending_relay_blocks(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.read().pending.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Transfers waiting in `target`'s queue.
    pub fn queued_for(&self, target: ShardId) -> usize {
        self.inner.read().queues.get(&target).map_or(0, Vec::len)
    }

    /// One channel's snapshot.
    pub fn channel_status(&self, source: ShardId, target: ShardId) -> Option<ChannelStatus> {
        self.inner
            .read()
            .channels
            .get(&(source, target))
            .map(Channel::status)
    }

    /// Relay snapshot.
    pub fn status(&self) -> RelayStatus {
        let inner = self.inner.read();
        RelayStatus {
            relay_nodes: inner.relay_nodes.len(),
            active_channels: inner.channels.len(),
            pending_relay_blocks: inner.pending.len(),
            finalized_relay_blocks: inner.finalized.len(),
            queued_transactions: inner.queues.values().map(Vec::len).sum(),
            batch_threshold: self.config.batch_threshold,
            validation_threshold: self.config.validation_threshold,
            channels: inner.channels.values().map(Channel::status).collect(),
        }
    }
}

impl std::fmt::Debug for CrossChannelRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrossChannelRelay")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
