//! # Dual Confirmation
//!
//! A cross-shard transfer counts as confirmed once both its source and its
//! target shard have acknowledged it. Confirmations are a set of shard ids
//! per transfer, so a repeated confirmation from one shard counts once.

use crate::domain::{ShardError, ShardResult};
use parking_lot::RwLock;
use sl_01_ledger::{Hash, ShardId, Transaction};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, Span};

/// Distinct shard confirmations required. Covers exactly the source and
/// target of a two-shard transfer.
pub const DUAL_CONFIRMATION_THRESHOLD: usize = 2;

struct PendingTransfer {
    tx: Transaction,
    confirmations: BTreeSet<ShardId>,
}

#[derive(Default)]
struct ChannelInner {
    pending: HashMap<Hash, PendingTransfer>,
    confirmed: HashMap<Hash, Transaction>,
}

/// Tracks source and target acknowledgements of cross-shard transfers.
pub struct DualConfirmationChannel {
    inner: RwLock<ChannelInner>,
    span: Span,
}

impl Default for DualConfirmationChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl DualConfirmationChannel {
    /// Empty channel.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(ChannelInner::default()),
            span: tracing::info_span!("dual_confirmation"),
        }
    }

    /// Log under `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Start tracking `tx`. Returns false if it is already tracked.
    pub fn register(&self, tx: Transaction) -> ShardResult<bool> {
        let hash = tx.hash();
        if !tx.is_cross_shard() {
            return Err(ShardError::NotCrossShard(hash));
        }
        let mut inner = self.inner.write();
        if inner.pending.contains_key(&hash) || inner.confirmed.contains_key(&hash) {
            return Ok(false);
        }
        inner.pending.insert(
            hash,
            PendingTransfer {
                tx,
                confirmations: BTreeSet::new(),
            },
        );
        Ok(true)
    }

    /// Record that `shard` has acknowledged the transfer. Returns true once
    /// the transfer is confirmed by both of its shards.
    pub fn confirm_transaction(&self, hash: &Hash, shard: ShardId) -> ShardResult<bool> {
        let mut inner = self.inner.write();
        if inner.confirmed.contains_key(hash) {
            return Ok(true);
        }
        let entry = inner
            .pending
            .get_mut(hash)
            .ok_or(ShardError::UnknownTransfer(*hash))?;
        if shard != entry.tx.source_shard() && shard != entry.tx.target_shard() {
            return Err(ShardError::NotParticipant { hash: *hash, shard });
        }

        entry.confirmations.insert(shard);
        let count = entry.confirmations.len();
        debug!(parent: &self.span, %hash, shard, count, "[sl-04] Cross-shard confirmation recorded");
        if count < DUAL_CONFIRMATION_THRESHOLD {
            return Ok(false);
        }

        if let Some(mut done) = inner.pending.remove(hash) {
            done.tx.mark_confirmed();
            inner.confirmed.insert(*hash, done.tx);
            info!(parent: &self.span, %hash, "[sl-04] Cross-shard transfer confirmed by both shards");
        }
        Ok(true)
    }

    /// Whether both shards have confirmed.
    pub fn is_transaction_confirmed(&self, hash: &Hash) -> bool {
        self.inner.read().confirmed.contains_key(hash)
    }

    /// Shards that have confirmed a pending transfer.
    pub fn confirmations(&self, hash: &Hash) -> Vec<ShardId> {
        self.inner
            .read()
            .pending
            .get(hash)
            .map(|entry| entry.confirmations.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Transfers still awaiting confirmation.
    pub fn pending(&self) -> Vec<Transaction> {
        self.inner
            .read()
            .pending
            .values()
            .map(|entry| entry.tx.clone())
            .collect()
    }

    /// Transfers confirmed by both shards.
    pub fn confirmed(&self) -> Vec<Transaction> {
        self.inner.read().confirmed.values().cloned().collect()
    }

    /// `(pending, confirmed)` counts.
    pub fn counts(&self) -> (usize, usize) {
        let inner = self.inner.read();
        (inner.pending.len(), inner.confirmed.len())
    }
}
