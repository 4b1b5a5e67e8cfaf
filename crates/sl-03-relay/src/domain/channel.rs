//! # Relay Channel
//!
//! One `(source, target)` shard pair and the transfers on it that are not
//! yet finalized.

use serde::Serialize;
use sl_01_ledger::{Hash, ShardId, Transaction};

/// Transfers between one pair of shards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    source: ShardId,
    target: ShardId,
    transactions: Vec<Transaction>,
    last_processed: u64,
    finalized_batches: u64,
}

impl Channel {
    /// Empty channel.
    pub fn new(source: ShardId, target: ShardId) -> Self {
        Self {
            source,
            target,
            transactions: Vec::new(),
            last_processed: 0,
            finalized_batches: 0,
        }
    }

    /// Source shard.
    pub fn source(&self) -> ShardId {
        self.source
    }

    /// Target shard.
    pub fn target(&self) -> ShardId {
        self.target
    }

    /// Unfinalized transfers in submission order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Timestamp of the last relay block finalized over this channel.
    pub fn last_processed(&self) -> u64 {
        self.last_processed
    }

    pub(crate) fn push(&mut self, tx: Transaction) {
        self.transactions.push(tx);
    }

    pub(crate) fn forget(&mut self, hashes: &[Hash]) {
        self.transactions.retain(|tx| !hashes.contains(&tx.hash()));
    }

    pub(crate) fn mark_processed(&mut self, timestamp: u64) {
        self.last_processed = timestamp;
        self.finalized_batches += 1;
    }

    /// Snapshot for monitoring.
    pub fn status(&self) -> ChannelStatus {
        ChannelStatus {
            source: self.source,
            target: self.target,
            queued_transactions: self.transactions.len(),
            last_processed: self.last_processed,
            finalized_batches: self.finalized_batches,
        }
    }
}

/// Channel snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelStatus {
    /// Source shard
    pub source: ShardId,
    /// Target shard
    pub target: ShardId,
    /// Transfers not yet finalized
    pub queued_transactions: usize,
    /// Timestamp of the last finalized relay block (0 if none)
    pub last_processed: u64,
    /// Relay blocks finalized over this channel
    pub finalized_batches: u64,
}
