//! # Outbound Ports
//!
//! Cross-shard propagation dependency.

use crate::domain::ShardResult;
use parking_lot::Mutex;
use sl_01_ledger::Transaction;

/// Hands a validated cross-shard transfer to the relay layer.
pub trait CrossShardGateway: Send + Sync {
    /// Forward `tx` for batching and validation.
    fn forward(&self, tx: Transaction) -> ShardResult<()>;
}

/// Gateway that keeps forwarded transfers in memory.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    forwarded: Mutex<Vec<Transaction>>,
}

impl RecordingGateway {
    /// Empty gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain forwarded transfers.
    pub fn take(&self) -> Vec<Transaction> {
        std::mem::take(&mut *self.forwarded.lock())
    }

    /// Number of transfers waiting to be taken.
    pub fn len(&self) -> usize {
        self.forwarded.lock().len()
    }

    /// True if nothing was forwarded.
    pub fn is_empty(&self) -> bool {
        self.forwarded.lock().is_empty()
    }
}

impl CrossShardGateway for RecordingGateway {
    fn forward(&self, tx: Transaction) -> ShardResult<()> {
        self.forwarded.lock().push(tx);
        Ok(())
    }
}
