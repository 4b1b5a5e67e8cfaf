//! Deterministic fixtures shared by ledger tests and downstream crates.

use crate::adapters::HmacSigner;
use crate::domain::{Block, ShardId, Transaction, TransferRequest};
use crate::ports::TimeSource;
use std::sync::atomic::{AtomicU64, Ordering};

/// Key used by [`test_signer`].
pub const TEST_KEY: &[u8] = b"sl-test-key";

/// Timestamp stamped on fixture transactions.
pub const FIXTURE_TIME: u64 = 1_700_000_000_000;

static NEXT_NONCE: AtomicU64 = AtomicU64::new(1);

/// Manually driven clock.
#[derive(Debug, Default)]
pub struct FixedTimeSource {
    now: AtomicU64,
}

impl FixedTimeSource {
    /// Clock frozen at `millis`.
    pub fn new(millis: u64) -> Self {
        Self {
            now: AtomicU64::new(millis),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl TimeSource for FixedTimeSource {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Signer over [`TEST_KEY`].
pub fn test_signer() -> HmacSigner {
    HmacSigner::with_id("test-node", TEST_KEY)
}

/// Signed transfer with a fresh nonce, so repeated calls never collide.
pub fn signed_transfer(
    sender: &str,
    recipient: &str,
    amount: u64,
    source_shard: ShardId,
    target_shard: ShardId,
) -> Transaction {
    let nonce = NEXT_NONCE.fetch_add(1, Ordering::Relaxed);
    let request = TransferRequest::new(sender, recipient, amount, source_shard, target_shard)
        .fee(1)
        .nonce(nonce);
    let mut tx = match Transaction::create(request, FIXTURE_TIME) {
        Ok(tx) => tx,
        Err(e) => panic!("fixture transfer rejected: {e}"),
    };
    tx.sign(&test_signer());
    tx
}

/// Block extending `parent` with `transactions`.
pub fn child_block(parent: &Block, transactions: Vec<Transaction>) -> Block {
    Block::with_timestamp(
        parent.height() + 1,
        parent.hash(),
        transactions,
        "validator-1",
        parent.shard_id(),
        parent.timestamp() + 1,
    )
}
