//! # Chain
//!
//! One shard's append-only block list, its mempool and a hash index over
//! committed transactions.
//!
//! All state sits behind a single `RwLock`. `add_block` validates, appends,
//! indexes and drains the mempool inside one write guard, so readers see
//! either the whole commit or none of it.

use crate::domain::{Block, Hash, LedgerError, LedgerResult, ShardId, Transaction};
use crate::ports::{PresenceVerifier, SignatureVerifier};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn, Span};

const EVENT_CAPACITY: usize = 256;

/// Chain configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Mempool capacity; `None` is unbounded.
    pub max_mempool_size: Option<usize>,
}

impl ChainConfig {
    /// Small bounded mempool for tests.
    pub fn for_testing() -> Self {
        Self {
            max_mempool_size: Some(16),
        }
    }
}

/// Notification published after a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ChainEvent {
    /// A block was appended.
    BlockCommitted {
        /// Shard the block belongs to
        shard_id: ShardId,
        /// New chain height
        height: u64,
        /// Block hash
        hash: Hash,
        /// Hashes of the included transactions, in block order
        transaction_hashes: Vec<Hash>,
    },
}

/// Chain statistics snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainStatus {
    /// Owning shard
    pub shard_id: ShardId,
    /// Latest block height
    pub height: u64,
    /// Blocks including genesis
    pub block_count: usize,
    /// Committed transactions
    pub total_transactions: usize,
    /// Mempool size
    pub pending_transactions: usize,
    /// Latest block hash
    pub latest_hash: Hash,
}

/// Location of a committed transaction.
#[derive(Debug, Clone, Copy)]
struct TxLocation {
    block: usize,
    position: usize,
}

struct ChainInner {
    blocks: Vec<Block>,
    block_index: HashMap<Hash, usize>,
    tx_index: HashMap<Hash, TxLocation>,
    // insertion sequence -> transaction
    mempool: BTreeMap<u64, Transaction>,
    mempool_index: HashMap<Hash, u64>,
    next_seq: u64,
}

impl ChainInner {
    fn latest(&self) -> &Block {
        // genesis is inserted at construction and blocks are never removed
        &self.blocks[self.blocks.len() - 1]
    }

    fn contains(&self, hash: &Hash) -> bool {
        self.tx_index.contains_key(hash) || self.mempool_index.contains_key(hash)
    }

    fn take_pending(&mut self, hash: &Hash) -> Option<Transaction> {
        let seq = self.mempool_index.remove(hash)?;
        self.mempool.remove(&seq)
    }
}

/// Per-shard blockchain.
pub struct Chain {
    shard_id: ShardId,
    config: ChainConfig,
    inner: RwLock<ChainInner>,
    verifier: Arc<dyn SignatureVerifier>,
    events: broadcast::Sender<ChainEvent>,
    span: Span,
}

impl Chain {
    /// Chain for `shard_id` holding only its genesis block.
    pub fn new(shard_id: ShardId) -> Self {
        Self::with_config(shard_id, ChainConfig::default())
    }

    /// Chain with explicit configuration.
    pub fn with_config(shard_id: ShardId, config: ChainConfig) -> Self {
        let genesis = Block::genesis(shard_id);
        let mut block_index = HashMap::new();
        block_index.insert(genesis.hash(), 0);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            shard_id,
            config,
            inner: RwLock::new(ChainInner {
                blocks: vec![genesis],
                block_index,
                tx_index: HashMap::new(),
                mempool: BTreeMap::new(),
                mempool_index: HashMap::new(),
                next_seq: 0,
            }),
            verifier: Arc::new(PresenceVerifier),
            events,
            span: tracing::info_span!("chain", shard = shard_id),
        }
    }

    /// Replace the signature admission policy.
    pub fn with_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Log under `span` instead of the default chain span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Owning shard.
    pub fn shard_id(&self) -> ShardId {
        self.shard_id
    }

    /// Subscribe to commit notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ChainEvent> {
        self.events.subscribe()
    }

    /// Admit a signed transaction to the mempool.
    pub fn add_transaction(&self, tx: Transaction) -> LedgerResult<()> {
        tx.check()?;
        let hash = tx.hash();
        if !self
            .verifier
            .verify(hash.as_bytes(), tx.signature(), tx.sender())
        {
            warn!(parent: &self.span, %hash, "[sl-01] Signature rejected");
            return Err(LedgerError::InvalidSignature(hash));
        }

        let mut inner = self.inner.write();
        if inner.contains(&hash) {
            debug!(parent: &self.span, %hash, "[sl-01] Duplicate transaction ignored");
            return Err(LedgerError::AlreadyExists(hash));
        }
        if let Some(capacity) = self.config.max_mempool_size {
            if inner.mempool.len() >= capacity {
                return Err(LedgerError::MempoolFull { capacity });
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.mempool.insert(seq, tx);
        inner.mempool_index.insert(hash, seq);
        debug!(parent: &self.span, %hash, pending = inner.mempool.len(), "[sl-01] Transaction pooled");
        Ok(())
    }

    /// Validate and commit `block` on top of the current head.
    pub fn add_block(&self, mut block: Block) -> LedgerResult<()> {
        let event = {
            let mut inner = self.inner.write();

            if block.shard_id() != self.shard_id {
                return Err(LedgerError::InvalidBlock(format!(
                    "block for shard {} offered to shard {}",
                    block.shard_id(),
                    self.shard_id
                )));
            }
            if let Err(e) = block.check(Some(inner.latest())) {
                warn!(parent: &self.span, height = block.height(), error = %e, "[sl-01] Block rejected");
                return Err(e);
            }
            if let Some(tx) = block
                .transactions()
                .iter()
                .find(|tx| inner.tx_index.contains_key(&tx.hash()))
            {
                return Err(LedgerError::InvalidBlock(format!(
                    "transaction {} already committed",
                    tx.hash()
                )));
            }

            let block_pos = inner.blocks.len();
            let mut transaction_hashes = Vec::with_capacity(block.transactions().len());
            for (position, tx) in block.transactions_mut().iter_mut().enumerate() {
                tx.mark_confirmed();
                let hash = tx.hash();
                inner.tx_index.insert(
                    hash,
                    TxLocation {
                        block: block_pos,
                        position,
                    },
                );
                inner.take_pending(&hash);
                transaction_hashes.push(hash);
            }

            let event = ChainEvent::BlockCommitted {
                shard_id: self.shard_id,
                height: block.height(),
                hash: block.hash(),
                transaction_hashes,
            };
            inner.block_index.insert(block.hash(), block_pos);
            inner.blocks.push(block);
            event
        };

        if let ChainEvent::BlockCommitted {
            height,
            hash,
            transaction_hashes,
            ..
        } = &event
        {
            info!(
                parent: &self.span,
                height,
                %hash,
                transactions = transaction_hashes.len(),
                "[sl-01] Block committed"
            );
        }
        // no subscribers is fine
        let _ = self.events.send(event);
        Ok(())
    }

    /// Up to `limit` mempool transactions in insertion order.
    pub fn get_pending_transactions(&self, limit: usize) -> Vec<Transaction> {
        self.pending_transactions_matching(limit, |_| true)
    }

    /// Up to `limit` mempool transactions accepted by `predicate`, in insertion order.
    pub fn pending_transactions_matching<F>(&self, limit: usize, predicate: F) -> Vec<Transaction>
    where
        F: Fn(&Transaction) -> bool,
    {
        self.inner
            .read()
            .mempool
            .values()
            .filter(|tx| predicate(tx))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Mempool size.
    pub fn pending_count(&self) -> usize {
        self.inner.read().mempool.len()
    }

    /// Drop a transaction from the mempool.
    pub fn remove_from_mempool(&self, hash: &Hash) -> Option<Transaction> {
        self.inner.write().take_pending(hash)
    }

    /// Block at `height`.
    pub fn get_block_by_height(&self, height: u64) -> Option<Block> {
        let index = usize::try_from(height).ok()?;
        self.inner.read().blocks.get(index).cloned()
    }

    /// Block with `hash`.
    pub fn get_block_by_hash(&self, hash: &Hash) -> Option<Block> {
        let inner = self.inner.read();
        inner
            .block_index
            .get(hash)
            .and_then(|&index| inner.blocks.get(index))
            .cloned()
    }

    /// Chain head.
    pub fn get_latest_block(&self) -> Block {
        self.inner.read().latest().clone()
    }

    /// Height of the chain head.
    pub fn get_height(&self) -> u64 {
        self.inner.read().latest().height()
    }

    /// Number of blocks including genesis.
    pub fn len(&self) -> usize {
        self.inner.read().blocks.len()
    }

    /// Always false: a chain holds at least its genesis block.
    pub fn is_empty(&self) -> bool {
        self.inner.read().blocks.is_empty()
    }

    /// Look up a transaction in history, then the mempool.
    pub fn get_transaction(&self, hash: &Hash) -> Option<Transaction> {
        let inner = self.inner.read();
        if let Some(loc) = inner.tx_index.get(hash) {
            return inner
                .blocks
                .get(loc.block)
                .and_then(|b| b.transactions().get(loc.position))
                .cloned();
        }
        inner
            .mempool_index
            .get(hash)
            .and_then(|seq| inner.mempool.get(seq))
            .cloned()
    }

    /// True if the transaction is part of a committed block.
    pub fn is_committed(&self, hash: &Hash) -> bool {
        self.inner.read().tx_index.contains_key(hash)
    }

    /// Net balance over committed blocks: credits minus debits and fees.
    pub fn get_balance(&self, address: &str) -> i128 {
        let inner = self.inner.read();
        inner
            .blocks
            .iter()
            .flat_map(|b| b.transactions())
            .map(|tx| {
                let mut delta = 0i128;
                if tx.recipient() == address {
                    delta += i128::from(tx.amount());
                }
                if tx.sender() == address {
                    delta -= i128::from(tx.amount()) + i128::from(tx.fee());
                }
                delta
            })
            .sum()
    }

    /// Re-verify every stored block against its parent.
    pub fn is_valid(&self) -> bool {
        let inner = self.inner.read();
        let Some(genesis) = inner.blocks.first() else {
            return false;
        };
        genesis.validate(None)
            && inner
                .blocks
                .windows(2)
                .all(|pair| pair[1].validate(Some(&pair[0])))
    }

    /// Statistics snapshot.
    pub fn status(&self) -> ChainStatus {
        let inner = self.inner.read();
        let latest = inner.latest();
        ChainStatus {
            shard_id: self.shard_id,
            height: latest.height(),
            block_count: inner.blocks.len(),
            total_transactions: inner.tx_index.len(),
            pending_transactions: inner.mempool.len(),
            latest_hash: latest.hash(),
        }
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("shard_id", &self.shard_id)
            .field("height", &self.get_height())
            .finish()
    }
}
