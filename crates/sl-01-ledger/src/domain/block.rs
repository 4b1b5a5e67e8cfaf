//! # Block
//!
//! A block on one shard's chain.
//!
//! The block hash covers `height:timestamp:previousHashHex:proposer:shardId:nonce`.
//! The merkle root is checked separately against the transaction list, so a
//! block is valid only when both derived fields match.

use super::errors::{LedgerError, LedgerResult, NodeId, ShardId};
use super::hash::Hash;
use super::merkle::merkle_root;
use super::transaction::Transaction;
use crate::ports::{SystemTimeSource, TimeSource, TransactionSigner};
use serde::{Deserialize, Serialize};

/// Proposer id recorded on every genesis block.
pub const GENESIS_PROPOSER: &str = "genesis";

/// Shard chain block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    height: u64,
    previous_hash: Hash,
    timestamp: u64,
    transactions: Vec<Transaction>,
    proposer: NodeId,
    shard_id: ShardId,
    nonce: u64,
    merkle_root: Option<Hash>,
    hash: Hash,
    #[serde(with = "hex::serde")]
    signature: Vec<u8>,
}

impl Block {
    /// Build a block stamped with the current time.
    pub fn new(
        height: u64,
        previous_hash: Hash,
        transactions: Vec<Transaction>,
        proposer: impl Into<NodeId>,
        shard_id: ShardId,
    ) -> Self {
        Self::with_timestamp(
            height,
            previous_hash,
            transactions,
            proposer,
            shard_id,
            SystemTimeSource.now_millis(),
        )
    }

    /// Build a block with an explicit timestamp.
    pub fn with_timestamp(
        height: u64,
        previous_hash: Hash,
        transactions: Vec<Transaction>,
        proposer: impl Into<NodeId>,
        shard_id: ShardId,
        timestamp: u64,
    ) -> Self {
        let mut block = Self {
            height,
            previous_hash,
            timestamp,
            transactions,
            proposer: proposer.into(),
            shard_id,
            nonce: 0,
            merkle_root: None,
            hash: Hash::ZERO,
            signature: Vec::new(),
        };
        block.refresh_derived();
        block
    }

    /// Deterministic genesis block for `shard_id`.
    pub fn genesis(shard_id: ShardId) -> Self {
        Self::with_timestamp(0, Hash::ZERO, Vec::new(), GENESIS_PROPOSER, shard_id, 0)
    }

    /// Block hash the block would have with `nonce`.
    pub fn hash_with_nonce(&self, nonce: u64) -> Hash {
        let preimage = format!(
            "{}:{}:{}:{}:{}:{}",
            self.height,
            self.timestamp,
            self.previous_hash.to_hex(),
            self.proposer,
            self.shard_id,
            nonce
        );
        Hash::digest(preimage.as_bytes())
    }

    /// Recompute the merkle root over the current transactions.
    pub fn compute_merkle_root(&self) -> Option<Hash> {
        let leaves: Vec<Hash> = self.transactions.iter().map(Transaction::hash).collect();
        merkle_root(&leaves)
    }

    /// Fix the nonce and rehash.
    pub fn seal(&mut self, nonce: u64) {
        self.nonce = nonce;
        self.hash = self.hash_with_nonce(nonce);
    }

    /// Append a valid transaction, recomputing the merkle root and hash.
    pub fn add_transaction(&mut self, tx: Transaction) -> LedgerResult<()> {
        tx.check()?;
        self.transactions.push(tx);
        self.refresh_derived();
        Ok(())
    }

    /// Sign the block hash.
    pub fn sign(&mut self, signer: &dyn TransactionSigner) {
        self.signature = signer.sign(self.hash.as_bytes());
    }

    fn refresh_derived(&mut self) {
        self.merkle_root = self.compute_merkle_root();
        self.hash = self.hash_with_nonce(self.nonce);
    }

    /// Validate against the parent block (`None` for genesis).
    pub fn check(&self, previous: Option<&Block>) -> LedgerResult<()> {
        match previous {
            None if self.height != 0 => {
                return Err(LedgerError::InvalidBlock(format!(
                    "block at height {} has no parent",
                    self.height
                )));
            }
            None => {}
            Some(parent) => {
                if self.height != parent.height + 1 {
                    return Err(LedgerError::InvalidBlock(format!(
                        "height {} does not follow {}",
                        self.height, parent.height
                    )));
                }
                if self.previous_hash != parent.hash {
                    return Err(LedgerError::InvalidBlock(format!(
                        "previous hash {} does not match parent {}",
                        self.previous_hash, parent.hash
                    )));
                }
            }
        }

        if self.compute_merkle_root() != self.merkle_root {
            return Err(LedgerError::InvalidBlock(format!(
                "merkle root mismatch at height {}",
                self.height
            )));
        }
        if self.hash_with_nonce(self.nonce) != self.hash {
            return Err(LedgerError::InvalidBlock(format!(
                "hash mismatch at height {}",
                self.height
            )));
        }
        for tx in &self.transactions {
            tx.check()
                .map_err(|e| LedgerError::InvalidBlock(e.to_string()))?;
        }
        Ok(())
    }

    /// True if [`Block::check`] passes.
    pub fn validate(&self, previous: Option<&Block>) -> bool {
        self.check(previous).is_ok()
    }

    pub(crate) fn transactions_mut(&mut self) -> &mut [Transaction] {
        &mut self.transactions
    }

    /// Height (genesis = 0).
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Parent hash.
    pub fn previous_hash(&self) -> Hash {
        self.previous_hash
    }

    /// Creation time (Unix ms).
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Ordered transactions.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Validator or miner that produced the block.
    pub fn proposer(&self) -> &str {
        &self.proposer
    }

    /// Owning shard.
    pub fn shard_id(&self) -> ShardId {
        self.shard_id
    }

    /// Consensus round value (PoW nonce, PoS round, PBFT view).
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Merkle root, `None` when the block carries no transactions.
    pub fn merkle_root(&self) -> Option<Hash> {
        self.merkle_root
    }

    /// Block hash.
    pub fn hash(&self) -> Hash {
        self.hash
    }

    /// Signature bytes.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }
}
