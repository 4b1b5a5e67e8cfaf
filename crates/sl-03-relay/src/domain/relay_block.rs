//! # Relay Block
//!
//! A batch of cross-shard transfers for one target shard.
//!
//! The hash covers `id:timestamp:txHash1:...:txHashN` in batch order.

use serde::Serialize;
use sl_01_ledger::{Hash, NodeId, ShardId, Transaction};
use std::collections::{BTreeMap, BTreeSet};

/// Batch of cross-shard transfers awaiting relay-node validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayBlock {
    id: String,
    timestamp: u64,
    transactions: Vec<Transaction>,
    source_shards: Vec<ShardId>,
    target_shards: Vec<ShardId>,
    hash: Hash,
    validations: BTreeMap<NodeId, bool>,
    finalized: bool,
}

impl RelayBlock {
    /// Batch `transactions` for `target`.
    pub fn new(id: String, timestamp: u64, target: ShardId, transactions: Vec<Transaction>) -> Self {
        let source_shards: BTreeSet<ShardId> =
            transactions.iter().map(Transaction::source_shard).collect();
        let mut block = Self {
            id,
            timestamp,
            transactions,
            source_shards: source_shards.into_iter().collect(),
            target_shards: vec![target],
            hash: Hash::ZERO,
            validations: BTreeMap::new(),
            finalized: false,
        };
        block.hash = block.compute_hash();
        block
    }

    /// Recompute the hash from id, timestamp and transaction hashes.
    pub fn compute_hash(&self) -> Hash {
        let mut preimage = format!("{}:{}", self.id, self.timestamp);
        for tx in &self.transactions {
            preimage.push(':');
            preimage.push_str(&tx.hash().to_hex());
        }
        Hash::digest(preimage.as_bytes())
    }

    /// Structural check each relay node runs before voting.
    pub fn structural_check(&self) -> Result<(), String> {
        if self.id.is_empty() || self.hash == Hash::ZERO {
            return Err("missing id or hash".to_string());
        }
        if self.transactions.is_empty() {
            return Err("no transactions".to_string());
        }
        if let Some(tx) = self
            .transactions
            .iter()
            .find(|tx| !tx.is_cross_shard() || tx.hash() == Hash::ZERO)
        {
            return Err(format!("transaction {} is not a cross-shard transfer", tx.hash()));
        }
        if self.compute_hash() != self.hash {
            return Err("hash mismatch".to_string());
        }
        Ok(())
    }

    /// Record a vote; a node voting again replaces its earlier vote.
    pub(crate) fn record_vote(&mut self, node: NodeId, accept: bool) {
        self.validations.insert(node, accept);
    }

    pub(crate) fn mark_finalized(&mut self) {
        self.finalized = true;
    }

    /// Distinct positive votes.
    pub fn approvals(&self) -> usize {
        self.validations.values().filter(|accept| **accept).count()
    }

    /// Relay block id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Creation time (Unix ms).
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Batched transfers in submission order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Hashes of the batched transfers.
    pub fn transaction_hashes(&self) -> Vec<Hash> {
        self.transactions.iter().map(Transaction::hash).collect()
    }

    /// Distinct source shards, ascending.
    pub fn source_shards(&self) -> &[ShardId] {
        &self.source_shards
    }

    /// Target shards.
    pub fn target_shards(&self) -> &[ShardId] {
        &self.target_shards
    }

    /// Relay block hash.
    pub fn hash(&self) -> Hash {
        self.hash
    }

    /// Votes by node.
    pub fn validations(&self) -> &BTreeMap<NodeId, bool> {
        &self.validations
    }

    /// Set once, never reversed.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    #[cfg(test)]
    pub(crate) fn tamper_transactions(&mut self, transactions: Vec<Transaction>) {
        self.transactions = transactions;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sl_01_ledger::test_utils::signed_transfer;

    fn batch() -> RelayBlock {
        let txs = vec![
            signed_transfer("a", "b", 1, 0, 2),
            signed_transfer("c", "d", 2, 1, 2),
            signed_transfer("e", "f", 3, 0, 2),
        ];
        RelayBlock::new("relay_2_0".into(), 1_000, 2, txs)
    }

    #[test]
    fn test_hash_preimage() {
        let block = batch();
        let mut preimage = "relay_2_0:1000".to_string();
        for tx in block.transactions() {
            preimage.push_str(&format!(":{}", tx.hash()));
        }
        assert_eq!(block.hash(), Hash::digest(preimage.as_bytes()));
    }

    #[test]
    fn test_source_shards_are_distinct() {
        assert_eq!(batch().source_shards(), &[0, 1]);
        assert_eq!(batch().target_shards(), &[2]);
    }

    #[test]
    fn test_structural_check_passes() {
        assert!(batch().structural_check().is_ok());
    }

    #[test]
    fn test_structural_check_catches_tampering() {
        let mut block = batch();
        block.tamper_transactions(vec![signed_transfer("x", "y", 9, 0, 2)]);
        assert_eq!(block.structural_check(), Err("hash mismatch".to_string()));
    }

    #[test]
    fn test_same_shard_transfer_fails_check() {
        let block = RelayBlock::new("r".into(), 1, 2, vec![signed_transfer("a", "b", 1, 2, 2)]);
        assert!(block.structural_check().is_err());
    }

    #[test]
    fn test_empty_batch_fails_check() {
        let block = RelayBlock::new("r".into(), 1, 2, vec![]);
        assert_eq!(block.structural_check(), Err("no transactions".to_string()));
    }

    #[test]
    fn test_negative_votes_do_not_count() {
        let mut block = batch();
        block.record_vote("n1".into(), true);
        block.record_vote("n2".into(), false);
        block.record_vote("n1".into(), true);
        assert_eq!(block.approvals(), 1);
        assert_eq!(block.validations().len(), 2);
    }
}
