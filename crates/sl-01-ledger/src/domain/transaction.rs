//! # Transaction
//!
//! A value transfer between two addresses, possibly across shards.
//!
//! The hash is computed once at creation over a fixed, `:`-joined field order:
//!
//! ```text
//! sender:recipient:amount:fee:timestamp:nonce:sourceShard:targetShard
//! ```
//!
//! Any serializer that reconstructs a transaction must preserve these fields
//! byte-for-byte or [`Transaction::validate`] fails.

use super::errors::{LedgerError, LedgerResult, NodeId, ShardId};
use super::hash::Hash;
use crate::ports::{SystemTimeSource, TimeSource, TransactionSigner};
use serde::{Deserialize, Serialize};

/// Fields needed to create a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Paying address
    pub sender: NodeId,
    /// Receiving address
    pub recipient: NodeId,
    /// Transferred amount in base units (must be positive)
    pub amount: u64,
    /// Fee in base units
    pub fee: u64,
    /// Shard the sender lives on
    pub source_shard: ShardId,
    /// Shard the recipient lives on
    pub target_shard: ShardId,
    /// Sender-chosen nonce
    pub nonce: u64,
}

impl TransferRequest {
    /// New request with zero fee and nonce.
    pub fn new(
        sender: impl Into<NodeId>,
        recipient: impl Into<NodeId>,
        amount: u64,
        source_shard: ShardId,
        target_shard: ShardId,
    ) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
            fee: 0,
            source_shard,
            target_shard,
            nonce: 0,
        }
    }

    /// Set the fee.
    pub fn fee(mut self, fee: u64) -> Self {
        self.fee = fee;
        self
    }

    /// Set the nonce.
    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }
}

/// Ledger transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    hash: Hash,
    sender: NodeId,
    recipient: NodeId,
    amount: u64,
    fee: u64,
    timestamp: u64,
    nonce: u64,
    source_shard: ShardId,
    target_shard: ShardId,
    #[serde(with = "hex::serde")]
    signature: Vec<u8>,
    confirmed: bool,
}

impl Transaction {
    /// Create an unsigned transaction stamped with the current time.
    pub fn new(
        sender: impl Into<NodeId>,
        recipient: impl Into<NodeId>,
        amount: u64,
        fee: u64,
        source_shard: ShardId,
        target_shard: ShardId,
    ) -> LedgerResult<Self> {
        let request =
            TransferRequest::new(sender, recipient, amount, source_shard, target_shard).fee(fee);
        Self::create(request, SystemTimeSource.now_millis())
    }

    /// Create an unsigned transaction with an explicit timestamp.
    pub fn create(request: TransferRequest, timestamp: u64) -> LedgerResult<Self> {
        if request.amount == 0 {
            return Err(LedgerError::InvalidInput(
                "amount must be positive".to_string(),
            ));
        }
        if request.sender.is_empty() || request.recipient.is_empty() {
            return Err(LedgerError::InvalidInput(
                "sender and recipient must be non-empty".to_string(),
            ));
        }

        let mut tx = Self {
            hash: Hash::ZERO,
            sender: request.sender,
            recipient: request.recipient,
            amount: request.amount,
            fee: request.fee,
            timestamp,
            nonce: request.nonce,
            source_shard: request.source_shard,
            target_shard: request.target_shard,
            signature: Vec::new(),
            confirmed: false,
        };
        tx.hash = tx.compute_hash();
        Ok(tx)
    }

    /// Recompute the hash from the current field values.
    pub fn compute_hash(&self) -> Hash {
        let preimage = format!(
            "{}:{}:{}:{}:{}:{}:{}:{}",
            self.sender,
            self.recipient,
            self.amount,
            self.fee,
            self.timestamp,
            self.nonce,
            self.source_shard,
            self.target_shard
        );
        Hash::digest(preimage.as_bytes())
    }

    /// Sign the transaction hash.
    pub fn sign(&mut self, signer: &dyn TransactionSigner) {
        self.signature = signer.sign(self.hash.as_bytes());
    }

    /// Structural validation with a reason on failure.
    pub fn check(&self) -> LedgerResult<()> {
        let reason = if self.compute_hash() != self.hash {
            "hash does not match fields"
        } else if self.signature.is_empty() {
            "missing signature"
        } else if self.amount == 0 {
            "amount must be positive"
        } else if self.sender.is_empty() || self.recipient.is_empty() {
            "empty sender or recipient"
        } else {
            return Ok(());
        };
        Err(LedgerError::InvalidTransaction {
            hash: self.hash,
            reason: reason.to_string(),
        })
    }

    /// True if [`Transaction::check`] passes.
    pub fn validate(&self) -> bool {
        self.check().is_ok()
    }

    /// True when source and target shard differ.
    pub fn is_cross_shard(&self) -> bool {
        self.source_shard != self.target_shard
    }

    /// Flag the transaction as committed.
    pub fn mark_confirmed(&mut self) {
        self.confirmed = true;
    }

    /// Transaction hash.
    pub fn hash(&self) -> Hash {
        self.hash
    }

    /// Paying address.
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Receiving address.
    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    /// Amount in base units.
    pub fn amount(&self) -> u64 {
        self.amount
    }

    /// Fee in base units.
    pub fn fee(&self) -> u64 {
        self.fee
    }

    /// Creation time (Unix ms).
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Sender nonce.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Source shard.
    pub fn source_shard(&self) -> ShardId {
        self.source_shard
    }

    /// Target shard.
    pub fn target_shard(&self) -> ShardId {
        self.target_shard
    }

    /// Signature bytes (empty when unsigned).
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// True once the containing block committed or dual confirmation completed.
    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.sender == other.sender
            && self.recipient == other.recipient
            && self.amount == other.amount
            && self.fee == other.fee
            && self.timestamp == other.timestamp
            && self.nonce == other.nonce
            && self.source_shard == other.source_shard
            && self.target_shard == other.target_shard
            && self.signature == other.signature
    }
}

impl Eq for Transaction {}
