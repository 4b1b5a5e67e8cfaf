//! # Service Layer
//!
//! The common engine contract, the variant enum with its factory, and the
//! proposal loop that drives an engine against its chain.

mod driver;
mod engine;

pub use driver::ConsensusDriver;
pub use engine::ConsensusEngine;

use crate::domain::{
    ConsensusConfig, ConsensusError, ConsensusKind, ConsensusMessage, ConsensusResult,
    ConsensusStatus, VariantStatus,
};
use crate::ports::MessageBroadcaster;
use sl_01_ledger::{Block, Chain, Hash, NodeId, Transaction};
use std::sync::Arc;
use tracing::{debug, Span};

/// Collaborators every engine is constructed with.
#[derive(Clone)]
pub struct EngineContext {
    /// Local node id (proposer identity)
    pub node_id: NodeId,
    /// Chain the engine commits to
    pub chain: Arc<Chain>,
    /// Outbound gossip
    pub broadcaster: Arc<dyn MessageBroadcaster>,
    /// Parent span for engine logs
    pub span: Span,
}

impl EngineContext {
    /// Context logging under a `consensus` span for this node and shard.
    pub fn new(
        node_id: impl Into<NodeId>,
        chain: Arc<Chain>,
        broadcaster: Arc<dyn MessageBroadcaster>,
    ) -> Self {
        let node_id = node_id.into();
        let span = tracing::info_span!("consensus", node = %node_id, shard = chain.shard_id());
        Self {
            node_id,
            chain,
            broadcaster,
            span,
        }
    }

    /// Log under `span` instead.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Mempool draw for the next proposal.
    pub(crate) fn draw_pending(&self, config: &ConsensusConfig) -> Vec<Transaction> {
        let include_cross_shard = config.include_cross_shard;
        self.chain
            .pending_transactions_matching(config.max_transactions_per_block, |tx| {
                include_cross_shard || !tx.is_cross_shard()
            })
    }

    pub(crate) fn snapshot(&self, kind: ConsensusKind, variant: VariantStatus) -> ConsensusStatus {
        let chain = self.chain.status();
        ConsensusStatus {
            kind,
            node_id: self.node_id.clone(),
            shard_id: chain.shard_id,
            height: chain.height,
            pending_transactions: chain.pending_transactions,
            running: false,
            variant,
        }
    }
}

/// Operation set shared by every consensus variant.
pub trait ConsensusRules: Send + Sync {
    /// Variant tag.
    fn kind(&self) -> ConsensusKind;

    /// Collaborators.
    fn context(&self) -> &EngineContext;

    /// Build a block from the mempool on top of the chain head.
    fn create_block(&self) -> ConsensusResult<Block>;

    /// Structural validity plus the variant's agreement rule.
    fn check_block(&self, block: &Block) -> ConsensusResult<()>;

    /// True if [`ConsensusRules::check_block`] passes.
    fn validate_block(&self, block: &Block) -> bool {
        self.check_block(block).is_ok()
    }

    /// Validate then commit. A block already on the chain is a no-op.
    fn process_block(&self, block: Block) -> ConsensusResult<()> {
        let ctx = self.context();
        if ctx.chain.get_block_by_hash(&block.hash()).is_some() {
            debug!(parent: &ctx.span, hash = %block.hash(), "[sl-02] Block already committed");
            return Ok(());
        }
        self.check_block(&block)?;
        ctx.chain.add_block(block)?;
        Ok(())
    }

    /// `deliver` callback for messages from peers.
    fn handle_message(&self, message: ConsensusMessage) -> ConsensusResult<()>;

    /// One proposal step of the driver loop; returns the proposed block hash.
    fn propose(&self) -> ConsensusResult<Hash>;

    /// Called by the driver after a tick that produced nothing.
    fn on_idle(&self, _reason: &ConsensusError) {}

    /// Abort in-flight work (mining).
    fn cancel(&self) {}

    /// Clear a previous cancel before restarting.
    fn resume(&self) {}

    /// Monitoring snapshot.
    fn status(&self) -> ConsensusStatus;
}
