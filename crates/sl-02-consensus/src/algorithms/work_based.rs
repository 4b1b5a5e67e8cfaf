//! # Proof of Work
//!
//! A block hash meets difficulty `d` when its first `d` hex characters are
//! `'0'`. Mining and validation share [`meets_difficulty`], so a mined block
//! always validates and nothing else does.

use crate::domain::{
    ConsensusConfig, ConsensusError, ConsensusKind, ConsensusMessage, ConsensusResult,
    ConsensusStatus, VariantStatus,
};
use crate::service::{ConsensusRules, EngineContext};
use sl_01_ledger::{Block, Hash};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// True if the first `difficulty` hex characters of `hash` are zero.
pub fn meets_difficulty(hash: &Hash, difficulty: u32) -> bool {
    let bytes = hash.as_bytes();
    (0..difficulty as usize).all(|nibble| {
        bytes.get(nibble / 2).is_some_and(|byte| {
            let value = if nibble % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            value == 0
        })
    })
}

/// Search nonces for `template` across `threads` workers.
///
/// Worker `i` tries `i, i + threads, i + 2*threads, ...`. The first hit
/// raises a shared flag that stops the others; `cancel` stops everyone.
/// Returns `None` only when cancelled.
pub fn mine(template: &Block, difficulty: u32, threads: usize, cancel: &AtomicBool) -> Option<u64> {
    let threads = threads.max(1);
    let stride = threads as u64;
    let found = AtomicBool::new(false);
    let winner = AtomicU64::new(0);

    std::thread::scope(|scope| {
        for worker in 0..threads {
            let found = &found;
            let winner = &winner;
            scope.spawn(move || {
                let mut nonce = worker as u64;
                loop {
                    if found.load(Ordering::Relaxed) || cancel.load(Ordering::Relaxed) {
                        return;
                    }
                    if meets_difficulty(&template.hash_with_nonce(nonce), difficulty) {
                        if !found.swap(true, Ordering::AcqRel) {
                            winner.store(nonce, Ordering::Release);
                        }
                        return;
                    }
                    match nonce.checked_add(stride) {
                        Some(next) => nonce = next,
                        None => return,
                    }
                }
            });
        }
    });

    found
        .load(Ordering::Acquire)
        .then(|| winner.load(Ordering::Acquire))
}

/// Proof-of-work engine.
pub struct WorkBasedEngine {
    ctx: EngineContext,
    config: ConsensusConfig,
    cancel: AtomicBool,
    mining: AtomicBool,
    blocks_mined: AtomicU64,
}

impl WorkBasedEngine {
    /// Engine mining at the configured difficulty.
    pub fn new(ctx: EngineContext, config: ConsensusConfig) -> Self {
        Self {
            ctx,
            config,
            cancel: AtomicBool::new(false),
            mining: AtomicBool::new(false),
            blocks_mined: AtomicU64::new(0),
        }
    }

    /// Leading hex zeros required.
    pub fn difficulty(&self) -> u32 {
        self.config.difficulty
    }

    /// Required hash prefix, e.g. `"00"`.
    pub fn target(&self) -> String {
        "0".repeat(self.config.difficulty as usize)
    }

    /// A mining attempt is in flight.
    pub fn is_mining(&self) -> bool {
        self.mining.load(Ordering::SeqCst)
    }
}

impl ConsensusRules for WorkBasedEngine {
    fn kind(&self) -> ConsensusKind {
        ConsensusKind::Pow
    }

    fn context(&self) -> &EngineContext {
        &self.ctx
    }

    fn create_block(&self) -> ConsensusResult<Block> {
        let head = self.ctx.chain.get_latest_block();
        let transactions = self.ctx.draw_pending(&self.config);
        if transactions.is_empty() {
            return Err(ConsensusError::NoPendingWork);
        }

        let mut block = Block::new(
            head.height() + 1,
            head.hash(),
            transactions,
            self.ctx.node_id.clone(),
            self.ctx.chain.shard_id(),
        );

        debug!(
            parent: &self.ctx.span,
            height = block.height(),
            difficulty = self.config.difficulty,
            threads = self.config.mining_threads,
            "[sl-02] Mining started"
        );
        self.mining.store(true, Ordering::SeqCst);
        let nonce = mine(
            &block,
            self.config.difficulty,
            self.config.mining_threads,
            &self.cancel,
        );
        self.mining.store(false, Ordering::SeqCst);

        let nonce = nonce.ok_or(ConsensusError::MiningCancelled)?;
        block.seal(nonce);
        Ok(block)
    }

    fn check_block(&self, block: &Block) -> ConsensusResult<()> {
        let head = self.ctx.chain.get_latest_block();
        block.check(Some(&head))?;
        if !meets_difficulty(&block.hash(), self.config.difficulty) {
            return Err(ConsensusError::Rejected(format!(
                "hash {} does not meet difficulty {}",
                block.hash(),
                self.config.difficulty
            )));
        }
        Ok(())
    }

    fn handle_message(&self, message: ConsensusMessage) -> ConsensusResult<()> {
        match message {
            ConsensusMessage::Block(block) => {
                let hash = block.hash();
                self.process_block(block).inspect_err(|e| {
                    warn!(parent: &self.ctx.span, %hash, error = %e, "[sl-02] Received block rejected");
                })
            }
            other => Err(ConsensusError::UnexpectedMessage(other.label().to_string())),
        }
    }

    fn propose(&self) -> ConsensusResult<Hash> {
        let block = self.create_block()?;
        let hash = block.hash();
        let height = block.height();
        let nonce = block.nonce();
        self.process_block(block.clone())?;
        self.blocks_mined.fetch_add(1, Ordering::Relaxed);
        self.ctx.broadcaster.broadcast(ConsensusMessage::Block(block));
        info!(parent: &self.ctx.span, height, nonce, %hash, "[sl-02] PoW block mined");
        Ok(hash)
    }

    fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.cancel.store(false, Ordering::SeqCst);
    }

    fn status(&self) -> ConsensusStatus {
        let variant = VariantStatus::WorkBased {
            difficulty: self.config.difficulty,
            target: self.target(),
            mining: self.is_mining(),
            blocks_mined: self.blocks_mined.load(Ordering::Relaxed),
        };
        self.ctx.snapshot(ConsensusKind::Pow, variant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::RecordingBroadcaster;
    use sl_01_ledger::test_utils::{child_block, signed_transfer};
    use sl_01_ledger::Chain;
    use std::sync::Arc;

    fn engine(difficulty: u32) -> (WorkBasedEngine, Arc<RecordingBroadcaster>) {
        let outbox = Arc::new(RecordingBroadcaster::new());
        let ctx = EngineContext::new("miner-1", Arc::new(Chain::new(0)), outbox.clone());
        let config = ConsensusConfig {
            difficulty,
            mining_threads: 4,
            ..ConsensusConfig::for_testing(ConsensusKind::Pow)
        };
        (WorkBasedEngine::new(ctx, config), outbox)
    }

    #[test]
    fn test_meets_difficulty_matches_hex_prefix() {
        for n in 0u32..200 {
            let hash = Hash::digest(&n.to_be_bytes());
            for difficulty in 0..4 {
                let expected = hash.to_hex().starts_with(&"0".repeat(difficulty as usize));
                assert_eq!(meets_difficulty(&hash, difficulty), expected);
            }
        }
        assert!(meets_difficulty(&Hash::ZERO, 64));
        assert!(!meets_difficulty(&Hash::ZERO, 65));
    }

    #[test]
    fn test_mined_nonce_meets_target() {
        let template = child_block(&Block::genesis(0), vec![]);
        let nonce = mine(&template, 2, 4, &AtomicBool::new(false)).unwrap();
        assert!(template.hash_with_nonce(nonce).to_hex().starts_with("00"));
    }

    #[test]
    fn test_cancelled_mining_returns_none() {
        let template = child_block(&Block::genesis(0), vec![]);
        // unreachable target; only the cancel flag ends the search
        let cancel = AtomicBool::new(true);
        assert_eq!(mine(&template, 64, 2, &cancel), None);
    }

    #[test]
    fn test_difficulty_two_rejects_unmined_hash() {
        let (engine, _) = engine(2);
        let genesis = engine.ctx.chain.get_latest_block();
        let mut block = child_block(&genesis, vec![signed_transfer("a", "b", 1, 0, 0)]);
        let bad_nonce = (0u64..)
            .find(|n| !block.hash_with_nonce(*n).to_hex().starts_with("00"))
            .unwrap();
        block.seal(bad_nonce);

        assert!(block.validate(Some(&genesis)));
        assert!(!engine.validate_block(&block));
    }

    #[test]
    fn test_propose_mines_commits_and_broadcasts() {
        let (engine, outbox) = engine(2);
        engine
            .ctx
            .chain
            .add_transaction(signed_transfer("a", "b", 1, 0, 0))
            .unwrap();

        let hash = engine.propose().unwrap();
        let head = engine.ctx.chain.get_latest_block();
        assert_eq!(head.hash(), hash);
        assert!(hash.to_hex().starts_with("00"));
        assert_eq!(engine.ctx.chain.pending_count(), 0);
        assert!(matches!(outbox.take().as_slice(), [ConsensusMessage::Block(b)] if b.hash() == hash));
    }

    #[test]
    fn test_cancel_flag_aborts_create_block() {
        let (engine, _) = engine(2);
        engine
            .ctx
            .chain
            .add_transaction(signed_transfer("a", "b", 1, 0, 0))
            .unwrap();
        engine.cancel();
        assert_eq!(engine.create_block(), Err(ConsensusError::MiningCancelled));
        engine.resume();
        assert!(engine.create_block().is_ok());
    }

    #[test]
    fn test_peer_block_validated_against_target() {
        let (miner, _) = engine(2);
        let (peer, _) = engine(2);
        let tx = signed_transfer("a", "b", 1, 0, 0);
        miner.ctx.chain.add_transaction(tx).unwrap();
        miner.propose().unwrap();

        let block = miner.ctx.chain.get_latest_block();
        peer.handle_message(ConsensusMessage::Block(block.clone())).unwrap();
        assert_eq!(peer.ctx.chain.get_latest_block(), block);
    }

    #[test]
    fn test_status() {
        let (engine, _) = engine(3);
        match engine.status().variant {
            VariantStatus::WorkBased {
                difficulty, target, mining, ..
            } => {
                assert_eq!(difficulty, 3);
                assert_eq!(target, "000");
                assert!(!mining);
            }
            other => panic!("unexpected variant {other:?}"),
        }
    }
}
