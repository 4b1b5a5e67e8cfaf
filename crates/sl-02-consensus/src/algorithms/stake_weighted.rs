//! # Stake-Weighted Leader Election (PoS)
//!
//! For every `(previous hash, height, round)` all validators derive the same
//! draw in `[0, total_stake)` and walk the validator list in registration
//! order; the first validator whose cumulative stake exceeds the draw leads
//! that round. A node proposes only on rounds it leads and advances the
//! round after each idle tick.

use crate::domain::{
    ConsensusConfig, ConsensusError, ConsensusKind, ConsensusMessage, ConsensusResult,
    ConsensusStatus, VariantStatus,
};
use crate::service::{ConsensusRules, EngineContext};
use parking_lot::{Mutex, RwLock};
use sl_01_ledger::{Block, Hash, NodeId};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct Election {
    height: u64,
    round: u64,
}

/// Proof-of-stake engine.
pub struct StakeWeightedEngine {
    ctx: EngineContext,
    config: ConsensusConfig,
    // registration order is the walk order
    validators: RwLock<Vec<(NodeId, u64)>>,
    election: Mutex<Election>,
}

impl StakeWeightedEngine {
    /// Engine with the configured validators, or the local node alone at
    /// the minimum stake when none are configured.
    pub fn new(ctx: EngineContext, config: ConsensusConfig) -> ConsensusResult<Self> {
        let engine = Self {
            ctx,
            config,
            validators: RwLock::new(Vec::new()),
            election: Mutex::new(Election::default()),
        };

        if engine.config.validators.is_empty() {
            let id = engine.ctx.node_id.clone();
            engine.register_validator(id, engine.config.min_stake)?;
        } else {
            for validator in engine.config.validators.clone() {
                engine.register_validator(validator.id, validator.stake)?;
            }
        }
        Ok(engine)
    }

    /// Add a validator or update its stake in place.
    pub fn register_validator(&self, id: impl Into<NodeId>, stake: u64) -> ConsensusResult<()> {
        let id = id.into();
        if stake < self.config.min_stake || stake == 0 {
            return Err(ConsensusError::BelowMinimumStake {
                stake,
                minimum: self.config.min_stake,
            });
        }

        let mut validators = self.validators.write();
        match validators.iter_mut().find(|(existing, _)| *existing == id) {
            Some(entry) => entry.1 = stake,
            None => validators.push((id.clone(), stake)),
        }
        info!(parent: &self.ctx.span, validator = %id, stake, "[sl-02] Validator registered");
        Ok(())
    }

    /// Remove a validator; false if it was not registered.
    pub fn remove_validator(&self, id: &str) -> bool {
        let mut validators = self.validators.write();
        let before = validators.len();
        validators.retain(|(existing, _)| existing != id);
        let removed = validators.len() != before;
        if removed {
            info!(parent: &self.ctx.span, validator = %id, "[sl-02] Validator removed");
        }
        removed
    }

    /// Validators with their stakes, in walk order.
    pub fn validators(&self) -> Vec<(NodeId, u64)> {
        self.validators.read().clone()
    }

    /// Stake of `id`, zero if unregistered.
    pub fn stake_of(&self, id: &str) -> u64 {
        self.validators
            .read()
            .iter()
            .find(|(existing, _)| existing == id)
            .map_or(0, |(_, stake)| *stake)
    }

    /// Sum of all stakes.
    pub fn total_stake(&self) -> u64 {
        self.validators.read().iter().map(|(_, stake)| *stake).sum()
    }

    /// Weighted pick: first validator whose cumulative stake exceeds `draw`.
    pub fn select_leader(&self, draw: u64) -> Option<NodeId> {
        let validators = self.validators.read();
        let mut cumulative = 0u64;
        for (id, stake) in validators.iter() {
            cumulative = cumulative.saturating_add(*stake);
            if cumulative > draw {
                return Some(id.clone());
            }
        }
        None
    }

    /// Reproducible draw in `[0, total_stake)` for a round.
    pub fn draw_for(&self, previous_hash: &Hash, height: u64, round: u64) -> Option<u64> {
        let total = self.total_stake();
        if total == 0 {
            return None;
        }
        let seed = Hash::digest(format!("{previous_hash}:{height}:{round}").as_bytes());
        Some(seed.prefix_u64() % total)
    }

    /// Leader elected for a round.
    pub fn leader_for(&self, previous_hash: &Hash, height: u64, round: u64) -> Option<NodeId> {
        self.draw_for(previous_hash, height, round)
            .and_then(|draw| self.select_leader(draw))
    }

    /// Current election round for `height`; resets when the height moves.
    fn round_for(&self, height: u64) -> u64 {
        let mut election = self.election.lock();
        if election.height != height {
            election.height = height;
            election.round = 0;
        }
        election.round
    }

    /// Move to the next election round.
    pub fn advance_round(&self) {
        let mut election = self.election.lock();
        election.round += 1;
        debug!(parent: &self.ctx.span, height = election.height, round = election.round, "[sl-02] Election round advanced");
    }

    /// Election round at the next height.
    pub fn current_round(&self) -> u64 {
        self.round_for(self.ctx.chain.get_height() + 1)
    }
}

impl ConsensusRules for StakeWeightedEngine {
    fn kind(&self) -> ConsensusKind {
        ConsensusKind::Pos
    }

    fn context(&self) -> &EngineContext {
        &self.ctx
    }

    fn create_block(&self) -> ConsensusResult<Block> {
        let head = self.ctx.chain.get_latest_block();
        let height = head.height() + 1;

        let transactions = self.ctx.draw_pending(&self.config);
        if transactions.is_empty() {
            return Err(ConsensusError::NoPendingWork);
        }

        let round = self.round_for(height);
        let leader = self
            .leader_for(&head.hash(), height, round)
            .ok_or(ConsensusError::NoValidators)?;
        if leader != self.ctx.node_id {
            return Err(ConsensusError::NotProposer { round });
        }

        let mut block = Block::new(
            height,
            head.hash(),
            transactions,
            self.ctx.node_id.clone(),
            self.ctx.chain.shard_id(),
        );
        block.seal(round);
        Ok(block)
    }

    fn check_block(&self, block: &Block) -> ConsensusResult<()> {
        let head = self.ctx.chain.get_latest_block();
        block.check(Some(&head))?;

        if self.stake_of(block.proposer()) == 0 {
            return Err(ConsensusError::Rejected(format!(
                "proposer {} has no stake",
                block.proposer()
            )));
        }
        let elected = self.leader_for(&block.previous_hash(), block.height(), block.nonce());
        if elected.as_deref() != Some(block.proposer()) {
            return Err(ConsensusError::Rejected(format!(
                "proposer {} was not elected for round {}",
                block.proposer(),
                block.nonce()
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
        self.process_block(block.clone())?;
        self.ctx.broadcaster.broadcast(ConsensusMessage::Block(block));
        info!(parent: &self.ctx.span, height, %hash, "[sl-02] PoS block proposed");
        Ok(hash)
    }

    fn on_idle(&self, reason: &ConsensusError) {
        if matches!(reason, ConsensusError::NotProposer { .. }) {
            self.advance_round();
        }
    }

    fn status(&self) -> ConsensusStatus {
        let validators = self.validators.read();
        let variant = VariantStatus::StakeWeighted {
            validators: validators.len(),
            total_stake: validators.iter().map(|(_, stake)| *stake).sum(),
            round: self.election.lock().round,
        };
        self.ctx.snapshot(ConsensusKind::Pos, variant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ValidatorConfig;
    use crate::ports::RecordingBroadcaster;
    use rand::Rng;
    use sl_01_ledger::test_utils::signed_transfer;
    use sl_01_ledger::Chain;
    use std::sync::Arc;

    fn engine_with(node: &str, validators: &[(&str, u64)], min_stake: u64) -> StakeWeightedEngine {
        let config = ConsensusConfig {
            min_stake,
            validators: validators
                .iter()
                .map(|(id, stake)| ValidatorConfig::new(*id, *stake))
                .collect(),
            ..ConsensusConfig::for_testing(ConsensusKind::Pos)
        };
        let ctx = EngineContext::new(node, Arc::new(Chain::new(0)), Arc::new(RecordingBroadcaster::new()));
        StakeWeightedEngine::new(ctx, config).unwrap()
    }

    /// Round at which `node` leads the next height.
    fn round_led_by(engine: &StakeWeightedEngine, node: &str) -> u64 {
        let head = engine.ctx.chain.get_latest_block();
        (0..1_000)
            .find(|round| {
                engine.leader_for(&head.hash(), head.height() + 1, *round).as_deref() == Some(node)
            })
            .unwrap()
    }

    #[test]
    fn test_leader_selection_by_cumulative_stake() {
        let engine = engine_with("A", &[("A", 100), ("B", 300)], 100);
        assert_eq!(engine.total_stake(), 400);
        assert_eq!(engine.select_leader(250).as_deref(), Some("B"));
        assert_eq!(engine.select_leader(50).as_deref(), Some("A"));
        assert_eq!(engine.select_leader(0).as_deref(), Some("A"));
        assert_eq!(engine.select_leader(100).as_deref(), Some("B"));
        assert_eq!(engine.select_leader(399).as_deref(), Some("B"));
        assert_eq!(engine.select_leader(400), None);
    }

    #[test]
    fn test_selection_frequency_follows_stake() {
        let engine = engine_with("A", &[("A", 100), ("B", 300)], 100);
        let mut rng = rand::thread_rng();
        let b_wins = (0..4_000)
            .filter(|_| engine.select_leader(rng.gen_range(0..400)).as_deref() == Some("B"))
            .count();
        // expected 3000
        assert!((2_700..3_300).contains(&b_wins), "B won {b_wins} of 4000");
    }

    #[test]
    fn test_register_rejects_low_stake() {
        let engine = engine_with("A", &[], 1_000);
        assert_eq!(
            engine.register_validator("B", 999),
            Err(ConsensusError::BelowMinimumStake {
                stake: 999,
                minimum: 1_000
            })
        );
        assert!(engine.register_validator("B", 1_000).is_ok());
    }

    #[test]
    fn test_default_validator_is_local_node() {
        let engine = engine_with("solo", &[], 1_000);
        assert_eq!(engine.validators(), vec![("solo".to_string(), 1_000)]);
    }

    #[test]
    fn test_reregistration_updates_stake_in_place() {
        let engine = engine_with("A", &[("A", 100), ("B", 300)], 100);
        engine.register_validator("A", 500).unwrap();
        assert_eq!(
            engine.validators(),
            vec![("A".to_string(), 500), ("B".to_string(), 300)]
        );
        assert!(engine.remove_validator("B"));
        assert!(!engine.remove_validator("B"));
        assert_eq!(engine.total_stake(), 500);
    }

    #[test]
    fn test_draw_is_reproducible() {
        let a = engine_with("A", &[("A", 100), ("B", 300)], 100);
        let b = engine_with("B", &[("A", 100), ("B", 300)], 100);
        let prev = Hash::digest(b"head");
        for round in 0..20 {
            assert_eq!(a.draw_for(&prev, 1, round), b.draw_for(&prev, 1, round));
            assert!(a.draw_for(&prev, 1, round).unwrap() < 400);
        }
    }

    #[test]
    fn test_not_proposer_until_elected_round() {
        let engine = engine_with("A", &[("A", 100), ("B", 300)], 100);
        engine
            .ctx
            .chain
            .add_transaction(signed_transfer("x", "y", 1, 0, 0))
            .unwrap();

        let target = round_led_by(&engine, "A");
        for _ in 0..target {
            let err = engine.propose().unwrap_err();
            assert!(matches!(err, ConsensusError::NotProposer { .. }));
            engine.on_idle(&err);
        }
        assert!(engine.propose().is_ok());
        assert_eq!(engine.ctx.chain.get_height(), 1);
        assert_eq!(engine.ctx.chain.get_latest_block().nonce(), target);
    }

    #[test]
    fn test_no_pending_work() {
        let engine = engine_with("solo", &[], 1_000);
        assert_eq!(engine.create_block(), Err(ConsensusError::NoPendingWork));
    }

    #[test]
    fn test_cross_shard_transactions_not_proposed() {
        let engine = engine_with("solo", &[], 1_000);
        let local = signed_transfer("x", "y", 1, 0, 0);
        engine.ctx.chain.add_transaction(signed_transfer("x", "y", 2, 0, 1)).unwrap();
        engine.ctx.chain.add_transaction(local.clone()).unwrap();

        let block = engine.create_block().unwrap();
        assert_eq!(block.transactions(), &[local]);
    }

    #[test]
    fn test_block_from_unstaked_proposer_rejected() {
        let engine = engine_with("A", &[("A", 100)], 100);
        let head = engine.ctx.chain.get_latest_block();
        let block = Block::new(1, head.hash(), vec![signed_transfer("x", "y", 1, 0, 0)], "mallory", 0);
        assert!(!engine.validate_block(&block));
    }

    #[test]
    fn test_block_for_wrong_round_rejected() {
        let engine = engine_with("A", &[("A", 100), ("B", 300)], 100);
        let head = engine.ctx.chain.get_latest_block();
        let b_round = round_led_by(&engine, "B");
        let mut block = Block::new(1, head.hash(), vec![signed_transfer("x", "y", 1, 0, 0)], "A", 0);
        block.seal(b_round);
        assert!(matches!(
            engine.check_block(&block),
            Err(ConsensusError::Rejected(_))
        ));
    }

    #[test]
    fn test_peer_block_accepted_and_duplicate_ignored() {
        let validators = [("A", 100), ("B", 300)];
        let proposer = engine_with("B", &validators, 100);
        let follower = engine_with("A", &validators, 100);

        proposer
            .ctx
            .chain
            .add_transaction(signed_transfer("x", "y", 1, 0, 0))
            .unwrap();
        while let Err(err) = proposer.propose() {
            proposer.on_idle(&err);
        }
        let block = proposer.ctx.chain.get_latest_block();

        follower.handle_message(ConsensusMessage::Block(block.clone())).unwrap();
        follower.handle_message(ConsensusMessage::Block(block.clone())).unwrap();
        assert_eq!(follower.ctx.chain.get_latest_block(), block);
        assert_eq!(follower.ctx.chain.len(), 2);
    }

    #[test]
    fn test_status_reports_stake() {
        let engine = engine_with("A", &[("A", 100), ("B", 300)], 100);
        match engine.status().variant {
            VariantStatus::StakeWeighted {
                validators,
                total_stake,
                ..
            } => {
                assert_eq!(validators, 2);
                assert_eq!(total_stake, 400);
            }
            other => panic!("unexpected variant {other:?}"),
        }
    }
}
