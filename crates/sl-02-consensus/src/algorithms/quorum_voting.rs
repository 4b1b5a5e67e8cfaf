//! # Quorum Voting (PBFT-style)
//!
//! Three phases per block hash:
//!
//! ```text
//! primary ──PrePrepare──▶ all       (view, sequence = height, block)
//! each    ──Prepare─────▶ all       after accepting the pre-prepare
//! each    ──Commit──────▶ all       after ⌊2n/3⌋+1 prepares
//! commit to chain                     after ⌊2n/3⌋+1 commits, exactly once
//! ```
//!
//! The primary of view `v` is `validators[v % n]`. Votes from non-members,
//! for another view, or for an already committed sequence are replays.

use crate::domain::{
    ConsensusConfig, ConsensusError, ConsensusKind, ConsensusMessage, ConsensusResult,
    ConsensusStatus, VariantStatus,
};
use crate::service::{ConsensusRules, EngineContext};
use parking_lot::{Mutex, RwLock};
use sl_01_ledger::{Block, Hash, NodeId};
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Votes needed per phase for `n` validators.
pub fn quorum_size(n: usize) -> usize {
    2 * n / 3 + 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Prepare,
    Commit,
}

#[derive(Debug)]
struct Round {
    view: u64,
    sequence: u64,
    block: Option<Block>,
    prepares: HashSet<NodeId>,
    commits: HashSet<NodeId>,
    commit_sent: bool,
    committed: bool,
}

impl Round {
    fn new(view: u64, sequence: u64) -> Self {
        Self {
            view,
            sequence,
            block: None,
            prepares: HashSet::new(),
            commits: HashSet::new(),
            commit_sent: false,
            committed: false,
        }
    }
}

struct VotingState {
    view: u64,
    rounds: HashMap<Hash, Round>,
    last_progress: Instant,
}

/// Members and thresholds read once per message.
struct Membership {
    validators: Vec<NodeId>,
    quorum: usize,
    local_member: bool,
}

/// PBFT-style engine.
pub struct QuorumVotingEngine {
    ctx: EngineContext,
    config: ConsensusConfig,
    validators: RwLock<Vec<NodeId>>,
    state: Mutex<VotingState>,
}

impl QuorumVotingEngine {
    /// Engine over the configured validator order, or the local node alone.
    pub fn new(ctx: EngineContext, config: ConsensusConfig) -> Self {
        let validators = if config.validators.is_empty() {
            vec![ctx.node_id.clone()]
        } else {
            config.validators.iter().map(|v| v.id.clone()).collect()
        };
        Self {
            ctx,
            config,
            validators: RwLock::new(validators),
            state: Mutex::new(VotingState {
                view: 0,
                rounds: HashMap::new(),
                last_progress: Instant::now(),
            }),
        }
    }

    /// Append a validator; false if already a member.
    pub fn add_validator(&self, id: impl Into<NodeId>) -> bool {
        let id = id.into();
        let mut validators = self.validators.write();
        if validators.contains(&id) {
            return false;
        }
        validators.push(id);
        true
    }

    /// Remove a validator; false if it was not a member.
    pub fn remove_validator(&self, id: &str) -> bool {
        let mut validators = self.validators.write();
        let before = validators.len();
        validators.retain(|v| v != id);
        validators.len() != before
    }

    /// Validator set in primary rotation order.
    pub fn validators(&self) -> Vec<NodeId> {
        self.validators.read().clone()
    }

    /// Votes needed per phase.
    pub fn quorum(&self) -> usize {
        quorum_size(self.validators.read().len())
    }

    /// Primary of `view`.
    pub fn primary(&self, view: u64) -> Option<NodeId> {
        let validators = self.validators.read();
        if validators.is_empty() {
            return None;
        }
        let index = (view % validators.len() as u64) as usize;
        validators.get(index).cloned()
    }

    /// Current view.
    pub fn view(&self) -> u64 {
        self.state.lock().view
    }

    /// Local node is the primary of the current view.
    pub fn is_primary(&self) -> bool {
        self.primary(self.view()).as_deref() == Some(self.ctx.node_id.as_str())
    }

    /// Advance the view and drop every uncommitted round.
    pub fn change_view(&self) -> u64 {
        let mut state = self.state.lock();
        state.view += 1;
        state.rounds.retain(|_, round| round.committed);
        state.last_progress = Instant::now();
        let view = state.view;
        drop(state);
        warn!(parent: &self.ctx.span, view, primary = ?self.primary(view), "[sl-02] View change");
        view
    }

    fn membership(&self) -> Membership {
        let validators = self.validators.read().clone();
        Membership {
            quorum: quorum_size(validators.len()),
            local_member: validators.contains(&self.ctx.node_id),
            validators,
        }
    }

    /// Move a round forward after a vote or its block arrived.
    /// Returns the block when the commit quorum is first reached.
    fn advance(
        &self,
        hash: Hash,
        round: &mut Round,
        members: &Membership,
        outgoing: &mut Vec<ConsensusMessage>,
    ) -> Option<Block> {
        round.block.as_ref()?;

        if round.prepares.len() >= members.quorum && !round.commit_sent {
            round.commit_sent = true;
            if members.local_member {
                round.commits.insert(self.ctx.node_id.clone());
                outgoing.push(ConsensusMessage::Commit {
                    view: round.view,
                    sequence: round.sequence,
                    block_hash: hash,
                    from: self.ctx.node_id.clone(),
                });
            }
        }

        if round.commits.len() >= members.quorum && !round.committed {
            round.committed = true;
            return round.block.clone();
        }
        None
    }

    fn handle_pre_prepare(&self, view: u64, sequence: u64, block: Block) -> ConsensusResult<()> {
        let members = self.membership();
        let primary = self.primary(view).ok_or(ConsensusError::NoValidators)?;
        let head = self.ctx.chain.get_latest_block();
        let hash = block.hash();

        let mut outgoing = Vec::new();
        let finalized = {
            let mut state = self.state.lock();
            if view != state.view || sequence <= head.height() {
                return Err(ConsensusError::Replay { view, sequence });
            }
            if sequence != block.height() || block.nonce() != view {
                return Err(ConsensusError::Rejected(
                    "pre-prepare does not match block height and view".into(),
                ));
            }
            if block.proposer() != primary {
                return Err(ConsensusError::Rejected(format!(
                    "{} is not the primary of view {view}",
                    block.proposer()
                )));
            }
            let conflicting = state.rounds.iter().any(|(other, round)| {
                *other != hash
                    && round.view == view
                    && round.sequence == sequence
                    && round.block.is_some()
            });
            if conflicting {
                return Err(ConsensusError::Rejected(format!(
                    "conflicting pre-prepare for view {view} sequence {sequence}"
                )));
            }
            block.check(Some(&head))?;

            let round = state
                .rounds
                .entry(hash)
                .or_insert_with(|| Round::new(view, sequence));
            if round.block.is_some() {
                return Ok(());
            }
            round.block = Some(block);
            if members.local_member {
                round.prepares.insert(self.ctx.node_id.clone());
                outgoing.push(ConsensusMessage::Prepare {
                    view,
                    sequence,
                    block_hash: hash,
                    from: self.ctx.node_id.clone(),
                });
            }
            self.advance(hash, round, &members, &mut outgoing)
        };

        debug!(parent: &self.ctx.span, view, sequence, %hash, "[sl-02] Pre-prepare accepted");
        self.flush(outgoing);
        match finalized {
            Some(block) => self.commit(block),
            None => Ok(()),
        }
    }

    fn handle_vote(
        &self,
        phase: Phase,
        view: u64,
        sequence: u64,
        hash: Hash,
        from: NodeId,
    ) -> ConsensusResult<()> {
        let members = self.membership();
        if !members.validators.contains(&from) {
            return Err(ConsensusError::UnknownValidator(from));
        }
        let height = self.ctx.chain.get_height();

        let mut outgoing = Vec::new();
        let finalized = {
            let mut state = self.state.lock();
            if state.rounds.get(&hash).is_some_and(|round| round.committed) {
                // late vote for a finished round
                return Ok(());
            }
            if view != state.view || sequence <= height {
                return Err(ConsensusError::Replay { view, sequence });
            }

            let round = state
                .rounds
                .entry(hash)
                .or_insert_with(|| Round::new(view, sequence));
            if round.view != view || round.sequence != sequence {
                return Err(ConsensusError::Rejected(format!(
                    "vote for {hash} does not match its round"
                )));
            }
            match phase {
                Phase::Prepare => round.prepares.insert(from),
                Phase::Commit => round.commits.insert(from),
            };
            self.advance(hash, round, &members, &mut outgoing)
        };

        self.flush(outgoing);
        match finalized {
            Some(block) => self.commit(block),
            None => Ok(()),
        }
    }

    fn flush(&self, outgoing: Vec<ConsensusMessage>) {
        for message in outgoing {
            self.ctx.broadcaster.broadcast(message);
        }
    }

    fn commit(&self, block: Block) -> ConsensusResult<()> {
        let hash = block.hash();
        let height = block.height();
        if let Err(e) = self.ctx.chain.add_block(block) {
            warn!(parent: &self.ctx.span, %hash, error = %e, "[sl-02] Quorum block failed to commit");
            return Err(e.into());
        }

        let mut state = self.state.lock();
        state.last_progress = Instant::now();
        state.rounds.retain(|_, round| round.sequence >= height);
        drop(state);

        info!(parent: &self.ctx.span, height, %hash, "[sl-02] Quorum block committed");
        Ok(())
    }
}

impl ConsensusRules for QuorumVotingEngine {
    fn kind(&self) -> ConsensusKind {
        ConsensusKind::Pbft
    }

    fn context(&self) -> &EngineContext {
        &self.ctx
    }

    fn create_block(&self) -> ConsensusResult<Block> {
        let view = self.view();
        if !self.is_primary() {
            return Err(ConsensusError::NotProposer { round: view });
        }

        let head = self.ctx.chain.get_latest_block();
        let sequence = head.height() + 1;
        let in_flight = self.state.lock().rounds.values().any(|round| {
            round.view == view && round.sequence == sequence && round.block.is_some()
        });
        if in_flight {
            return Err(ConsensusError::NoPendingWork);
        }

        let transactions = self.ctx.draw_pending(&self.config);
        if transactions.is_empty() {
            return Err(ConsensusError::NoPendingWork);
        }
        let mut block = Block::new(
            sequence,
            head.hash(),
            transactions,
            self.ctx.node_id.clone(),
            self.ctx.chain.shard_id(),
        );
        block.seal(view);
        Ok(block)
    }

    fn check_block(&self, block: &Block) -> ConsensusResult<()> {
        let head = self.ctx.chain.get_latest_block();
        block.check(Some(&head))?;

        if self.primary(block.nonce()).as_deref() != Some(block.proposer()) {
            return Err(ConsensusError::Rejected(format!(
                "{} is not the primary of view {}",
                block.proposer(),
                block.nonce()
            )));
        }
        let quorum = self.quorum();
        let committed_votes = self
            .state
            .lock()
            .rounds
            .get(&block.hash())
            .map_or(0, |round| round.commits.len());
        if committed_votes < quorum {
            return Err(ConsensusError::Rejected(format!(
                "{committed_votes} of {quorum} commit votes for {}",
                block.hash()
            )));
        }
        Ok(())
    }

    fn process_block(&self, block: Block) -> ConsensusResult<()> {
        let hash = block.hash();
        let committed = self
            .state
            .lock()
            .rounds
            .get(&hash)
            .is_some_and(|round| round.committed);
        if committed || self.ctx.chain.get_block_by_hash(&hash).is_some() {
            return Ok(());
        }
        self.check_block(&block)?;
        {
            let mut state = self.state.lock();
            match state.rounds.get_mut(&hash) {
                Some(round) if round.committed => return Ok(()),
                Some(round) => round.committed = true,
                None => {}
            }
        }
        self.commit(block)
    }

    fn handle_message(&self, message: ConsensusMessage) -> ConsensusResult<()> {
        match message {
            ConsensusMessage::PrePrepare {
                view,
                sequence,
                block,
            } => self.handle_pre_prepare(view, sequence, block),
            ConsensusMessage::Prepare {
                view,
                sequence,
                block_hash,
                from,
            } => self.handle_vote(Phase::Prepare, view, sequence, block_hash, from),
            ConsensusMessage::Commit {
                view,
                sequence,
                block_hash,
                from,
            } => self.handle_vote(Phase::Commit, view, sequence, block_hash, from),
            ConsensusMessage::Block(block) => self.process_block(block),
        }
    }

    fn propose(&self) -> ConsensusResult<Hash> {
        let block = self.create_block()?;
        let view = block.nonce();
        let sequence = block.height();
        let hash = block.hash();

        self.ctx.broadcaster.broadcast(ConsensusMessage::PrePrepare {
            view,
            sequence,
            block: block.clone(),
        });
        info!(parent: &self.ctx.span, view, sequence, %hash, "[sl-02] Pre-prepare broadcast");
        self.handle_pre_prepare(view, sequence, block)?;
        Ok(hash)
    }

    fn on_idle(&self, _reason: &ConsensusError) {
        let has_work = !self.ctx.draw_pending(&self.config).is_empty();
        let stalled = {
            let mut state = self.state.lock();
            if !has_work {
                state.last_progress = Instant::now();
            }
            state.last_progress.elapsed() >= self.config.view_change_timeout()
        };
        if has_work && stalled {
            self.change_view();
        }
    }

    fn status(&self) -> ConsensusStatus {
        let (view, active_rounds) = {
            let state = self.state.lock();
            let active = state.rounds.values().filter(|r| !r.committed).count();
            (state.view, active)
        };
        let variant = VariantStatus::QuorumVoting {
            view,
            sequence: self.ctx.chain.get_height(),
            quorum: self.quorum(),
            validators: self.validators.read().len(),
            primary: self.primary(view).unwrap_or_default(),
            active_rounds,
        };
        self.ctx.snapshot(ConsensusKind::Pbft, variant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ValidatorConfig;
    use crate::ports::RecordingBroadcaster;
    use sl_01_ledger::test_utils::signed_transfer;
    use sl_01_ledger::{Chain, Transaction};
    use std::sync::Arc;

    struct Node {
        engine: QuorumVotingEngine,
        outbox: Arc<RecordingBroadcaster>,
    }

    fn network(n: usize) -> Vec<Node> {
        let ids: Vec<String> = (0..n).map(|i| format!("v{i}")).collect();
        let config = ConsensusConfig {
            validators: ids.iter().map(|id| ValidatorConfig::new(id.clone(), 0)).collect(),
            ..ConsensusConfig::for_testing(ConsensusKind::Pbft)
        };
        ids.iter()
            .map(|id| {
                let outbox = Arc::new(RecordingBroadcaster::new());
                let ctx = EngineContext::new(id.clone(), Arc::new(Chain::new(0)), outbox.clone());
                Node {
                    engine: QuorumVotingEngine::new(ctx, config.clone()),
                    outbox,
                }
            })
            .collect()
    }

    fn submit_everywhere(nodes: &[Node], tx: &Transaction) {
        for node in nodes {
            node.engine.ctx.chain.add_transaction(tx.clone()).unwrap();
        }
    }

    /// Deliver every outbox to every other node until all are quiet.
    fn route(nodes: &[Node]) {
        loop {
            let mut delivered = false;
            for (i, sender) in nodes.iter().enumerate() {
                for message in sender.outbox.take() {
                    delivered = true;
                    for (j, receiver) in nodes.iter().enumerate() {
                        if i != j {
                            receiver.engine.handle_message(message.clone()).unwrap();
                        }
                    }
                }
            }
            if !delivered {
                return;
            }
        }
    }

    #[test]
    fn test_quorum_size() {
        assert_eq!(quorum_size(1), 1);
        assert_eq!(quorum_size(3), 3);
        assert_eq!(quorum_size(4), 3);
        assert_eq!(quorum_size(7), 5);
    }

    #[test]
    fn test_primary_rotates_with_view() {
        let nodes = network(4);
        let engine = &nodes[0].engine;
        assert_eq!(engine.primary(0).as_deref(), Some("v0"));
        assert_eq!(engine.primary(5).as_deref(), Some("v1"));
        assert!(engine.is_primary());
        assert_eq!(engine.change_view(), 1);
        assert!(!engine.is_primary());
    }

    #[test]
    fn test_four_nodes_commit_once() {
        let nodes = network(4);
        let tx = signed_transfer("a", "b", 3, 0, 0);
        submit_everywhere(&nodes, &tx);

        let hash = nodes[0].engine.propose().unwrap();
        route(&nodes);

        for node in &nodes {
            let chain = &node.engine.ctx.chain;
            assert_eq!(chain.get_height(), 1);
            assert_eq!(chain.get_latest_block().hash(), hash);
            assert_eq!(chain.pending_count(), 0);
        }
    }

    #[test]
    fn test_two_sequential_rounds() {
        let nodes = network(4);
        for amount in [1, 2] {
            submit_everywhere(&nodes, &signed_transfer("a", "b", amount, 0, 0));
            nodes[0].engine.propose().unwrap();
            route(&nodes);
        }
        for node in &nodes {
            assert_eq!(node.engine.ctx.chain.get_height(), 2);
            assert!(node.engine.ctx.chain.is_valid());
        }
    }

    #[test]
    fn test_commit_threshold_reached_twice_commits_once() {
        let nodes = network(4);
        let tx = signed_transfer("a", "b", 3, 0, 0);
        submit_everywhere(&nodes, &tx);
        let hash = nodes[0].engine.propose().unwrap();
        route(&nodes);

        let node = &nodes[1].engine;
        // a fourth commit after finalization is absorbed
        node.handle_message(ConsensusMessage::Commit {
            view: 0,
            sequence: 1,
            block_hash: hash,
            from: "v3".into(),
        })
        .unwrap();
        assert_eq!(node.ctx.chain.len(), 2);
    }

    #[test]
    fn test_non_primary_cannot_propose() {
        let nodes = network(4);
        submit_everywhere(&nodes, &signed_transfer("a", "b", 3, 0, 0));
        assert_eq!(
            nodes[1].engine.propose(),
            Err(ConsensusError::NotProposer { round: 0 })
        );
    }

    #[test]
    fn test_vote_from_non_member_rejected() {
        let nodes = network(4);
        let result = nodes[0].engine.handle_message(ConsensusMessage::Prepare {
            view: 0,
            sequence: 1,
            block_hash: Hash::digest(b"x"),
            from: "outsider".into(),
        });
        assert_eq!(result, Err(ConsensusError::UnknownValidator("outsider".into())));
    }

    #[test]
    fn test_stale_view_and_sequence_rejected() {
        let nodes = network(4);
        let engine = &nodes[0].engine;
        let stale_view = engine.handle_message(ConsensusMessage::Prepare {
            view: 7,
            sequence: 1,
            block_hash: Hash::digest(b"x"),
            from: "v1".into(),
        });
        assert!(matches!(stale_view, Err(ConsensusError::Replay { view: 7, .. })));

        let committed_sequence = engine.handle_message(ConsensusMessage::Commit {
            view: 0,
            sequence: 0,
            block_hash: Hash::digest(b"y"),
            from: "v1".into(),
        });
        assert!(matches!(committed_sequence, Err(ConsensusError::Replay { sequence: 0, .. })));
    }

    #[test]
    fn test_pre_prepare_from_non_primary_rejected() {
        let nodes = network(4);
        let head = nodes[0].engine.ctx.chain.get_latest_block();
        let block = Block::new(1, head.hash(), vec![signed_transfer("a", "b", 1, 0, 0)], "v2", 0);
        let result = nodes[0].engine.handle_message(ConsensusMessage::PrePrepare {
            view: 0,
            sequence: 1,
            block,
        });
        assert!(matches!(result, Err(ConsensusError::Rejected(_))));
    }

    #[test]
    fn test_block_without_commit_quorum_invalid() {
        let nodes = network(4);
        submit_everywhere(&nodes, &signed_transfer("a", "b", 1, 0, 0));
        let block = nodes[0].engine.create_block().unwrap();
        assert!(!nodes[1].engine.validate_block(&block));
    }

    #[test]
    fn test_view_change_discards_uncommitted_rounds() {
        let nodes = network(4);
        submit_everywhere(&nodes, &signed_transfer("a", "b", 1, 0, 0));
        nodes[0].engine.propose().unwrap();
        assert!(matches!(
            nodes[0].engine.status().variant,
            VariantStatus::QuorumVoting {
                active_rounds: 1,
                ..
            }
        ));

        nodes[0].engine.change_view();
        match nodes[0].engine.status().variant {
            VariantStatus::QuorumVoting {
                view,
                active_rounds,
                primary,
                ..
            } => {
                assert_eq!(view, 1);
                assert_eq!(active_rounds, 0);
                assert_eq!(primary, "v1");
            }
            other => panic!("unexpected variant {other:?}"),
        }
    }

    #[test]
    fn test_idle_timeout_triggers_view_change() {
        let nodes = network(4);
        let engine = &nodes[2].engine;
        engine.ctx.chain.add_transaction(signed_transfer("a", "b", 1, 0, 0)).unwrap();
        engine.state.lock().last_progress =
            Instant::now() - engine.config.view_change_timeout() * 2;

        engine.on_idle(&ConsensusError::NotProposer { round: 0 });
        assert_eq!(engine.view(), 1);
    }

    #[test]
    fn test_single_validator_commits_immediately() {
        let outbox = Arc::new(RecordingBroadcaster::new());
        let ctx = EngineContext::new("solo", Arc::new(Chain::new(0)), outbox.clone());
        let engine = QuorumVotingEngine::new(ctx, ConsensusConfig::for_testing(ConsensusKind::Pbft));
        engine.ctx.chain.add_transaction(signed_transfer("a", "b", 1, 0, 0)).unwrap();

        engine.propose().unwrap();
        assert_eq!(engine.ctx.chain.get_height(), 1);
        // pre-prepare, prepare, commit
        assert_eq!(outbox.take().len(), 3);
    }
}
