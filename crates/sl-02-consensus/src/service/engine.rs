//! Consensus variant enum and its configuration factory.

use super::{ConsensusRules, EngineContext};
use crate::algorithms::{QuorumVotingEngine, StakeWeightedEngine, WorkBasedEngine};
use crate::domain::{
    ConsensusConfig, ConsensusError, ConsensusKind, ConsensusMessage, ConsensusResult,
    ConsensusStatus,
};
use sl_01_ledger::{Block, Hash};
use tracing::info;

/// Consensus engine selected at startup.
pub enum ConsensusEngine {
    /// PoS
    StakeWeighted(StakeWeightedEngine),
    /// PoW
    WorkBased(WorkBasedEngine),
    /// PBFT
    QuorumVoting(QuorumVotingEngine),
}

impl ConsensusEngine {
    /// Build the engine named by `config.kind`.
    pub fn from_config(config: &ConsensusConfig, ctx: EngineContext) -> ConsensusResult<Self> {
        config.validate()?;
        info!(parent: &ctx.span, kind = %config.kind, "[sl-02] Initializing consensus engine");
        let engine = match config.kind {
            ConsensusKind::Pos => Self::StakeWeighted(StakeWeightedEngine::new(ctx, config.clone())?),
            ConsensusKind::Pow => Self::WorkBased(WorkBasedEngine::new(ctx, config.clone())),
            ConsensusKind::Pbft => Self::QuorumVoting(QuorumVotingEngine::new(ctx, config.clone())),
        };
        Ok(engine)
    }

    /// Build from a textual tag; unknown tags are a configuration error.
    pub fn from_tag(tag: &str, config: &ConsensusConfig, ctx: EngineContext) -> ConsensusResult<Self> {
        let kind = tag.parse()?;
        let config = ConsensusConfig {
            kind,
            ..config.clone()
        };
        Self::from_config(&config, ctx)
    }

    /// PoS engine, if selected.
    pub fn as_stake_weighted(&self) -> Option<&StakeWeightedEngine> {
        match self {
            Self::StakeWeighted(engine) => Some(engine),
            _ => None,
        }
    }

    /// PoW engine, if selected.
    pub fn as_work_based(&self) -> Option<&WorkBasedEngine> {
        match self {
            Self::WorkBased(engine) => Some(engine),
            _ => None,
        }
    }

    /// PBFT engine, if selected.
    pub fn as_quorum_voting(&self) -> Option<&QuorumVotingEngine> {
        match self {
            Self::QuorumVoting(engine) => Some(engine),
            _ => None,
        }
    }

    fn rules(&self) -> &dyn ConsensusRules {
        match self {
            Self::StakeWeighted(engine) => engine as &dyn ConsensusRules,
            Self::WorkBased(engine) => engine as &dyn ConsensusRules,
            Self::QuorumVoting(engine) => engine as &dyn ConsensusRules,
        }
    }
}

impl ConsensusRules for ConsensusEngine {
    fn kind(&self) -> ConsensusKind {
        self.rules().kind()
    }

    fn context(&self) -> &EngineContext {
        self.rules().context()
    }

    fn create_block(&self) -> ConsensusResult<Block> {
        self.rules().create_block()
    }

    fn check_block(&self, block: &Block) -> ConsensusResult<()> {
        self.rules().check_block(block)
    }

    fn process_block(&self, block: Block) -> ConsensusResult<()> {
        self.rules().process_block(block)
    }

    fn handle_message(&self, message: ConsensusMessage) -> ConsensusResult<()> {
        self.rules().handle_message(message)
    }

    fn propose(&self) -> ConsensusResult<Hash> {
        self.rules().propose()
    }

    fn on_idle(&self, reason: &ConsensusError) {
        self.rules().on_idle(reason)
    }

    fn cancel(&self) {
        self.rules().cancel()
    }

    fn resume(&self) {
        self.rules().resume()
    }

    fn status(&self) -> ConsensusStatus {
        self.rules().status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::NoopBroadcaster;
    use sl_01_ledger::Chain;
    use std::sync::Arc;

    fn ctx() -> EngineContext {
        EngineContext::new("node-1", Arc::new(Chain::new(0)), Arc::new(NoopBroadcaster))
    }

    #[test]
    fn test_factory_selects_variant() {
        for kind in [ConsensusKind::Pos, ConsensusKind::Pow, ConsensusKind::Pbft] {
            let engine =
                ConsensusEngine::from_config(&ConsensusConfig::for_testing(kind), ctx()).unwrap();
            assert_eq!(engine.kind(), kind);
            assert_eq!(engine.status().kind, kind);
        }
    }

    #[test]
    fn test_unknown_tag_is_config_error() {
        let result = ConsensusEngine::from_tag("cross-channel", &ConsensusConfig::default(), ctx());
        assert!(matches!(result, Err(ConsensusError::Config(_))));
    }

    #[test]
    fn test_variant_accessors() {
        let engine = ConsensusEngine::from_tag("pow", &ConsensusConfig::default(), ctx()).unwrap();
        assert!(engine.as_work_based().is_some());
        assert!(engine.as_stake_weighted().is_none());
        assert!(engine.as_quorum_voting().is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ConsensusConfig {
            mining_threads: 0,
            ..ConsensusConfig::default()
        };
        assert!(ConsensusEngine::from_config(&config, ctx()).is_err());
    }
}
