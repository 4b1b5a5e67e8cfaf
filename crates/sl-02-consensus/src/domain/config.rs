//! # Consensus Configuration

use super::errors::ConsensusError;
use serde::{Deserialize, Serialize};
use sl_01_ledger::NodeId;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Consensus variant tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusKind {
    /// Stake-weighted leader election
    #[default]
    Pos,
    /// Proof of work
    Pow,
    /// Three-phase quorum voting
    Pbft,
}

impl ConsensusKind {
    /// Configuration tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pos => "pos",
            Self::Pow => "pow",
            Self::Pbft => "pbft",
        }
    }
}

impl fmt::Display for ConsensusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsensusKind {
    type Err = ConsensusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pos" => Ok(Self::Pos),
            "pow" => Ok(Self::Pow),
            "pbft" => Ok(Self::Pbft),
            other => Err(ConsensusError::Config(format!(
                "unknown consensus type '{other}'"
            ))),
        }
    }
}

/// Validator entry: PoS stake weight, PBFT membership order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Validator node id
    pub id: NodeId,
    /// Stake (ignored by PBFT and PoW)
    #[serde(default)]
    pub stake: u64,
}

impl ValidatorConfig {
    /// Entry with `stake`.
    pub fn new(id: impl Into<NodeId>, stake: u64) -> Self {
        Self {
            id: id.into(),
            stake,
        }
    }
}

/// Consensus configuration shared by all variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Selected variant
    pub kind: ConsensusKind,
    /// Proposal interval in milliseconds
    pub block_time_ms: u64,
    /// Transactions drawn per proposal
    pub max_transactions_per_block: usize,
    /// Only the relay's internal consensus proposes cross-shard transfers
    pub include_cross_shard: bool,
    /// Minimum stake accepted by `register_validator`
    pub min_stake: u64,
    /// Leading hex zeros required of a PoW block hash
    pub difficulty: u32,
    /// Parallel mining workers
    pub mining_threads: usize,
    /// Validator set; empty means the local node alone
    pub validators: Vec<ValidatorConfig>,
    /// PBFT view change after this long without a commit
    pub view_change_timeout_ms: u64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            kind: ConsensusKind::Pos,
            block_time_ms: 5_000,
            max_transactions_per_block: 10,
            include_cross_shard: false,
            min_stake: 1_000,
            difficulty: 2,
            mining_threads: 2,
            validators: Vec::new(),
            view_change_timeout_ms: 30_000,
        }
    }
}

impl ConsensusConfig {
    /// Fast settings for tests.
    pub fn for_testing(kind: ConsensusKind) -> Self {
        Self {
            kind,
            block_time_ms: 20,
            difficulty: 1,
            view_change_timeout_ms: 200,
            ..Self::default()
        }
    }

    /// Proposal interval.
    pub fn block_time(&self) -> Duration {
        Duration::from_millis(self.block_time_ms)
    }

    /// View change timeout.
    pub fn view_change_timeout(&self) -> Duration {
        Duration::from_millis(self.view_change_timeout_ms)
    }

    /// Reject settings no engine can run with.
    pub fn validate(&self) -> Result<(), ConsensusError> {
        if self.block_time_ms == 0 {
            return Err(ConsensusError::Config("block_time_ms must be positive".into()));
        }
        if self.max_transactions_per_block == 0 {
            return Err(ConsensusError::Config(
                "max_transactions_per_block must be positive".into(),
            ));
        }
        // a SHA-256 hex digest has 64 characters
        if self.difficulty > 64 {
            return Err(ConsensusError::Config(format!(
                "difficulty {} exceeds 64 hex characters",
                self.difficulty
            )));
        }
        if self.mining_threads == 0 {
            return Err(ConsensusError::Config("mining_threads must be positive".into()));
        }
        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = self.validators.iter().find(|v| !seen.insert(&v.id)) {
            return Err(ConsensusError::Config(format!(
                "validator {} listed twice",
                dup.id
            )));
        }
        Ok(())
    }
}
