//! # SL-02 Consensus
//!
//! Pluggable block agreement for one shard's chain.
//!
//! **Subsystem ID:** 2
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Variants
//!
//! | Kind | Engine | Agreement rule |
//! |------|--------|----------------|
//! | `pos` | [`StakeWeightedEngine`] | Leader drawn by stake weight per round |
//! | `pow` | [`WorkBasedEngine`] | Hash with `difficulty` leading hex zeros |
//! | `pbft` | [`QuorumVotingEngine`] | PrePrepare → Prepare → Commit with `⌊2n/3⌋+1` quorums |
//!
//! Every variant drives the same contract ([`ConsensusRules`]) and commits
//! only through `Chain::add_block`, so a rejected or cancelled proposal never
//! leaves the chain half-applied.
//!
//! ## Module Structure
//!
//! ```text
//! sl-02-consensus/
//! ├── domain/          # Config, messages, status, errors
//! ├── algorithms/      # stake_weighted, work_based, quorum_voting
//! ├── ports/           # MessageBroadcaster (outbound gossip)
//! └── service/         # ConsensusEngine enum + factory, ConsensusDriver loop
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algorithms;
pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use algorithms::{
    meets_difficulty, mine, quorum_size, QuorumVotingEngine, StakeWeightedEngine,
    WorkBasedEngine,
};
pub use domain::{
    ConsensusConfig, ConsensusError, ConsensusKind, ConsensusMessage, ConsensusResult,
    ConsensusStatus, ValidatorConfig, VariantStatus,
};
pub use ports::{MessageBroadcaster, NoopBroadcaster, RecordingBroadcaster};
pub use service::{ConsensusDriver, ConsensusEngine, ConsensusRules, EngineContext};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
