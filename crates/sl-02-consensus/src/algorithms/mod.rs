//! # Algorithms
//!
//! The three agreement rules. Each engine implements
//! [`crate::ConsensusRules`] and is wrapped by [`crate::ConsensusEngine`].

pub mod quorum_voting;
pub mod stake_weighted;
pub mod work_based;

pub use quorum_voting::{quorum_size, QuorumVotingEngine};
pub use stake_weighted::StakeWeightedEngine;
pub use work_based::{meets_difficulty, mine, WorkBasedEngine};
