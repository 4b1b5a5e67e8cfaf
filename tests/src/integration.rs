//! Integration flows across subsystem crates.

pub mod consensus_variants;
pub mod cross_shard_flow;
pub mod quorum_network;

#[cfg(test)]
pub(crate) mod fixtures;
