//! # Adapter Implementations
//!
//! Concrete implementations of the subsystems' outbound ports:
//!
//! - [`RelayGateway`]: the sharding crate's `CrossShardGateway` backed by
//!   the cross-channel relay
//! - [`LocalNetwork`]: in-process `MessageBroadcaster` mesh delivering
//!   consensus messages to every other joined node

pub mod local_network;
pub mod relay_gateway;

pub use local_network::*;
pub use relay_gateway::*;
