//! Ports for the Sharding subsystem.

pub mod outbound;

pub use outbound::*;
