//! Ports layer for the Consensus subsystem.
//!
//! Outbound: [`MessageBroadcaster`], the `broadcast` callback into the
//! peer-to-peer transport. Inbound delivery is
//! [`crate::ConsensusRules::handle_message`].

pub mod outbound;

pub use outbound::*;
