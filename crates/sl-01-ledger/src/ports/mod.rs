//! Ports layer for the Ledger subsystem.
//!
//! Outbound (driven) ports only: signing, signature policy and time.
//! The inbound API is the [`crate::Chain`] type itself.

pub mod outbound;

pub use outbound::*;
