//! # SL-03 Cross-Channel Relay
//!
//! Moves value between shards.
//!
//! **Subsystem ID:** 3
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Transfer Lifecycle
//!
//! ```text
//! submit ──▶ Queued ──(batch threshold)──▶ Batched(id)
//!                                             │ first vote
//!                                             ▼
//!                         Finalized(id) ◀── Validating(id)
//!                                (validation threshold)
//! ```
//!
//! Cross-shard transfers queue per `(source, target)` channel and per target
//! shard. When a target queue reaches the batch threshold it is snapshotted
//! and cleared in one critical section into a [`RelayBlock`]. Registered
//! relay nodes vote on the block; the validation threshold finalizes it
//! exactly once and makes its transfers deliverable to the target shard.
//!
//! ## Module Structure
//!
//! ```text
//! sl-03-relay/
//! ├── domain/          # Channel, RelayBlock, TransferState, config, status, errors
//! ├── relay.rs         # CrossChannelRelay state machine
//! └── worker.rs        # RelayWorker (async validation on RelayBlockCreated)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod relay;
pub mod worker;

// Re-exports
pub use domain::{
    Channel, ChannelStatus, RelayBlock, RelayConfig, RelayError, RelayEvent, RelayOutcome,
    RelayResult, RelayStatus, TransferState,
};
pub use relay::CrossChannelRelay;
pub use worker::RelayWorker;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
