//! # Node Runtime Library
//!
//! Composition of the Shard-Ledger subsystems into one node. The binary in
//! `main.rs` and the workspace test suite both build on [`ShardNode`].
//!
//! ## Module Structure
//!
//! ```text
//! node-runtime/
//! ├── adapters/     # RelayGateway (sl-04 → sl-03), LocalNetwork (in-process gossip)
//! ├── config.rs     # NodeConfig + SL_* environment overrides
//! ├── error.rs      # NodeError
//! ├── logging.rs    # tracing-subscriber setup
//! └── node.rs       # ShardNode facade and cross-shard wiring
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod config;
pub mod error;
pub mod logging;
pub mod node;

// Re-exports
pub use adapters::{Inbox, LocalNetwork, RelayGateway};
pub use config::{ConfigError, LogConfig, NodeConfig};
pub use error::{NodeError, NodeResult};
pub use node::{NodeStatus, ShardNode};
