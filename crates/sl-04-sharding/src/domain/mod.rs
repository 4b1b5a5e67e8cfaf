//! Domain layer for the Sharding subsystem.

pub mod config;
pub mod errors;
pub mod shard;
pub mod status;

pub use config::*;
pub use errors::*;
pub use shard::*;
pub use status::*;
