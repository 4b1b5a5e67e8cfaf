//! # Domain Module
//!
//! Configuration, wire messages, status snapshots and errors shared by all
//! consensus variants.

pub mod config;
pub mod errors;
pub mod messages;
pub mod status;

pub use config::*;
pub use errors::*;
pub use messages::*;
pub use status::*;
