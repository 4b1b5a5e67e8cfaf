//! # Domain Module

pub mod channel;
pub mod config;
pub mod errors;
pub mod events;
pub mod relay_block;
pub mod status;

pub use channel::*;
pub use config::*;
pub use errors::*;
pub use events::*;
pub use relay_block::*;
pub use status::*;
