//! # Domain Module
//!
//! Core ledger types: hashes, transactions, blocks and the merkle root.

pub mod block;
pub mod errors;
pub mod hash;
pub mod merkle;
pub mod transaction;

pub use block::*;
pub use errors::*;
pub use hash::*;
pub use merkle::*;
pub use transaction::*;
