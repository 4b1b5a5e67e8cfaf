//! Sharding algorithms.

pub mod assignment;

pub use assignment::*;
