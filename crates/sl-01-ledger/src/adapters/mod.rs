//! Adapters layer for the Ledger subsystem.

pub mod hmac_signer;

pub use hmac_signer::HmacSigner;
