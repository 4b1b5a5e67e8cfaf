//! # Outbound Ports
//!
//! Pluggable signing and time. The ledger fixes where signatures are
//! produced and checked, not which scheme produces them.

/// Produces a signature over a message (a transaction or block hash).
pub trait TransactionSigner: Send + Sync {
    /// Signer identity recorded alongside its signatures.
    fn signer_id(&self) -> &str;

    /// Sign `message`.
    fn sign(&self, message: &[u8]) -> Vec<u8>;
}

/// Signature acceptance policy applied by the chain on admission.
pub trait SignatureVerifier: Send + Sync {
    /// True if `signature` over `message` is acceptable for `signer`.
    fn verify(&self, message: &[u8], signature: &[u8], signer: &str) -> bool;
}

/// Default policy: a signature must be present.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresenceVerifier;

impl SignatureVerifier for PresenceVerifier {
    fn verify(&self, _message: &[u8], signature: &[u8], _signer: &str) -> bool {
        !signature.is_empty()
    }
}

/// Time source for consistent timestamp handling.
pub trait TimeSource: Send + Sync {
    /// Current Unix time in milliseconds.
    fn now_millis(&self) -> u64;
}

/// Default system time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}
