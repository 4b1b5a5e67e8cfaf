//! # HMAC Signer
//!
//! Keyed HMAC-SHA256 signer and verifier for networks whose nodes share a
//! key. It proves possession of the key, not identity of the sender.

use crate::ports::{SignatureVerifier, TransactionSigner};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Shared-key HMAC-SHA256 signer.
#[derive(Clone)]
pub struct HmacSigner {
    id: String,
    key: Vec<u8>,
}

impl HmacSigner {
    /// Signer with an anonymous identity.
    pub fn new(key: &[u8]) -> Self {
        Self::with_id("anonymous", key)
    }

    /// Signer that reports `id` as its identity.
    pub fn with_id(id: impl Into<String>, key: &[u8]) -> Self {
        Self {
            id: id.into(),
            key: key.to_vec(),
        }
    }

    fn mac(&self) -> HmacSha256 {
        match HmacSha256::new_from_slice(&self.key) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC accepts keys of any length"),
        }
    }
}

impl std::fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSigner").field("id", &self.id).finish()
    }
}

impl TransactionSigner for HmacSigner {
    fn signer_id(&self) -> &str {
        &self.id
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        let mut mac = self.mac();
        mac.update(message);
        mac.finalize().into_bytes().to_vec()
    }
}

impl SignatureVerifier for HmacSigner {
    fn verify(&self, message: &[u8], signature: &[u8], _signer: &str) -> bool {
        let mut mac = self.mac();
        mac.update(message);
        mac.verify_slice(signature).is_ok()
    }
}
