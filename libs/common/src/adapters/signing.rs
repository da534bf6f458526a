//! Signing adapter contract and a dev-mode HMAC fallback.
//!
//! The real backing (a Vault transit engine, per the original integration)
//! is out of scope here; `HmacSigningAdapter` signs with a process-local key
//! and exists so audit entries can carry a `signature`/`signature_algorithm`
//! end to end in dev/test without a Vault dependency.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{Result, SupervisionError};

type HmacSha256 = Hmac<Sha256>;

#[async_trait]
pub trait SigningAdapter: Send + Sync {
    /// Identifier stamped into `AuditEntry::signature_algorithm` context,
    /// e.g. `audit_signer_v1`.
    fn key_id(&self) -> &str;

    /// Sign `payload`, returning a hex-encoded signature.
    async fn sign(&self, payload: &str) -> Result<String>;

    /// Verify `payload` against a previously produced `signature`.
    async fn verify(&self, payload: &str, signature: &str) -> Result<bool>;
}

/// HMAC-SHA256 signer keyed from configuration. Not a substitute for a real
/// key-management service; intended for `dev_mode` and tests.
pub struct HmacSigningAdapter {
    key_id: String,
    key: Vec<u8>,
}

impl HmacSigningAdapter {
    pub fn new(key_id: impl Into<String>, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key_id: key_id.into(),
            key: key.into(),
        }
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.key)
            .map_err(|e| SupervisionError::AuditSignatureInvalid(e.to_string()))
    }
}

#[async_trait]
impl SigningAdapter for HmacSigningAdapter {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn sign(&self, payload: &str) -> Result<String> {
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    async fn verify(&self, payload: &str, signature: &str) -> Result<bool> {
        let expected = self.sign(payload).await?;
        Ok(constant_time_eq(expected.as_bytes(), signature.as_bytes()))
    }
}

#[async_trait]
impl super::Adapter for HmacSigningAdapter {
    fn adapter_name(&self) -> &'static str {
        "hmac_signing_adapter"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.key.is_empty())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_then_verify_round_trips() {
        let adapter = HmacSigningAdapter::new("audit_signer_v1", b"test-key".to_vec());
        let sig = adapter.sign("payload").await.unwrap();
        assert!(adapter.verify("payload", &sig).await.unwrap());
    }

    #[tokio::test]
    async fn verify_rejects_tampered_payload() {
        let adapter = HmacSigningAdapter::new("audit_signer_v1", b"test-key".to_vec());
        let sig = adapter.sign("payload").await.unwrap();
        assert!(!adapter.verify("other-payload", &sig).await.unwrap());
    }
}
