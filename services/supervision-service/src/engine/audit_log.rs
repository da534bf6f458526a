//! The single, append-only journal for every observable action. Entries
//! form a hash chain (`integrity_hash` derives from the previous entry's
//! hash plus the canonical encoding of the current one) and are optionally
//! signed. The chain is extended by a single writer at a time.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::instrument;

use supervision_common::adapters::{DataStore, SigningAdapter};
use supervision_common::canonical::{canonicalize, chain_hash};
use supervision_common::error::{Result, SupervisionError};
use supervision_models::{ActorType, AuditEntry, AuditQueryFilter};

const RING_CAPACITY: usize = 256;

/// Outcome of `verify_chain`.
#[derive(Debug, Clone)]
pub struct ChainVerification {
    pub valid: bool,
    pub entries_verified: usize,
    pub first_invalid_id: Option<String>,
}

struct ChainState {
    last_hash: String,
    ring: VecDeque<AuditEntry>,
}

pub struct AuditLog {
    data_store: Arc<dyn DataStore>,
    signer: Option<Arc<dyn SigningAdapter>>,
    signing_enabled: bool,
    chain: Mutex<ChainState>,
}

impl AuditLog {
    pub fn new(data_store: Arc<dyn DataStore>, signer: Option<Arc<dyn SigningAdapter>>, signing_enabled: bool) -> Self {
        Self {
            data_store,
            signer,
            signing_enabled,
            chain: Mutex::new(ChainState { last_hash: String::new(), ring: VecDeque::with_capacity(RING_CAPACITY) }),
        }
    }

    #[instrument(skip(self, details), fields(action = %action, resource_type = %resource_type))]
    #[allow(clippy::too_many_arguments)]
    pub async fn log(
        &self,
        action: &str,
        actor_id: &str,
        actor_type: ActorType,
        resource_type: &str,
        resource_id: &str,
        details: serde_json::Value,
        parent_audit_id: Option<String>,
    ) -> Result<AuditEntry> {
        let mut entry = AuditEntry {
            audit_id: uuid::Uuid::new_v4().to_string(),
            action: action.to_string(),
            actor_id: actor_id.to_string(),
            actor_type,
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            details,
            parent_audit_id,
            timestamp: Utc::now(),
            integrity_hash: String::new(),
            signature: None,
            signature_algorithm: None,
        };

        // Single critical section: compute hash, persist, publish last_hash.
        // Held across the `.await` deliberately — DataStore::append_audit is
        // the only writer of the chain and must see a consistent prefix.
        let mut guard = self.chain.lock().await;
        let canonical = canonicalize(&entry);
        entry.integrity_hash = chain_hash(&guard.last_hash, &canonical);

        if self.signing_enabled {
            if let Some(signer) = &self.signer {
                let sig_input = format!("{canonical}:{}", entry.integrity_hash);
                entry.signature = Some(signer.sign(&sig_input).await?);
                entry.signature_algorithm = Some(signer.key_id().to_string());
            }
        }

        self.data_store.append_audit(entry.clone()).await?;

        guard.last_hash = entry.integrity_hash.clone();
        if guard.ring.len() == RING_CAPACITY {
            guard.ring.pop_front();
        }
        guard.ring.push_back(entry.clone());
        drop(guard);

        Ok(entry)
    }

    pub async fn get_by_id(&self, audit_id: &str) -> Result<AuditEntry> {
        self.data_store
            .get_audit(audit_id)
            .await?
            .ok_or_else(|| SupervisionError::AuditEntryNotFound(audit_id.to_string()))
    }

    pub async fn query(&self, filter: &AuditQueryFilter) -> Result<Vec<AuditEntry>> {
        self.data_store.query_audit(filter).await
    }

    pub async fn verify_entry(&self, entry: &AuditEntry, expected_prefix: &str) -> Result<bool> {
        let canonical = canonicalize(entry);
        let expected_hash = chain_hash(expected_prefix, &canonical);
        if expected_hash != entry.integrity_hash {
            return Ok(false);
        }
        if let (Some(signature), Some(signer)) = (&entry.signature, &self.signer) {
            let sig_input = format!("{canonical}:{}", entry.integrity_hash);
            return signer.verify(&sig_input, signature).await;
        }
        Ok(true)
    }

    /// Verify the hash chain over `[start, end]`. Entries still in the
    /// in-memory ring are checked directly; anything older is fetched from
    /// DataStore via `query_audit_range`.
    pub async fn verify_chain(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<ChainVerification> {
        let start = start.unwrap_or_else(|| DateTime::<Utc>::MIN_UTC);
        let end = end.unwrap_or_else(Utc::now);

        let ring_snapshot: Vec<AuditEntry> = {
            let guard = self.chain.lock().await;
            guard.ring.iter().cloned().collect()
        };

        let covers_full_range = ring_snapshot
            .front()
            .map(|first| first.timestamp <= start)
            .unwrap_or(false);

        let entries = if covers_full_range {
            ring_snapshot
                .into_iter()
                .filter(|e| e.timestamp >= start && e.timestamp <= end)
                .collect::<Vec<_>>()
        } else {
            self.data_store.query_audit_range(start, end).await?
        };

        let mut prefix = String::new();
        let mut verified = 0usize;
        for entry in &entries {
            let canonical = canonicalize(entry);
            let expected_hash = chain_hash(&prefix, &canonical);
            if expected_hash != entry.integrity_hash {
                return Ok(ChainVerification {
                    valid: false,
                    entries_verified: verified,
                    first_invalid_id: Some(entry.audit_id.clone()),
                });
            }
            prefix = entry.integrity_hash.clone();
            verified += 1;
        }

        Ok(ChainVerification { valid: true, entries_verified: verified, first_invalid_id: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use supervision_common::adapters::{HmacSigningAdapter, InMemoryDataStore};

    fn audit_log() -> AuditLog {
        AuditLog::new(
            Arc::new(InMemoryDataStore::new()),
            Some(Arc::new(HmacSigningAdapter::new("audit_signer_v1", b"test-key".to_vec()))),
            true,
        )
    }

    #[tokio::test]
    async fn appended_entries_chain_together() {
        let log = audit_log();
        let e1 = log
            .log("policy.evaluate", "agent-1", ActorType::Agent, "policy", "p1", serde_json::json!({}), None)
            .await
            .unwrap();
        let e2 = log
            .log("policy.evaluate", "agent-1", ActorType::Agent, "policy", "p1", serde_json::json!({}), None)
            .await
            .unwrap();
        assert_ne!(e1.integrity_hash, e2.integrity_hash);
        assert!(e1.signature.is_some());
    }

    #[tokio::test]
    async fn verify_chain_detects_no_tampering_on_a_clean_log() {
        let log = audit_log();
        for _ in 0..5 {
            log.log("policy.evaluate", "agent-1", ActorType::Agent, "policy", "p1", serde_json::json!({}), None)
                .await
                .unwrap();
        }
        let verification = log.verify_chain(None, None).await.unwrap();
        assert!(verification.valid);
        assert_eq!(verification.entries_verified, 5);
    }
}
