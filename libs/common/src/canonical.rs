//! Canonical JSON encoding for the audit hash chain.
//!
//! `canonicalize` produces a stable byte representation of an `AuditEntry`
//! (object keys sorted, `signature`/`integrity_hash` excluded) so that
//! `chain_input = last_chain_hash ++ ":" ++ canonicalize(entry)` is
//! reproducible across processes and across the Rust/Python implementations
//! it is compared against in `tests/`.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use supervision_models::AuditEntry;

const EXCLUDED_FIELDS: &[&str] = &["signature", "integrity_hash"];

/// Canonical JSON string for `entry`, with keys sorted and signature fields
/// stripped. Safe to call before `integrity_hash`/`signature` are populated.
pub fn canonicalize(entry: &AuditEntry) -> String {
    let value = serde_json::to_value(entry).expect("AuditEntry always serializes");
    let sorted = sort_object(value);
    serde_json::to_string(&sorted).expect("sorted Value always serializes")
}

fn sort_object(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted = Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                if EXCLUDED_FIELDS.contains(&key.as_str()) {
                    continue;
                }
                sorted.insert(key.clone(), sort_object(map[key].clone()));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_object).collect()),
        other => other,
    }
}

/// `sha256(prefix ++ payload)`, hex-encoded. `prefix` is typically the
/// previous entry's `integrity_hash`, or the empty genesis seed.
pub fn chain_hash(prefix: &str, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use supervision_models::ActorType;

    fn sample_entry() -> AuditEntry {
        AuditEntry {
            audit_id: "a1".to_string(),
            action: "policy.evaluate".to_string(),
            actor_id: "agent-7".to_string(),
            actor_type: ActorType::Agent,
            resource_type: "policy".to_string(),
            resource_id: "p1".to_string(),
            details: serde_json::json!({"verdict": "ALLOW"}),
            parent_audit_id: None,
            timestamp: Utc::now(),
            integrity_hash: "placeholder".to_string(),
            signature: Some("placeholder-sig".to_string()),
            signature_algorithm: Some("hmac-sha256".to_string()),
        }
    }

    #[test]
    fn canonicalize_excludes_signature_fields() {
        let entry = sample_entry();
        let canonical = canonicalize(&entry);
        assert!(!canonical.contains("placeholder"));
        assert!(!canonical.contains("integrity_hash"));
        assert!(!canonical.contains("\"signature\""));
    }

    #[test]
    fn canonicalize_is_deterministic() {
        let entry = sample_entry();
        assert_eq!(canonicalize(&entry), canonicalize(&entry));
    }

    #[test]
    fn chain_hash_changes_with_prefix() {
        let payload = "{\"a\":1}";
        assert_ne!(chain_hash("", payload), chain_hash("seed", payload));
    }
}
