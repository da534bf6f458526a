use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Actor kind recorded on an `AuditEntry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorType {
    Agent,
    User,
    System,
}

/// One entry in the append-only hash chain. `integrity_hash`, `signature`
/// and `signature_algorithm` are populated by `AuditLog::log` and are
/// excluded from `canonical()` (see `supervision_common::canonical`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub audit_id: String,
    pub action: String,
    pub actor_id: String,
    pub actor_type: ActorType,
    pub resource_type: String,
    pub resource_id: String,
    pub details: serde_json::Value,
    pub parent_audit_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub integrity_hash: String,
    pub signature: Option<String>,
    pub signature_algorithm: Option<String>,
}

/// Fields eligible for filtering a `QueryAudit` call.
#[derive(Debug, Clone, Default)]
pub struct AuditQueryFilter {
    pub actor_id: Option<String>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}
