use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregated compliance counters and derived score for one entity (agent,
/// team, department, or the synthetic `"system"` entity).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceStatus {
    pub entity_id: String,
    pub entity_type: String,

    pub policy_evaluations: u64,
    pub policy_violations: u64,
    pub policy_escalations: u64,

    pub constraint_checks: u64,
    pub constraint_violations: u64,

    pub anomalies_detected: u64,
    pub critical_anomalies: u64,
    pub unacknowledged_anomalies: u64,

    pub pending_escalations: u64,
    pub approved_escalations: u64,
    pub rejected_escalations: u64,
    pub timeout_escalations: u64,

    pub compliance_score: f64,
    pub risk_level: String,

    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl ComplianceStatus {
    pub fn new(entity_id: impl Into<String>, entity_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            entity_id: entity_id.into(),
            entity_type: entity_type.into(),
            policy_evaluations: 0,
            policy_violations: 0,
            policy_escalations: 0,
            constraint_checks: 0,
            constraint_violations: 0,
            anomalies_detected: 0,
            critical_anomalies: 0,
            unacknowledged_anomalies: 0,
            pending_escalations: 0,
            approved_escalations: 0,
            rejected_escalations: 0,
            timeout_escalations: 0,
            compliance_score: 100.0,
            risk_level: "LOW".to_string(),
            period_start: now - chrono::Duration::hours(24),
            period_end: now,
            last_updated: now,
        }
    }
}
