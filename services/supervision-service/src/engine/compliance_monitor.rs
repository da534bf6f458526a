//! Aggregates policy/constraint/anomaly/escalation counters per entity into
//! a single compliance score and risk level.

use std::collections::HashMap;

use parking_lot::Mutex;
use supervision_models::{ComplianceStatus, PolicyVerdict};

pub struct ComplianceMonitor {
    statuses: Mutex<HashMap<String, ComplianceStatus>>,
}

impl ComplianceMonitor {
    pub fn new() -> Self {
        Self { statuses: Mutex::new(HashMap::new()) }
    }

    fn entry(&self, statuses: &mut HashMap<String, ComplianceStatus>, entity_id: &str) {
        statuses
            .entry(entity_id.to_string())
            .or_insert_with(|| ComplianceStatus::new(entity_id, "agent"));
    }

    pub fn record_policy_evaluation(&self, entity_id: &str, verdict: PolicyVerdict) {
        let mut statuses = self.statuses.lock();
        self.entry(&mut statuses, entity_id);
        let status = statuses.get_mut(entity_id).expect("just inserted");
        status.policy_evaluations += 1;
        match verdict {
            PolicyVerdict::Deny => status.policy_violations += 1,
            PolicyVerdict::Escalate => status.policy_escalations += 1,
            PolicyVerdict::Allow => {}
        }
        self.update_score(status);
    }

    pub fn record_constraint_check(&self, entity_id: &str, allowed: bool) {
        let mut statuses = self.statuses.lock();
        self.entry(&mut statuses, entity_id);
        let status = statuses.get_mut(entity_id).expect("just inserted");
        status.constraint_checks += 1;
        if !allowed {
            status.constraint_violations += 1;
        }
        self.update_score(status);
    }

    pub fn record_anomaly(&self, entity_id: &str, critical: bool) {
        let mut statuses = self.statuses.lock();
        self.entry(&mut statuses, entity_id);
        let status = statuses.get_mut(entity_id).expect("just inserted");
        status.anomalies_detected += 1;
        status.unacknowledged_anomalies += 1;
        if critical {
            status.critical_anomalies += 1;
        }
        self.update_score(status);
    }

    pub fn record_anomaly_acknowledged(&self, entity_id: &str) {
        let mut statuses = self.statuses.lock();
        self.entry(&mut statuses, entity_id);
        let status = statuses.get_mut(entity_id).expect("just inserted");
        status.unacknowledged_anomalies = status.unacknowledged_anomalies.saturating_sub(1);
        self.update_score(status);
    }

    pub fn record_escalation(&self, entity_id: &str, outcome: EscalationOutcome) {
        let mut statuses = self.statuses.lock();
        self.entry(&mut statuses, entity_id);
        let status = statuses.get_mut(entity_id).expect("just inserted");
        match outcome {
            EscalationOutcome::Pending => status.pending_escalations += 1,
            EscalationOutcome::Approved => {
                status.pending_escalations = status.pending_escalations.saturating_sub(1);
                status.approved_escalations += 1;
            }
            EscalationOutcome::Rejected => {
                status.pending_escalations = status.pending_escalations.saturating_sub(1);
                status.rejected_escalations += 1;
            }
            EscalationOutcome::TimedOut => {
                status.pending_escalations = status.pending_escalations.saturating_sub(1);
                status.timeout_escalations += 1;
            }
        }
        self.update_score(status);
    }

    pub fn get_status(&self, entity_id: &str) -> ComplianceStatus {
        let mut statuses = self.statuses.lock();
        self.entry(&mut statuses, entity_id);
        statuses.get(entity_id).cloned().expect("just inserted")
    }

    fn update_score(&self, status: &mut ComplianceStatus) {
        let score = 100.0
            - status.policy_violations as f64 * 5.0
            - status.constraint_violations as f64 * 3.0
            - (status.anomalies_detected.saturating_sub(status.critical_anomalies)) as f64 * 2.0
            - status.critical_anomalies as f64 * 10.0
            - status.pending_escalations as f64 * 5.0;
        status.compliance_score = score.clamp(0.0, 100.0);

        status.risk_level = if status.critical_anomalies > 0 || status.compliance_score < 40.0 {
            "CRITICAL"
        } else if status.compliance_score < 60.0 {
            "HIGH"
        } else if status.compliance_score < 80.0 {
            "MEDIUM"
        } else {
            "LOW"
        }
        .to_string();

        status.last_updated = chrono::Utc::now();
    }
}

impl Default for ComplianceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum EscalationOutcome {
    Pending,
    Approved,
    Rejected,
    TimedOut,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_starts_at_100() {
        let monitor = ComplianceMonitor::new();
        let status = monitor.get_status("agent-1");
        assert_eq!(status.compliance_score, 100.0);
        assert_eq!(status.risk_level, "LOW");
    }

    #[test]
    fn critical_anomaly_forces_critical_risk_regardless_of_score() {
        let monitor = ComplianceMonitor::new();
        monitor.record_anomaly("agent-1", true);
        let status = monitor.get_status("agent-1");
        assert_eq!(status.risk_level, "CRITICAL");
    }

    #[test]
    fn score_matches_documented_formula() {
        let monitor = ComplianceMonitor::new();
        monitor.record_policy_evaluation("agent-1", PolicyVerdict::Deny);
        monitor.record_policy_evaluation("agent-1", PolicyVerdict::Deny);
        monitor.record_constraint_check("agent-1", false);
        let status = monitor.get_status("agent-1");
        // 100 - 2*5 - 1*3 = 87
        assert_eq!(status.compliance_score, 87.0);
    }
}
