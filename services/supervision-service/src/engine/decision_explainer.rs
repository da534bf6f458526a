//! Turns the structured outputs of the other engine components into
//! human-readable text for dashboards, tickets, and audit review.

use std::collections::HashMap;
use std::fmt::Write as _;

use supervision_models::{Anomaly, AnomalySeverity, ConstraintViolation, EscalationWorkflow, PolicyDecision, PolicyVerdict};

pub struct DecisionExplainer;

impl DecisionExplainer {
    pub fn new() -> Self {
        Self
    }

    pub fn explain_decision(&self, decision: &PolicyDecision) -> String {
        let mut out = String::new();

        match decision.verdict {
            PolicyVerdict::Allow => out.push_str("ACCESS ALLOWED"),
            PolicyVerdict::Deny => out.push_str("ACCESS DENIED"),
            PolicyVerdict::Escalate => out.push_str("ESCALATION REQUIRED"),
        }
        out.push_str("\n\n");

        if decision.matched_rules.is_empty() {
            out.push_str("No policies matched this request. Default ALLOW applied.\n");
        } else {
            let _ = writeln!(out, "Matched {} policy rule(s):\n", decision.matched_rules.len());
            for rule in &decision.matched_rules {
                let icon = verdict_icon(rule.action);
                let _ = writeln!(out, "  {icon} [{}] {} (from '{}')", rule.action, rule.rule_name, rule.policy_name);
            }
        }
        out.push('\n');

        if !decision.request_context.is_empty() {
            out.push_str("Request Context:\n");
            let operation = decision
                .request_context
                .get("operation")
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown");
            let _ = writeln!(out, "  Operation: {operation}");
            if let Some(resource) = decision.request_context.get("resource") {
                let rtype = resource.get("type").and_then(|v| v.as_str()).unwrap_or("Unknown");
                let rid = resource.get("id").and_then(|v| v.as_str()).unwrap_or("N/A");
                let _ = writeln!(out, "  Resource: {rtype} / {rid}");
            }
            out.push('\n');
        }

        let _ = writeln!(out, "Decision ID: {}", decision.decision_id);
        let _ = writeln!(out, "Confidence: {:.0}%", decision.confidence * 100.0);
        let _ = write!(out, "Latency: {:.2}ms", decision.evaluation_latency_ms);
        out
    }

    pub fn explain_violation(&self, violation: &ConstraintViolation) -> String {
        let mut out = String::new();
        out.push_str("CONSTRAINT VIOLATION\n\n");
        let _ = writeln!(out, "Constraint: {}", violation.constraint_id);
        let _ = writeln!(out, "Type: {}", violation.violation_type);
        out.push('\n');
        let _ = writeln!(out, "Current Usage: {:.2}", violation.current_usage);
        let _ = writeln!(out, "Limit: {:.2}", violation.limit);
        let _ = writeln!(out, "Overage: {:.2}", violation.current_usage - violation.limit);
        out.push('\n');

        match violation.violation_type.as_str() {
            "RATE_LIMIT" => out.push_str("Remediation: Wait for the rate limit window to reset, or request a limit increase."),
            "QUOTA" => out.push_str("Remediation: Request additional quota allocation from an administrator."),
            "RESOURCE_CAP" => out.push_str("Remediation: Release unused resources or request a higher resource cap."),
            _ => {}
        }
        out
    }

    pub fn explain_escalation(&self, workflow: &EscalationWorkflow) -> String {
        let mut out = String::new();
        out.push_str("ESCALATION REQUIRED\n\n");
        let _ = writeln!(out, "Reason: {}", workflow.reason);
        let _ = writeln!(out, "Status: {}", workflow.status);
        let _ = writeln!(out, "Level: {}", workflow.escalation_level);
        out.push('\n');

        if !workflow.context.is_empty() {
            out.push_str("Context:\n");
            for (key, value) in &workflow.context {
                let _ = writeln!(out, "  {key}: {value}");
            }
            out.push('\n');
        }

        if !workflow.approvers.is_empty() {
            let _ = writeln!(out, "Pending approval from: {}", workflow.approvers.join(", "));
        }
        if let Some(assignee) = &workflow.assigned_to {
            let _ = writeln!(out, "Assigned to: {assignee}");
        }
        let _ = write!(out, "Timeout: {}", workflow.timeout_at.to_rfc3339());
        out
    }

    pub fn explain_anomaly(&self, anomaly: &Anomaly) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "ANOMALY DETECTED - Severity: {}", anomaly.severity);
        out.push('\n');
        let _ = writeln!(out, "{}", anomaly.description);
        out.push('\n');
        let _ = writeln!(out, "Metric: {}", anomaly.metric_name);
        let _ = writeln!(out, "Agent: {}", anomaly.agent_id);
        out.push('\n');
        let _ = writeln!(out, "Baseline Value: {:.4}", anomaly.baseline_value);
        let _ = writeln!(out, "Observed Value: {:.4}", anomaly.observed_value);
        let _ = writeln!(out, "Z-Score: {:.2}", anomaly.z_score);
        let _ = writeln!(out, "Detection Method: {}", anomaly.detection_method);
        let _ = writeln!(out, "Confidence: {:.0}%", anomaly.confidence * 100.0);
        out.push('\n');

        out.push_str(match anomaly.severity {
            AnomalySeverity::Critical => {
                "CRITICAL: Immediate investigation recommended. This deviation is significantly outside normal operating parameters."
            }
            AnomalySeverity::High => "HIGH: Prompt investigation recommended. This deviation exceeds the 3-sigma threshold.",
            AnomalySeverity::Medium => "MEDIUM: Monitor for persistence. This deviation is notable but within acceptable variance.",
            AnomalySeverity::Low => "LOW: Minor deviation detected. Consider reviewing if pattern continues.",
        });
        out
    }

    pub fn generate_summary(
        &self,
        decisions: &[PolicyDecision],
        violations: &[ConstraintViolation],
        anomalies: &[Anomaly],
    ) -> String {
        let mut out = String::new();
        out.push_str("SUPERVISION SUMMARY\n");
        out.push_str(&"=".repeat(40));
        out.push_str("\n\n");

        let allow_count = decisions.iter().filter(|d| d.verdict == PolicyVerdict::Allow).count();
        let deny_count = decisions.iter().filter(|d| d.verdict == PolicyVerdict::Deny).count();
        let escalate_count = decisions.iter().filter(|d| d.verdict == PolicyVerdict::Escalate).count();

        let _ = writeln!(out, "Policy Decisions: {}", decisions.len());
        let _ = writeln!(out, "  - Allowed: {allow_count}");
        let _ = writeln!(out, "  - Denied: {deny_count}");
        let _ = writeln!(out, "  - Escalated: {escalate_count}");
        out.push('\n');

        let _ = writeln!(out, "Constraint Violations: {}", violations.len());
        if !violations.is_empty() {
            let mut by_type: HashMap<&str, usize> = HashMap::new();
            for v in violations {
                *by_type.entry(v.violation_type.as_str()).or_insert(0) += 1;
            }
            for (vtype, count) in by_type {
                let _ = writeln!(out, "  - {vtype}: {count}");
            }
        }
        out.push('\n');

        let _ = writeln!(out, "Anomalies Detected: {}", anomalies.len());
        if !anomalies.is_empty() {
            let mut by_severity: HashMap<String, usize> = HashMap::new();
            for a in anomalies {
                *by_severity.entry(a.severity.to_string()).or_insert(0) += 1;
            }
            for (severity, count) in by_severity {
                let _ = write!(out, "  - {severity}: {count}\n");
            }
        }

        out
    }
}

impl Default for DecisionExplainer {
    fn default() -> Self {
        Self::new()
    }
}

fn verdict_icon(verdict: PolicyVerdict) -> &'static str {
    match verdict {
        PolicyVerdict::Allow => "[+]",
        PolicyVerdict::Deny => "[X]",
        PolicyVerdict::Escalate => "[!]",
    }
}
