//! Notification adapter contract and a no-op fallback.
//!
//! The real backing (the L10 human-interface service) is out of scope here.
//! `InMemoryNotifier` just logs and records what it was asked to send, which
//! is enough for `EscalationOrchestrator` to exercise its notify/retry path
//! in `dev_mode` and in tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

use supervision_models::EscalationWorkflow;

use crate::error::Result;

#[async_trait]
pub trait NotifierAdapter: Send + Sync {
    /// Notify the configured approvers that `workflow` needs attention.
    /// Returns `Ok(true)` if delivery is believed to have succeeded.
    async fn notify(&self, workflow: &EscalationWorkflow) -> Result<bool>;

    /// Send a time-remaining reminder for a still-pending workflow.
    async fn reminder(&self, workflow: &EscalationWorkflow, time_remaining_s: i64) -> Result<bool>;

    /// Notify approvers that a workflow reached a terminal state.
    async fn resolved(&self, workflow: &EscalationWorkflow) -> Result<bool>;

    /// Verify an MFA token presented alongside a resolution. The real
    /// backing validates against the approver's enrolled factor; this
    /// fallback only checks the token is non-empty.
    async fn verify_mfa(&self, approver_id: &str, token: &str, workflow_id: &str) -> Result<bool>;
}

/// Fallback notifier: always "succeeds" and keeps the last N notifications
/// sent, in memory, for tests and the health surface to inspect.
#[derive(Default)]
pub struct InMemoryNotifier {
    sent: Mutex<Vec<String>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_workflow_ids(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl NotifierAdapter for InMemoryNotifier {
    async fn notify(&self, workflow: &EscalationWorkflow) -> Result<bool> {
        info!(
            workflow_id = %workflow.workflow_id,
            approvers = ?workflow.approvers,
            level = workflow.escalation_level,
            "escalation notification (dev-mode fallback, not delivered externally)"
        );
        self.sent.lock().push(workflow.workflow_id.clone());
        Ok(true)
    }

    async fn reminder(&self, workflow: &EscalationWorkflow, time_remaining_s: i64) -> Result<bool> {
        info!(workflow_id = %workflow.workflow_id, time_remaining_s, "escalation reminder (dev-mode fallback)");
        Ok(true)
    }

    async fn resolved(&self, workflow: &EscalationWorkflow) -> Result<bool> {
        info!(workflow_id = %workflow.workflow_id, status = %workflow.status, "escalation resolved notification (dev-mode fallback)");
        Ok(true)
    }

    async fn verify_mfa(&self, approver_id: &str, token: &str, workflow_id: &str) -> Result<bool> {
        info!(approver_id, workflow_id, "mfa verification (dev-mode fallback, token presence only)");
        Ok(!token.is_empty())
    }
}

#[async_trait]
impl super::Adapter for InMemoryNotifier {
    fn adapter_name(&self) -> &'static str {
        "in_memory_notifier"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;
    use supervision_models::EscalationStatus;

    fn sample_workflow() -> EscalationWorkflow {
        EscalationWorkflow {
            workflow_id: "w1".to_string(),
            decision_id: "d1".to_string(),
            reason: "policy escalation".to_string(),
            context: HashMap::new(),
            status: EscalationStatus::Pending,
            escalation_level: 1,
            approvers: vec!["alice".to_string()],
            assigned_to: None,
            mfa_verified: false,
            created_at: Utc::now(),
            notified_at: None,
            timeout_at: Utc::now() + chrono::Duration::seconds(300),
            resolved_at: None,
            resolved_by: None,
            resolution_notes: String::new(),
        }
    }

    #[tokio::test]
    async fn notify_records_workflow_id() {
        let notifier = InMemoryNotifier::new();
        notifier.notify(&sample_workflow()).await.unwrap();
        assert_eq!(notifier.sent_workflow_ids(), vec!["w1".to_string()]);
    }
}
