//! Drives a human-approval workflow with deadlines and multi-level
//! auto-escalation. Exactly one timeout-monitor task runs per live workflow;
//! resolving or auto-escalating cancels and/or replaces it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use supervision_common::adapters::{DataStore, NotifierAdapter};
use supervision_common::error::{Result, SupervisionError};
use supervision_models::{ActorType, EscalationStatus, EscalationWorkflow};

use super::audit_log::AuditLog;

pub struct EscalationOrchestratorConfig {
    pub escalation_timeout_seconds: u64,
    pub escalation_retry_count: u32,
    pub escalation_retry_delay_seconds: u64,
    pub max_escalation_level: u32,
    pub require_mfa_for_approval: bool,
}

pub struct EscalationOrchestrator {
    data_store: Arc<dyn DataStore>,
    notifier: Arc<dyn NotifierAdapter>,
    audit_log: Arc<AuditLog>,
    config: EscalationOrchestratorConfig,
    monitors: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl EscalationOrchestrator {
    pub fn new(
        data_store: Arc<dyn DataStore>,
        notifier: Arc<dyn NotifierAdapter>,
        audit_log: Arc<AuditLog>,
        config: EscalationOrchestratorConfig,
    ) -> Arc<Self> {
        Arc::new(Self { data_store, notifier, audit_log, config, monitors: Mutex::new(HashMap::new()) })
    }

    #[instrument(skip(self, context, approvers), fields(decision_id = %decision_id))]
    pub async fn create_escalation(
        self: &Arc<Self>,
        decision_id: &str,
        reason: &str,
        context: HashMap<String, serde_json::Value>,
        approvers: Vec<String>,
    ) -> Result<EscalationWorkflow> {
        let now = Utc::now();
        let workflow = EscalationWorkflow {
            workflow_id: uuid::Uuid::new_v4().to_string(),
            decision_id: decision_id.to_string(),
            reason: reason.to_string(),
            context,
            status: EscalationStatus::Pending,
            escalation_level: 1,
            approvers,
            assigned_to: None,
            mfa_verified: false,
            created_at: now,
            notified_at: None,
            timeout_at: now + chrono::Duration::seconds(self.config.escalation_timeout_seconds as i64),
            resolved_at: None,
            resolved_by: None,
            resolution_notes: String::new(),
        };
        self.data_store.put_escalation(workflow.clone()).await?;
        self.spawn_monitor(workflow.workflow_id.clone());

        let _ = self
            .audit_log
            .log(
                "escalation.created",
                decision_id,
                ActorType::System,
                "escalation_workflow",
                &workflow.workflow_id,
                serde_json::json!({"reason": workflow.reason, "approvers": workflow.approvers}),
                None,
            )
            .await;

        let this = Arc::clone(self);
        let workflow_id = workflow.workflow_id.clone();
        tokio::spawn(async move {
            this.notify_with_retry(&workflow_id).await;
        });

        Ok(workflow)
    }

    /// Assign a workflow to a specific approver (supplemental to the base
    /// state machine: `NOTIFIED -> ASSIGNED` or `WAITING -> ASSIGNED`).
    pub async fn assign(&self, workflow_id: &str, assignee: &str) -> Result<EscalationWorkflow> {
        let mut workflow = self.load_non_terminal(workflow_id).await?;
        workflow.assigned_to = Some(assignee.to_string());
        workflow.status = EscalationStatus::Assigned;
        self.data_store.put_escalation(workflow.clone()).await?;
        Ok(workflow)
    }

    #[instrument(skip(self, notes, mfa_token), fields(workflow_id = %workflow_id))]
    pub async fn resolve(
        &self,
        workflow_id: &str,
        approved: bool,
        approver_id: &str,
        notes: &str,
        mfa_token: Option<&str>,
    ) -> Result<EscalationWorkflow> {
        let mut workflow = self.load_non_terminal(workflow_id).await?;

        let mfa_verified = if self.config.require_mfa_for_approval {
            let token = mfa_token
                .filter(|t| !t.is_empty())
                .ok_or_else(|| SupervisionError::EscalationMfaRequired(workflow_id.to_string()))?;
            let verified = self.notifier.verify_mfa(approver_id, token, workflow_id).await?;
            if !verified {
                return Err(SupervisionError::EscalationMfaFailed(workflow_id.to_string()));
            }
            true
        } else {
            false
        };

        self.cancel_monitor(workflow_id);

        workflow.status = if approved { EscalationStatus::Approved } else { EscalationStatus::Rejected };
        workflow.resolved_at = Some(Utc::now());
        workflow.resolved_by = Some(approver_id.to_string());
        workflow.resolution_notes = notes.to_string();
        workflow.mfa_verified = mfa_verified;
        self.data_store.put_escalation(workflow.clone()).await?;

        let _ = self
            .audit_log
            .log(
                "escalation.resolved",
                approver_id,
                ActorType::User,
                "escalation_workflow",
                &workflow.workflow_id,
                serde_json::json!({"status": workflow.status.to_string(), "notes": notes}),
                None,
            )
            .await;

        let _ = self.notifier.resolved(&workflow).await;
        Ok(workflow)
    }

    pub async fn get(&self, workflow_id: &str) -> Result<EscalationWorkflow> {
        self.data_store
            .get_escalation(workflow_id)
            .await?
            .ok_or_else(|| SupervisionError::EscalationNotFound(workflow_id.to_string()))
    }

    pub async fn list_pending(&self) -> Result<Vec<EscalationWorkflow>> {
        self.data_store.list_pending_escalations().await
    }

    async fn load_non_terminal(&self, workflow_id: &str) -> Result<EscalationWorkflow> {
        let workflow = self.get(workflow_id).await?;
        if workflow.is_terminal() {
            return Err(SupervisionError::EscalationAlreadyResolved(workflow_id.to_string()));
        }
        Ok(workflow)
    }

    async fn notify_with_retry(&self, workflow_id: &str) {
        for attempt in 0..=self.config.escalation_retry_count {
            match self.notifier.notify(&match self.get(workflow_id).await {
                Ok(w) => w,
                Err(_) => return,
            }).await {
                Ok(true) => {
                    if let Ok(mut workflow) = self.get(workflow_id).await {
                        if workflow.status == EscalationStatus::Pending {
                            workflow.status = EscalationStatus::Notified;
                            workflow.notified_at = Some(Utc::now());
                            let _ = self.data_store.put_escalation(workflow).await;
                        }
                    }
                    return;
                }
                _ => {
                    if attempt == self.config.escalation_retry_count {
                        warn!(workflow_id, attempt, "escalation notification exhausted retries");
                        return;
                    }
                    let delay = self.config.escalation_retry_delay_seconds * 2u64.pow(attempt);
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                }
            }
        }
    }

    fn spawn_monitor(self: &Arc<Self>, workflow_id: String) {
        let this = Arc::clone(self);
        let id_for_task = workflow_id.clone();
        let handle = tokio::spawn(async move {
            this.run_monitor(id_for_task).await;
        });
        self.monitors.lock().insert(workflow_id, handle);
    }

    fn cancel_monitor(&self, workflow_id: &str) {
        if let Some(handle) = self.monitors.lock().remove(workflow_id) {
            handle.abort();
        }
    }

    async fn run_monitor(self: Arc<Self>, workflow_id: String) {
        loop {
            let workflow = match self.data_store.get_escalation(&workflow_id).await {
                Ok(Some(w)) => w,
                _ => return,
            };
            if workflow.is_terminal() {
                return;
            }

            let total_ms = (workflow.timeout_at - workflow.created_at).num_milliseconds().max(0) as u64;
            let now = Utc::now();
            let elapsed_ms = (now - workflow.created_at).num_milliseconds().max(0) as u64;

            let halfway_ms = total_ms / 2;
            let late_ms = total_ms * 4 / 5;

            if elapsed_ms < halfway_ms {
                tokio::time::sleep(Duration::from_millis(halfway_ms - elapsed_ms)).await;
                self.send_reminder_if_pending(&workflow_id).await;
                continue;
            }
            if elapsed_ms < late_ms {
                tokio::time::sleep(Duration::from_millis(late_ms - elapsed_ms)).await;
                self.send_reminder_if_pending(&workflow_id).await;
                continue;
            }
            if elapsed_ms < total_ms {
                tokio::time::sleep(Duration::from_millis(total_ms - elapsed_ms)).await;
            }

            if self.fire_timeout(&workflow_id).await {
                continue;
            }
            return;
        }
    }

    async fn send_reminder_if_pending(&self, workflow_id: &str) {
        let workflow = match self.data_store.get_escalation(workflow_id).await {
            Ok(Some(w)) if !w.is_terminal() => w,
            _ => return,
        };
        let remaining = (workflow.timeout_at - Utc::now()).num_seconds().max(0);
        let _ = self.notifier.reminder(&workflow, remaining).await;
    }

    /// Returns `true` if the workflow was auto-escalated and the monitor
    /// should keep running, `false` if it reached `TIMED_OUT` (or raced
    /// with an external resolution and should stop either way).
    async fn fire_timeout(&self, workflow_id: &str) -> bool {
        let mut workflow = match self.data_store.get_escalation(workflow_id).await {
            Ok(Some(w)) => w,
            _ => return false,
        };
        if workflow.is_terminal() {
            return false;
        }

        if workflow.escalation_level < self.config.max_escalation_level {
            workflow.escalation_level += 1;
            workflow.timeout_at = Utc::now() + chrono::Duration::seconds(self.config.escalation_timeout_seconds as i64);
            workflow.status = EscalationStatus::Notified;
            if self.data_store.put_escalation(workflow.clone()).await.is_err() {
                return false;
            }
            info!(workflow_id, level = workflow.escalation_level, "auto-escalated after timeout");
            let _ = self
                .audit_log
                .log(
                    "escalation.auto_escalated",
                    workflow_id,
                    ActorType::System,
                    "escalation_workflow",
                    workflow_id,
                    serde_json::json!({"escalation_level": workflow.escalation_level}),
                    None,
                )
                .await;
            let _ = self.notifier.notify(&workflow).await;
            true
        } else {
            workflow.status = EscalationStatus::TimedOut;
            workflow.resolved_at = Some(Utc::now());
            workflow.resolution_notes = "Automatically timed out after maximum escalation level".to_string();
            let _ = self.data_store.put_escalation(workflow.clone()).await;
            let _ = self
                .audit_log
                .log(
                    "escalation.timeout",
                    workflow_id,
                    ActorType::System,
                    "escalation_workflow",
                    workflow_id,
                    serde_json::json!({"escalation_level": workflow.escalation_level}),
                    None,
                )
                .await;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use supervision_common::adapters::{InMemoryDataStore, InMemoryNotifier};

    fn orchestrator() -> Arc<EscalationOrchestrator> {
        orchestrator_with_audit_log().0
    }

    fn orchestrator_with_audit_log() -> (Arc<EscalationOrchestrator>, Arc<AuditLog>) {
        let data_store = Arc::new(InMemoryDataStore::new());
        let audit_log = Arc::new(AuditLog::new(data_store.clone(), None, false));
        let orchestrator = EscalationOrchestrator::new(
            data_store,
            Arc::new(InMemoryNotifier::new()),
            audit_log.clone(),
            EscalationOrchestratorConfig {
                escalation_timeout_seconds: 300,
                escalation_retry_count: 3,
                escalation_retry_delay_seconds: 2,
                max_escalation_level: 3,
                require_mfa_for_approval: false,
            },
        );
        (orchestrator, audit_log)
    }

    #[tokio::test]
    async fn create_then_resolve_transitions_to_terminal() {
        let orchestrator = orchestrator();
        let workflow = orchestrator
            .create_escalation("d1", "risk", HashMap::new(), vec!["alice".to_string()])
            .await
            .unwrap();

        let resolved = orchestrator
            .resolve(&workflow.workflow_id, true, "alice", "looks fine", None)
            .await
            .unwrap();
        assert_eq!(resolved.status, EscalationStatus::Approved);
        assert!(resolved.is_terminal());
    }

    #[tokio::test]
    async fn create_and_resolve_each_append_an_audit_entry() {
        let (orchestrator, audit_log) = orchestrator_with_audit_log();
        let workflow = orchestrator
            .create_escalation("d1", "risk", HashMap::new(), vec!["alice".to_string()])
            .await
            .unwrap();
        orchestrator
            .resolve(&workflow.workflow_id, true, "alice", "looks fine", None)
            .await
            .unwrap();

        let created = audit_log
            .query(&supervision_models::AuditQueryFilter {
                action: Some("escalation.created".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].resource_id, workflow.workflow_id);

        let resolved = audit_log
            .query(&supervision_models::AuditQueryFilter {
                action: Some("escalation.resolved".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].actor_id, "alice");
    }

    #[tokio::test]
    async fn resolving_twice_is_rejected() {
        let orchestrator = orchestrator();
        let workflow = orchestrator
            .create_escalation("d1", "risk", HashMap::new(), vec!["alice".to_string()])
            .await
            .unwrap();
        orchestrator
            .resolve(&workflow.workflow_id, true, "alice", "ok", None)
            .await
            .unwrap();

        let second = orchestrator.resolve(&workflow.workflow_id, false, "bob", "too late", None).await;
        assert!(matches!(second, Err(SupervisionError::EscalationAlreadyResolved(_))));
    }

    #[tokio::test]
    async fn mfa_required_rejects_empty_token() {
        let data_store = Arc::new(InMemoryDataStore::new());
        let orchestrator = EscalationOrchestrator::new(
            data_store.clone(),
            Arc::new(InMemoryNotifier::new()),
            Arc::new(AuditLog::new(data_store, None, false)),
            EscalationOrchestratorConfig {
                escalation_timeout_seconds: 300,
                escalation_retry_count: 1,
                escalation_retry_delay_seconds: 1,
                max_escalation_level: 3,
                require_mfa_for_approval: true,
            },
        );
        let workflow = orchestrator
            .create_escalation("d1", "risk", HashMap::new(), vec!["alice".to_string()])
            .await
            .unwrap();
        let result = orchestrator.resolve(&workflow.workflow_id, true, "alice", "ok", None).await;
        assert!(matches!(result, Err(SupervisionError::EscalationMfaRequired(_))));
    }
}
