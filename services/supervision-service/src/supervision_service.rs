//! Composition root: wires the nine engine components into one façade,
//! the single entry point `main.rs` and the handlers construct against.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::instrument;

use supervision_common::adapters::{Adapter, CounterStore, DataStore, NotifierAdapter, SigningAdapter};
use supervision_common::error::Result;
use supervision_models::{
    AuditQueryFilter, ActorType, ComplianceStatus, EscalationWorkflow, PolicyDecision, PolicyVerdict,
    SupervisionConfiguration,
};

use crate::engine::compliance_monitor::EscalationOutcome;
use crate::engine::{
    AccessControl, AnomalyDetector, AnomalyDetectorConfig, AuditLog, ChainVerification, CheckOutcome,
    ComplianceMonitor, ConstraintEnforcer, DecisionExplainer, EscalationOrchestrator, EscalationOrchestratorConfig,
    PolicyEngine,
};

pub struct SupervisionService {
    pub policy_engine: PolicyEngine,
    pub constraint_enforcer: ConstraintEnforcer,
    pub anomaly_detector: AnomalyDetector,
    pub escalation_orchestrator: Arc<EscalationOrchestrator>,
    pub audit_log: Arc<AuditLog>,
    pub compliance_monitor: ComplianceMonitor,
    pub access_control: AccessControl,
    pub decision_explainer: DecisionExplainer,
    health_adapters: Vec<Arc<dyn Adapter>>,
}

impl SupervisionService {
    /// `health_adapters` are `Arc` clones of the same concrete objects
    /// passed in as `data_store`/`counter_store`/`signer`/`notifier`,
    /// coerced to `dyn Adapter` so `health_check` can fan out to whichever
    /// implementation the caller actually wired in.
    pub fn new(
        config: &SupervisionConfiguration,
        data_store: Arc<dyn DataStore>,
        counter_store: Arc<dyn CounterStore>,
        signer: Option<Arc<dyn SigningAdapter>>,
        notifier: Arc<dyn NotifierAdapter>,
        health_adapters: Vec<Arc<dyn Adapter>>,
    ) -> Self {
        let audit_log = Arc::new(AuditLog::new(data_store.clone(), signer, config.audit_signing_enabled));

        let escalation_orchestrator = EscalationOrchestrator::new(
            data_store.clone(),
            notifier,
            audit_log.clone(),
            EscalationOrchestratorConfig {
                escalation_timeout_seconds: config.escalation_timeout_seconds,
                escalation_retry_count: config.escalation_retry_count,
                escalation_retry_delay_seconds: config.escalation_retry_delay_seconds,
                max_escalation_level: config.max_escalation_level,
                require_mfa_for_approval: config.require_mfa_for_approval,
            },
        );

        Self {
            policy_engine: PolicyEngine::new(
                data_store.clone(),
                config.policy_cache_max_size,
                config.policy_cache_ttl_seconds,
                config.deny_wins_rule,
            ),
            constraint_enforcer: ConstraintEnforcer::new(
                data_store.clone(),
                counter_store,
                config.allow_on_consensus_fail,
            ),
            anomaly_detector: AnomalyDetector::new(
                data_store,
                AnomalyDetectorConfig {
                    baseline_sample_size: config.baseline_sample_size,
                    min_baseline_samples: config.min_baseline_samples,
                    z_score_threshold: config.z_score_threshold,
                    iqr_multiplier: config.iqr_multiplier,
                },
            ),
            escalation_orchestrator,
            audit_log,
            compliance_monitor: ComplianceMonitor::new(),
            access_control: AccessControl::new(config.require_mfa_for_admin),
            decision_explainer: DecisionExplainer::new(),
            health_adapters,
        }
    }

    /// Evaluate a policy decision for `agent_id` and record it to both the
    /// audit log and the compliance monitor. On `ESCALATE`, opens an
    /// escalation workflow and stitches its id back into the decision's
    /// request context under `"escalation"`.
    #[instrument(skip(self, request_context), fields(agent_id = %agent_id))]
    pub async fn evaluate_request(&self, agent_id: &str, request_context: Value) -> Result<PolicyDecision> {
        let mut decision = self.policy_engine.evaluate(agent_id, &request_context).await?;
        self.compliance_monitor.record_policy_evaluation(agent_id, decision.verdict);

        let entry = self
            .audit_log
            .log(
                "policy.evaluate",
                agent_id,
                ActorType::Agent,
                "policy_decision",
                &decision.decision_id,
                serde_json::json!({"verdict": decision.verdict.to_string(), "confidence": decision.confidence}),
                None,
            )
            .await?;
        decision.audit_event_id = Some(entry.audit_id);

        if decision.verdict == PolicyVerdict::Escalate {
            let approvers = vec!["on-call".to_string()];
            let mut context = HashMap::new();
            context.insert("agent_id".to_string(), serde_json::json!(agent_id));
            let workflow = self
                .escalation_orchestrator
                .create_escalation(&decision.decision_id, "policy evaluation escalated", context, approvers)
                .await?;
            self.compliance_monitor.record_escalation(agent_id, EscalationOutcome::Pending);
            decision
                .request_context
                .insert("escalation".to_string(), serde_json::json!({
                    "workflow_id": workflow.workflow_id,
                    "status": workflow.status.to_string(),
                }));
        }

        Ok(decision)
    }

    #[instrument(skip(self), fields(agent_id = %agent_id, constraint_id = %constraint_id))]
    pub async fn check_rate_limit(
        &self,
        agent_id: &str,
        constraint_id: &str,
        current_usage: Option<f64>,
        requested: f64,
    ) -> Result<CheckOutcome> {
        let outcome = self.constraint_enforcer.check(agent_id, constraint_id, current_usage, requested).await?;
        self.compliance_monitor.record_constraint_check(agent_id, outcome.allowed);
        if !outcome.allowed {
            self.audit_log
                .log(
                    "constraint.deny",
                    agent_id,
                    ActorType::Agent,
                    "constraint",
                    constraint_id,
                    serde_json::json!({"requested": requested}),
                    None,
                )
                .await?;
        }
        Ok(outcome)
    }

    pub async fn record_metric(&self, agent_id: &str, metric_name: &str, value: f64) -> Result<Vec<supervision_models::Anomaly>> {
        let anomalies = self.anomaly_detector.detect(agent_id, metric_name, value).await?;
        for anomaly in &anomalies {
            self.compliance_monitor.record_anomaly(agent_id, anomaly.severity == supervision_models::AnomalySeverity::Critical);
        }
        Ok(anomalies)
    }

    pub fn set_baseline(&self, agent_id: &str, metric_name: &str, values: Vec<f64>) -> Result<()> {
        self.anomaly_detector.set_baseline(agent_id, metric_name, values)
    }

    pub async fn create_escalation(
        &self,
        decision_id: &str,
        reason: &str,
        context: HashMap<String, Value>,
        approvers: Vec<String>,
    ) -> Result<EscalationWorkflow> {
        self.escalation_orchestrator.create_escalation(decision_id, reason, context, approvers).await
    }

    pub async fn resolve_escalation(
        &self,
        workflow_id: &str,
        approved: bool,
        approver_id: &str,
        notes: &str,
        mfa_token: Option<&str>,
    ) -> Result<EscalationWorkflow> {
        let resolved = self.escalation_orchestrator.resolve(workflow_id, approved, approver_id, notes, mfa_token).await?;
        let outcome = if approved { EscalationOutcome::Approved } else { EscalationOutcome::Rejected };
        // Credit the agent whose request was escalated, not the approver who
        // resolved it; falls back to approver_id for workflows opened directly
        // via `create_escalation` with no originating agent in context.
        let entity_id = resolved.context.get("agent_id").and_then(|v| v.as_str()).unwrap_or(approver_id);
        self.compliance_monitor.record_escalation(entity_id, outcome);
        Ok(resolved)
    }

    pub async fn get_pending_escalations(&self) -> Result<Vec<EscalationWorkflow>> {
        self.escalation_orchestrator.list_pending().await
    }

    pub async fn get_usage(&self, agent_id: &str, constraint_id: &str) -> Result<f64> {
        self.constraint_enforcer.get_usage(agent_id, constraint_id).await
    }

    pub async fn reset_limit(&self, agent_id: &str, constraint_id: &str) -> Result<()> {
        self.constraint_enforcer.reset_limit(agent_id, constraint_id).await
    }

    pub async fn query_audit_log(&self, filter: &AuditQueryFilter) -> Result<Vec<supervision_models::AuditEntry>> {
        self.audit_log.query(filter).await
    }

    pub async fn verify_audit_chain(&self) -> Result<ChainVerification> {
        self.audit_log.verify_chain(None, None).await
    }

    pub fn get_compliance_status(&self, entity_id: &str) -> ComplianceStatus {
        self.compliance_monitor.get_status(entity_id)
    }

    /// Fans out to every wired adapter's own `health_check` and aggregates
    /// the result for the `/ready` surface (SPEC_FULL.md §4.7). `"healthy"`
    /// only if every adapter reports reachable; `"degraded"` otherwise.
    pub async fn health_check(&self) -> &'static str {
        for adapter in &self.health_adapters {
            match adapter.health_check().await {
                Ok(true) => continue,
                _ => return "degraded",
            }
        }
        "healthy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use supervision_common::adapters::{HmacSigningAdapter, InMemoryCounterStore, InMemoryDataStore, InMemoryNotifier};

    fn service() -> SupervisionService {
        service_with_store().0
    }

    fn service_with_store() -> (SupervisionService, Arc<InMemoryDataStore>) {
        let config = SupervisionConfiguration::default();
        let data_store = Arc::new(InMemoryDataStore::new());
        let counter_store = Arc::new(InMemoryCounterStore::new());
        let signer = Arc::new(HmacSigningAdapter::new(&config.audit_signing_key_id, b"test-key".to_vec()));
        let notifier = Arc::new(InMemoryNotifier::new());
        let health_adapters: Vec<Arc<dyn Adapter>> =
            vec![data_store.clone(), counter_store.clone(), signer.clone(), notifier.clone()];
        let service = SupervisionService::new(
            &config,
            data_store.clone(),
            counter_store,
            Some(signer),
            notifier,
            health_adapters,
        );
        (service, data_store)
    }

    #[tokio::test]
    async fn default_allow_decision_is_recorded_to_audit_log() {
        let service = service();
        let decision = service.evaluate_request("agent-1", serde_json::json!({"operation": "read"})).await.unwrap();
        assert_eq!(decision.verdict, PolicyVerdict::Allow);
        assert!(decision.audit_event_id.is_some());

        let status = service.get_compliance_status("agent-1");
        assert_eq!(status.policy_evaluations, 1);
    }

    #[tokio::test]
    async fn escalation_resolution_credits_the_originating_agent_not_the_approver() {
        let (service, data_store) = service_with_store();
        let policy = supervision_models::PolicyDefinition {
            policy_id: "p1".to_string(),
            name: "default".to_string(),
            version: 1,
            scope: "global".to_string(),
            active: true,
            rules: vec![supervision_models::PolicyRule {
                rule_id: "r1".to_string(),
                name: "r1".to_string(),
                condition: "true".to_string(),
                action: PolicyVerdict::Escalate,
                priority: 10,
                enabled: true,
                tags: vec![],
            }],
            metadata: Default::default(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        data_store.put_policy(policy).await.unwrap();

        let decision = service.evaluate_request("agent-1", serde_json::json!({})).await.unwrap();
        assert_eq!(decision.verdict, PolicyVerdict::Escalate);
        assert_eq!(service.get_compliance_status("agent-1").pending_escalations, 1);

        let escalation = decision.request_context.get("escalation").unwrap();
        let workflow_id = escalation.get("workflow_id").unwrap().as_str().unwrap();
        service.resolve_escalation(workflow_id, true, "approver-1", "looks fine", None).await.unwrap();

        assert_eq!(service.get_compliance_status("agent-1").pending_escalations, 0);
        assert_eq!(service.get_compliance_status("agent-1").approved_escalations, 1);
        let approver_status = service.get_compliance_status("approver-1");
        assert_eq!(approver_status.approved_escalations, 0);
        assert_eq!(approver_status.pending_escalations, 0);
    }

    #[derive(Debug, Clone, serde::Serialize, fake::Dummy)]
    struct FakeRequestContext {
        operation: String,
        resource: String,
        amount: f64,
    }

    #[tokio::test]
    async fn evaluate_request_accepts_a_realistic_fake_context() {
        use fake::{Fake, Faker};
        let service = service();
        let fixture: FakeRequestContext = Faker.fake();
        let context = serde_json::to_value(&fixture).unwrap();
        let decision = service.evaluate_request("agent-1", context).await.unwrap();
        assert_eq!(decision.verdict, PolicyVerdict::Allow);
    }

    #[tokio::test]
    async fn health_check_aggregates_wired_adapters() {
        let service = service();
        assert_eq!(service.health_check().await, "healthy");
    }

    #[tokio::test]
    async fn clean_log_verifies() {
        let service = service();
        service.evaluate_request("agent-1", serde_json::json!({})).await.unwrap();
        service.evaluate_request("agent-1", serde_json::json!({})).await.unwrap();
        let verification = service.verify_audit_chain().await.unwrap();
        assert!(verification.valid);
        assert_eq!(verification.entries_verified, 2);
    }
}
