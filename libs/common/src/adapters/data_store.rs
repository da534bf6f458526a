//! Durable storage adapter contract and an in-process fallback.
//!
//! The real backing (Postgres, per the original L01 data layer) is out of
//! scope here. `InMemoryDataStore` keeps every entity in a `parking_lot`
//! guarded map so the core engines have somewhere to read and write during
//! `dev_mode` and tests without a database dependency.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use supervision_models::{
    AcknowledgementRecord, AgentContext, Anomaly, AuditEntry, AuditQueryFilter, Constraint,
    ConstraintViolation, EscalationWorkflow, PolicyDefinition,
};

use crate::error::Result;

#[async_trait]
pub trait DataStore: Send + Sync {
    /// Look up agent metadata (team, department, permissions, ...) for
    /// policy evaluation. Implementations that have no record for
    /// `agent_id` return `AgentContext::default_for(agent_id)` rather than
    /// `None`, matching the original L01 bridge's mock-context fallback.
    async fn get_agent_context(&self, agent_id: &str) -> Result<AgentContext>;
    async fn put_agent_context(&self, context: AgentContext) -> Result<()>;

    async fn put_policy(&self, policy: PolicyDefinition) -> Result<()>;
    async fn get_policy(&self, policy_id: &str) -> Result<Option<PolicyDefinition>>;
    async fn list_active_policies(&self, scope: Option<&str>) -> Result<Vec<PolicyDefinition>>;
    async fn delete_policy(&self, policy_id: &str) -> Result<()>;

    async fn put_constraint(&self, constraint: Constraint) -> Result<()>;
    async fn get_constraint(&self, constraint_id: &str) -> Result<Option<Constraint>>;
    async fn list_constraints(
        &self,
        scope: Option<&str>,
        agent_id: Option<&str>,
    ) -> Result<Vec<Constraint>>;
    async fn record_violation(&self, violation: ConstraintViolation) -> Result<()>;
    async fn list_violations(&self, agent_id: Option<&str>) -> Result<Vec<ConstraintViolation>>;

    async fn put_escalation(&self, workflow: EscalationWorkflow) -> Result<()>;
    async fn get_escalation(&self, workflow_id: &str) -> Result<Option<EscalationWorkflow>>;
    async fn list_pending_escalations(&self) -> Result<Vec<EscalationWorkflow>>;

    async fn put_anomaly(&self, anomaly: Anomaly) -> Result<()>;
    async fn get_anomaly(&self, anomaly_id: &str) -> Result<Option<Anomaly>>;
    async fn list_anomalies(&self, agent_id: Option<&str>) -> Result<Vec<Anomaly>>;
    async fn record_acknowledgement(&self, record: AcknowledgementRecord) -> Result<()>;
    async fn latest_acknowledgement(
        &self,
        anomaly_id: &str,
    ) -> Result<Option<AcknowledgementRecord>>;

    async fn append_audit(&self, entry: AuditEntry) -> Result<()>;
    async fn get_audit(&self, audit_id: &str) -> Result<Option<AuditEntry>>;
    async fn query_audit(&self, filter: &AuditQueryFilter) -> Result<Vec<AuditEntry>>;

    /// Full-range scan used by `AuditLog::verify_chain` to reach entries
    /// that have aged out of the in-memory verification window.
    async fn query_audit_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AuditEntry>>;
}

#[derive(Default)]
struct Tables {
    agent_contexts: HashMap<String, AgentContext>,
    policies: HashMap<String, PolicyDefinition>,
    constraints: HashMap<String, Constraint>,
    violations: Vec<ConstraintViolation>,
    escalations: HashMap<String, EscalationWorkflow>,
    anomalies: HashMap<String, Anomaly>,
    acknowledgements: HashMap<String, Vec<AcknowledgementRecord>>,
    audit: Vec<AuditEntry>,
}

#[derive(Default)]
pub struct InMemoryDataStore {
    tables: Mutex<Tables>,
}

impl InMemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataStore for InMemoryDataStore {
    async fn get_agent_context(&self, agent_id: &str) -> Result<AgentContext> {
        Ok(self
            .tables
            .lock()
            .agent_contexts
            .get(agent_id)
            .cloned()
            .unwrap_or_else(|| AgentContext::default_for(agent_id)))
    }

    async fn put_agent_context(&self, context: AgentContext) -> Result<()> {
        self.tables.lock().agent_contexts.insert(context.agent_id.clone(), context);
        Ok(())
    }

    async fn put_policy(&self, policy: PolicyDefinition) -> Result<()> {
        self.tables.lock().policies.insert(policy.policy_id.clone(), policy);
        Ok(())
    }

    async fn get_policy(&self, policy_id: &str) -> Result<Option<PolicyDefinition>> {
        Ok(self.tables.lock().policies.get(policy_id).cloned())
    }

    async fn list_active_policies(&self, scope: Option<&str>) -> Result<Vec<PolicyDefinition>> {
        Ok(self
            .tables
            .lock()
            .policies
            .values()
            .filter(|p| p.active)
            .filter(|p| scope.map(|s| p.scope == s).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn delete_policy(&self, policy_id: &str) -> Result<()> {
        self.tables.lock().policies.remove(policy_id);
        Ok(())
    }

    async fn put_constraint(&self, constraint: Constraint) -> Result<()> {
        self.tables
            .lock()
            .constraints
            .insert(constraint.constraint_id.clone(), constraint);
        Ok(())
    }

    async fn get_constraint(&self, constraint_id: &str) -> Result<Option<Constraint>> {
        Ok(self.tables.lock().constraints.get(constraint_id).cloned())
    }

    async fn list_constraints(
        &self,
        scope: Option<&str>,
        agent_id: Option<&str>,
    ) -> Result<Vec<Constraint>> {
        Ok(self
            .tables
            .lock()
            .constraints
            .values()
            .filter(|c| c.enabled)
            .filter(|c| scope.map(|s| c.scope == s).unwrap_or(true))
            .filter(|c| {
                agent_id
                    .map(|a| c.agent_id.as_deref() == Some(a) || c.agent_id.is_none())
                    .unwrap_or(true)
            })
            .cloned()
            .collect())
    }

    async fn record_violation(&self, violation: ConstraintViolation) -> Result<()> {
        self.tables.lock().violations.push(violation);
        Ok(())
    }

    async fn list_violations(&self, agent_id: Option<&str>) -> Result<Vec<ConstraintViolation>> {
        Ok(self
            .tables
            .lock()
            .violations
            .iter()
            .filter(|v| agent_id.map(|a| v.agent_id == a).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn put_escalation(&self, workflow: EscalationWorkflow) -> Result<()> {
        self.tables
            .lock()
            .escalations
            .insert(workflow.workflow_id.clone(), workflow);
        Ok(())
    }

    async fn get_escalation(&self, workflow_id: &str) -> Result<Option<EscalationWorkflow>> {
        Ok(self.tables.lock().escalations.get(workflow_id).cloned())
    }

    async fn list_pending_escalations(&self) -> Result<Vec<EscalationWorkflow>> {
        Ok(self
            .tables
            .lock()
            .escalations
            .values()
            .filter(|w| !w.is_terminal())
            .cloned()
            .collect())
    }

    async fn put_anomaly(&self, anomaly: Anomaly) -> Result<()> {
        self.tables.lock().anomalies.insert(anomaly.anomaly_id.clone(), anomaly);
        Ok(())
    }

    async fn get_anomaly(&self, anomaly_id: &str) -> Result<Option<Anomaly>> {
        Ok(self.tables.lock().anomalies.get(anomaly_id).cloned())
    }

    async fn list_anomalies(&self, agent_id: Option<&str>) -> Result<Vec<Anomaly>> {
        Ok(self
            .tables
            .lock()
            .anomalies
            .values()
            .filter(|a| agent_id.map(|id| a.agent_id == id).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn record_acknowledgement(&self, record: AcknowledgementRecord) -> Result<()> {
        self.tables
            .lock()
            .acknowledgements
            .entry(record.anomaly_id.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn latest_acknowledgement(
        &self,
        anomaly_id: &str,
    ) -> Result<Option<AcknowledgementRecord>> {
        Ok(self
            .tables
            .lock()
            .acknowledgements
            .get(anomaly_id)
            .and_then(|records| records.last().cloned()))
    }

    async fn append_audit(&self, entry: AuditEntry) -> Result<()> {
        self.tables.lock().audit.push(entry);
        Ok(())
    }

    async fn get_audit(&self, audit_id: &str) -> Result<Option<AuditEntry>> {
        Ok(self
            .tables
            .lock()
            .audit
            .iter()
            .find(|e| e.audit_id == audit_id)
            .cloned())
    }

    async fn query_audit(&self, filter: &AuditQueryFilter) -> Result<Vec<AuditEntry>> {
        Ok(self
            .tables
            .lock()
            .audit
            .iter()
            .filter(|e| {
                filter.actor_id.as_deref().map(|v| e.actor_id == v).unwrap_or(true)
                    && filter.action.as_deref().map(|v| e.action == v).unwrap_or(true)
                    && filter
                        .resource_type
                        .as_deref()
                        .map(|v| e.resource_type == v)
                        .unwrap_or(true)
                    && filter
                        .resource_id
                        .as_deref()
                        .map(|v| e.resource_id == v)
                        .unwrap_or(true)
                    && filter.start.map(|s| e.timestamp >= s).unwrap_or(true)
                    && filter.end.map(|e2| e.timestamp <= e2).unwrap_or(true)
            })
            .cloned()
            .collect())
    }

    async fn query_audit_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AuditEntry>> {
        let mut entries: Vec<AuditEntry> = self
            .tables
            .lock()
            .audit
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }
}

#[async_trait]
impl super::Adapter for InMemoryDataStore {
    fn adapter_name(&self) -> &'static str {
        "in_memory_data_store"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use supervision_models::{ActorType, PolicyVerdict};

    fn sample_policy() -> PolicyDefinition {
        PolicyDefinition {
            policy_id: "p1".to_string(),
            name: "default".to_string(),
            version: 1,
            scope: "global".to_string(),
            active: true,
            rules: vec![],
            metadata: Default::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn unknown_agent_gets_default_context() {
        let store = InMemoryDataStore::new();
        let ctx = store.get_agent_context("agent-1").await.unwrap();
        assert_eq!(ctx.team, "default");
        assert_eq!(ctx.department, "engineering");
    }

    #[tokio::test]
    async fn registered_agent_context_round_trips() {
        let store = InMemoryDataStore::new();
        let mut ctx = AgentContext::default_for("agent-1");
        ctx.team = "payments".to_string();
        ctx.permissions.push("policy:read".to_string());
        store.put_agent_context(ctx).await.unwrap();

        let fetched = store.get_agent_context("agent-1").await.unwrap();
        assert_eq!(fetched.team, "payments");
        assert_eq!(fetched.permissions, vec!["policy:read".to_string()]);
    }

    #[tokio::test]
    async fn put_then_get_policy_round_trips() {
        let store = InMemoryDataStore::new();
        store.put_policy(sample_policy()).await.unwrap();
        let fetched = store.get_policy("p1").await.unwrap();
        assert_eq!(fetched.unwrap().name, "default");
    }

    #[tokio::test]
    async fn list_active_policies_filters_inactive() {
        let store = InMemoryDataStore::new();
        let mut inactive = sample_policy();
        inactive.policy_id = "p2".to_string();
        inactive.active = false;
        store.put_policy(sample_policy()).await.unwrap();
        store.put_policy(inactive).await.unwrap();
        let active = store.list_active_policies(None).await.unwrap();
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn acknowledgement_history_is_append_only() {
        let store = InMemoryDataStore::new();
        store
            .record_acknowledgement(AcknowledgementRecord {
                anomaly_id: "a1".to_string(),
                acknowledged_by: "alice".to_string(),
                acknowledged_at: Utc::now(),
                note: None,
            })
            .await
            .unwrap();
        store
            .record_acknowledgement(AcknowledgementRecord {
                anomaly_id: "a1".to_string(),
                acknowledged_by: "bob".to_string(),
                acknowledged_at: Utc::now(),
                note: Some("re-reviewed".to_string()),
            })
            .await
            .unwrap();

        let latest = store.latest_acknowledgement("a1").await.unwrap().unwrap();
        assert_eq!(latest.acknowledged_by, "bob");
    }

    #[tokio::test]
    async fn audit_entry_round_trips() {
        let store = InMemoryDataStore::new();
        let entry = AuditEntry {
            audit_id: "e1".to_string(),
            action: "policy.evaluate".to_string(),
            actor_id: "agent-1".to_string(),
            actor_type: ActorType::Agent,
            resource_type: "policy".to_string(),
            resource_id: "p1".to_string(),
            details: serde_json::json!({"verdict": PolicyVerdict::Allow.to_string()}),
            parent_audit_id: None,
            timestamp: Utc::now(),
            integrity_hash: "h1".to_string(),
            signature: None,
            signature_algorithm: None,
        };
        store.append_audit(entry).await.unwrap();
        assert!(store.get_audit("e1").await.unwrap().is_some());
    }
}
