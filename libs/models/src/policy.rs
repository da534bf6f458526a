use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::PolicyVerdict;

/// A single rule within a `PolicyDefinition`. Higher `priority` is evaluated
/// first; ties keep the stable order rules were declared in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    pub rule_id: String,
    pub name: String,
    /// Boolean sub-expression over the request context, see the policy
    /// engine's expression grammar.
    pub condition: String,
    pub action: PolicyVerdict,
    pub priority: i32,
    pub enabled: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A versioned, named collection of rules. Only `active` policies
/// participate in evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDefinition {
    pub policy_id: String,
    pub name: String,
    pub version: u32,
    pub scope: String,
    pub active: bool,
    pub rules: Vec<PolicyRule>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PolicyDefinition {
    pub fn enabled_rules_by_priority(&self) -> Vec<&PolicyRule> {
        let mut rules: Vec<&PolicyRule> = self.rules.iter().filter(|r| r.enabled).collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        rules
    }
}

/// One matched `(policy, rule, action)` triple recorded during evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedRule {
    pub policy_id: String,
    pub policy_name: String,
    pub rule_id: String,
    pub rule_name: String,
    pub action: PolicyVerdict,
}

/// The immutable record of one policy evaluation. Never mutated after
/// creation; referenced by exactly one audit entry (invariant I1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub decision_id: String,
    pub agent_id: String,
    pub request_context: HashMap<String, serde_json::Value>,
    pub verdict: PolicyVerdict,
    pub matched_rules: Vec<MatchedRule>,
    pub explanation: String,
    pub confidence: f64,
    pub evaluation_latency_ms: f64,
    pub timestamp: DateTime<Utc>,
    pub audit_event_id: Option<String>,
}
