//! Turns a request context into a `PolicyDecision`: compiles and caches
//! rule conditions, evaluates the active policy set, and applies deny-wins
//! conflict resolution.

use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use tracing::{instrument, warn};

use supervision_common::adapters::DataStore;
use supervision_common::error::Result;
use supervision_models::{MatchedRule, PolicyDecision, PolicyDefinition, PolicyVerdict};

use super::expression::{self, Node};

struct ActiveSetSnapshot {
    policies: Arc<Vec<PolicyDefinition>>,
    fetched_at: Instant,
}

/// Compiles and evaluates policy conditions against a shared, TTL-refreshed
/// snapshot of the active policy set. Safe to share across evaluation tasks:
/// reads against the snapshot never block on a refresh in progress.
pub struct PolicyEngine {
    data_store: Arc<dyn DataStore>,
    condition_cache: Mutex<LruCache<String, Arc<Node>>>,
    active_set: RwLock<Option<ActiveSetSnapshot>>,
    cache_ttl: Duration,
}

impl PolicyEngine {
    /// `deny_wins_rule` is accepted for parity with configuration but is
    /// advisory only: conflict resolution always applies deny-wins
    /// semantics regardless of its value (see SPEC_FULL.md §9).
    pub fn new(data_store: Arc<dyn DataStore>, cache_max_size: usize, cache_ttl_seconds: u64, deny_wins_rule: bool) -> Self {
        if !deny_wins_rule {
            warn!("deny_wins_rule=false is advisory only; deny-wins conflict resolution is always applied");
        }
        let capacity = NonZeroUsize::new(cache_max_size.max(1)).expect("capacity is at least 1");
        Self {
            data_store,
            condition_cache: Mutex::new(LruCache::new(capacity)),
            active_set: RwLock::new(None),
            cache_ttl: Duration::from_secs(cache_ttl_seconds),
        }
    }

    /// Validate a rule's condition at registration time. A compile error
    /// here prevents the policy version from being registered at all.
    pub fn validate_condition(&self, source: &str) -> Result<()> {
        self.compile_cached(source).map(|_| ())
    }

    fn compile_cached(&self, source: &str) -> Result<Arc<Node>> {
        let mut cache = self.condition_cache.lock();
        if let Some(node) = cache.get(source) {
            return Ok(node.clone());
        }
        let node = Arc::new(expression::compile(source)?);
        cache.put(source.to_string(), node.clone());
        Ok(node)
    }

    async fn active_policies(&self) -> Result<Arc<Vec<PolicyDefinition>>> {
        if let Some(snapshot) = self.active_set.read().as_ref() {
            if snapshot.fetched_at.elapsed() < self.cache_ttl {
                return Ok(snapshot.policies.clone());
            }
        }
        let policies = Arc::new(self.data_store.list_active_policies(None).await?);
        *self.active_set.write() = Some(ActiveSetSnapshot {
            policies: policies.clone(),
            fetched_at: Instant::now(),
        });
        Ok(policies)
    }

    /// Force the active-set snapshot to refresh on the next evaluation,
    /// e.g. immediately after a policy deploy or rollback.
    pub fn invalidate_active_set(&self) {
        *self.active_set.write() = None;
    }

    #[instrument(skip(self, request_context), fields(agent_id = %agent_id))]
    pub async fn evaluate(&self, agent_id: &str, request_context: &Value) -> Result<PolicyDecision> {
        let started = Instant::now();
        let policies = self.active_policies().await?;
        let agent_context = self.data_store.get_agent_context(agent_id).await?;

        let mut ctx_map = serde_json::Map::new();
        ctx_map.insert("agent".to_string(), agent_context.to_value());
        if let Value::Object(fields) = request_context {
            for (k, v) in fields {
                ctx_map.insert(k.clone(), v.clone());
            }
        }
        let ctx = Value::Object(ctx_map);

        let mut matched = Vec::new();
        for policy in policies.iter() {
            for rule in policy.enabled_rules_by_priority() {
                let node = match self.compile_cached(&rule.condition) {
                    Ok(node) => node,
                    Err(e) => {
                        warn!(policy_id = %policy.policy_id, rule_id = %rule.rule_id, error = %e, "rule condition failed to compile; treated as non-matching");
                        continue;
                    }
                };
                let is_match = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    expression::evaluate(&node, &ctx)
                }))
                .unwrap_or_else(|_| {
                    warn!(policy_id = %policy.policy_id, rule_id = %rule.rule_id, "rule evaluation panicked; treated as non-matching");
                    false
                });
                if is_match {
                    matched.push(MatchedRule {
                        policy_id: policy.policy_id.clone(),
                        policy_name: policy.name.clone(),
                        rule_id: rule.rule_id.clone(),
                        rule_name: rule.name.clone(),
                        action: rule.action,
                    });
                }
            }
        }

        let verdict = self.resolve_verdict(&matched);
        let confidence = if matched.is_empty() { 0.5 } else { 1.0 };
        let explanation = explain(&matched, verdict);
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        Ok(PolicyDecision {
            decision_id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            request_context: to_map(request_context),
            verdict,
            matched_rules: matched,
            explanation,
            confidence,
            evaluation_latency_ms: latency_ms,
            timestamp: chrono::Utc::now(),
            audit_event_id: None,
        })
    }

    fn resolve_verdict(&self, matched: &[MatchedRule]) -> PolicyVerdict {
        if matched.is_empty() {
            return PolicyVerdict::Allow;
        }
        if matched.iter().any(|m| m.action == PolicyVerdict::Deny) {
            PolicyVerdict::Deny
        } else if matched.iter().any(|m| m.action == PolicyVerdict::Escalate) {
            PolicyVerdict::Escalate
        } else {
            PolicyVerdict::Allow
        }
    }
}

fn to_map(value: &Value) -> HashMap<String, Value> {
    match value {
        Value::Object(map) => map.clone().into_iter().collect(),
        _ => HashMap::new(),
    }
}

fn explain(matched: &[MatchedRule], verdict: PolicyVerdict) -> String {
    if matched.is_empty() {
        return "no policy rule matched; default-allow".to_string();
    }
    let rule_summary = matched
        .iter()
        .map(|m| format!("{}:{} -> {}", m.policy_name, m.rule_name, m.action))
        .collect::<Vec<_>>()
        .join(", ");
    format!("verdict {verdict} from rules [{rule_summary}]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use supervision_common::adapters::InMemoryDataStore;
    use supervision_models::{PolicyRule, PolicyVerdict};

    fn engine() -> (PolicyEngine, Arc<InMemoryDataStore>) {
        engine_with_deny_wins_rule(true)
    }

    fn engine_with_deny_wins_rule(deny_wins_rule: bool) -> (PolicyEngine, Arc<InMemoryDataStore>) {
        let store = Arc::new(InMemoryDataStore::new());
        (PolicyEngine::new(store.clone(), 1000, 300, deny_wins_rule), store)
    }

    fn rule(id: &str, condition: &str, action: PolicyVerdict, priority: i32) -> PolicyRule {
        PolicyRule {
            rule_id: id.to_string(),
            name: id.to_string(),
            condition: condition.to_string(),
            action,
            priority,
            enabled: true,
            tags: vec![],
        }
    }

    #[tokio::test]
    async fn deny_wins_over_allow_and_escalate() {
        let (engine, store) = engine();
        let policy = PolicyDefinition {
            policy_id: "p1".to_string(),
            name: "default".to_string(),
            version: 1,
            scope: "global".to_string(),
            active: true,
            rules: vec![
                rule("r1", "true", PolicyVerdict::Allow, 10),
                rule("r2", "true", PolicyVerdict::Escalate, 20),
                rule("r3", "true", PolicyVerdict::Deny, 5),
            ],
            metadata: Default::default(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        store.put_policy(policy).await.unwrap();

        let decision = engine.evaluate("agent-1", &serde_json::json!({})).await.unwrap();
        assert_eq!(decision.verdict, PolicyVerdict::Deny);
        assert_eq!(decision.confidence, 1.0);
    }

    #[tokio::test]
    async fn deny_wins_applies_even_when_rule_flag_is_false() {
        // deny_wins_rule is advisory only; a configured `false` must not
        // change conflict resolution (see SPEC_FULL.md §9).
        let (engine, store) = engine_with_deny_wins_rule(false);
        let policy = PolicyDefinition {
            policy_id: "p1".to_string(),
            name: "default".to_string(),
            version: 1,
            scope: "global".to_string(),
            active: true,
            rules: vec![
                rule("r1", "true", PolicyVerdict::Allow, 10),
                rule("r2", "true", PolicyVerdict::Deny, 20),
            ],
            metadata: Default::default(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        store.put_policy(policy).await.unwrap();

        let decision = engine.evaluate("agent-1", &serde_json::json!({})).await.unwrap();
        assert_eq!(decision.verdict, PolicyVerdict::Deny);
    }

    #[tokio::test]
    async fn no_match_defaults_to_allow_with_half_confidence() {
        let (engine, store) = engine();
        let policy = PolicyDefinition {
            policy_id: "p1".to_string(),
            name: "default".to_string(),
            version: 1,
            scope: "global".to_string(),
            active: true,
            rules: vec![rule("r1", "false", PolicyVerdict::Deny, 10)],
            metadata: Default::default(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        store.put_policy(policy).await.unwrap();

        let decision = engine.evaluate("agent-1", &serde_json::json!({})).await.unwrap();
        assert_eq!(decision.verdict, PolicyVerdict::Allow);
        assert_eq!(decision.confidence, 0.5);
    }

    #[tokio::test]
    async fn invalid_condition_is_rejected_at_validation() {
        let (engine, _store) = engine();
        assert!(engine.validate_condition("agent.tier ===").is_err());
    }

    #[tokio::test]
    async fn evaluation_sees_registered_agent_context() {
        let (engine, store) = engine();
        let policy = PolicyDefinition {
            policy_id: "p1".to_string(),
            name: "default".to_string(),
            version: 1,
            scope: "global".to_string(),
            active: true,
            rules: vec![rule("r1", "agent.team == \"payments\"", PolicyVerdict::Escalate, 10)],
            metadata: Default::default(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        store.put_policy(policy).await.unwrap();

        let mut ctx = supervision_models::AgentContext::default_for("agent-1");
        ctx.team = "payments".to_string();
        store.put_agent_context(ctx).await.unwrap();

        let decision = engine.evaluate("agent-1", &serde_json::json!({})).await.unwrap();
        assert_eq!(decision.verdict, PolicyVerdict::Escalate);
    }

    /// Over any randomly generated set of matched rule actions, a single
    /// `DENY` always wins; absent a `DENY`, a single `ESCALATE` wins;
    /// absent both, the verdict is `ALLOW` (SPEC_FULL.md §9).
    #[quickcheck_macros::quickcheck]
    fn deny_wins_over_any_matched_rule_set(action_codes: Vec<u8>) -> bool {
        let (engine, _store) = engine();
        let matched: Vec<MatchedRule> = action_codes
            .iter()
            .enumerate()
            .map(|(i, code)| MatchedRule {
                policy_id: "p1".to_string(),
                policy_name: "p1".to_string(),
                rule_id: i.to_string(),
                rule_name: i.to_string(),
                action: match code % 3 {
                    0 => PolicyVerdict::Allow,
                    1 => PolicyVerdict::Deny,
                    _ => PolicyVerdict::Escalate,
                },
            })
            .collect();

        let verdict = engine.resolve_verdict(&matched);
        let has_deny = matched.iter().any(|m| m.action == PolicyVerdict::Deny);
        let has_escalate = matched.iter().any(|m| m.action == PolicyVerdict::Escalate);

        if has_deny {
            verdict == PolicyVerdict::Deny
        } else if has_escalate {
            verdict == PolicyVerdict::Escalate
        } else {
            verdict == PolicyVerdict::Allow
        }
    }
}
