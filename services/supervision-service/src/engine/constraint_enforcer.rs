//! Checks and atomically consumes capacity against a named constraint:
//! rate limits (token bucket), quotas, resource caps, operation
//! restrictions, and temporal gating.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Timelike, Utc};
use tracing::{instrument, warn};

use supervision_common::adapters::{CounterStore, DataStore};
use supervision_common::error::Result;
use supervision_models::{Constraint, ConstraintType, ConstraintViolation};

/// Outcome of a single `Check` call.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub allowed: bool,
    pub remaining: Option<f64>,
    pub error: Option<String>,
}

pub struct ConstraintEnforcer {
    data_store: Arc<dyn DataStore>,
    counter_store: Arc<dyn CounterStore>,
    allow_on_consensus_fail: bool,
}

impl ConstraintEnforcer {
    pub fn new(
        data_store: Arc<dyn DataStore>,
        counter_store: Arc<dyn CounterStore>,
        allow_on_consensus_fail: bool,
    ) -> Self {
        Self { data_store, counter_store, allow_on_consensus_fail }
    }

    #[instrument(skip(self), fields(agent_id = %agent_id, constraint_id = %constraint_id))]
    pub async fn check(
        &self,
        agent_id: &str,
        constraint_id: &str,
        current_usage: Option<f64>,
        requested: f64,
    ) -> Result<CheckOutcome> {
        let constraint = match self.data_store.get_constraint(constraint_id).await? {
            Some(c) if c.enabled => c,
            _ => {
                return Ok(CheckOutcome {
                    allowed: false,
                    remaining: None,
                    error: Some(format!("constraint not found or disabled: {constraint_id}")),
                })
            }
        };

        if let Some(temporal) = &constraint.temporal_config {
            if !temporal_allows(temporal, Utc::now()) {
                self.record_violation(&constraint, agent_id, current_usage.unwrap_or(0.0), "TEMPORAL").await?;
                return Ok(CheckOutcome {
                    allowed: false,
                    remaining: None,
                    error: Some("temporal constraint violation".to_string()),
                });
            }
        }

        let outcome = match constraint.constraint_type {
            ConstraintType::RateLimit => self.check_rate_limit(agent_id, &constraint, requested).await,
            ConstraintType::Quota => Ok(check_threshold(current_usage.unwrap_or(0.0), constraint.limit)),
            ConstraintType::ResourceCap => Ok(check_threshold(current_usage.unwrap_or(0.0), constraint.limit)),
            ConstraintType::OperationRestriction => Ok(CheckOutcome {
                allowed: current_usage.unwrap_or(0.0) <= constraint.limit,
                remaining: None,
                error: None,
            }),
            ConstraintType::Temporal => Ok(CheckOutcome { allowed: true, remaining: None, error: None }),
        }?;

        if !outcome.allowed {
            self.record_violation(&constraint, agent_id, current_usage.unwrap_or(requested), "LIMIT_EXCEEDED")
                .await?;
        }

        Ok(outcome)
    }

    async fn check_rate_limit(
        &self,
        agent_id: &str,
        constraint: &Constraint,
        requested: f64,
    ) -> Result<CheckOutcome> {
        let key = format!("ratelimit:{}:{}", agent_id, constraint.constraint_id);
        let refill_rate = constraint.limit / constraint.window_seconds.max(1) as f64;

        match self
            .counter_store
            .check_token_bucket(&key, constraint.limit, refill_rate, requested)
            .await
        {
            Ok(result) => Ok(CheckOutcome {
                allowed: result.allowed,
                remaining: Some(result.limit - result.current_usage),
                error: None,
            }),
            Err(e) => {
                warn!(error = %e, "counter store unavailable during rate limit check");
                if self.allow_on_consensus_fail {
                    Ok(CheckOutcome { allowed: true, remaining: None, error: None })
                } else {
                    Ok(CheckOutcome {
                        allowed: false,
                        remaining: None,
                        error: Some("counter store unavailable, failing closed".to_string()),
                    })
                }
            }
        }
    }

    async fn record_violation(
        &self,
        constraint: &Constraint,
        agent_id: &str,
        current_usage: f64,
        violation_type: &str,
    ) -> Result<()> {
        let violation = ConstraintViolation {
            violation_id: uuid::Uuid::new_v4().to_string(),
            constraint_id: constraint.constraint_id.clone(),
            agent_id: agent_id.to_string(),
            current_usage,
            limit: constraint.limit,
            violation_type: violation_type.to_string(),
            details: format!(
                "{} exceeded for constraint '{}': usage {} > limit {}",
                violation_type, constraint.name, current_usage, constraint.limit
            ),
            timestamp: Utc::now(),
        };
        self.data_store.record_violation(violation).await
    }

    /// Operator-tooling accessor: current counter-store usage for an
    /// agent/constraint pair, without consuming any capacity.
    pub async fn get_usage(&self, agent_id: &str, constraint_id: &str) -> Result<f64> {
        let key = format!("ratelimit:{agent_id}:{constraint_id}");
        self.counter_store.get_usage(&key).await
    }

    /// Operator-tooling accessor: clear the counter-store state for an
    /// agent/constraint pair, e.g. after a manual limit override.
    pub async fn reset_limit(&self, agent_id: &str, constraint_id: &str) -> Result<()> {
        let key = format!("ratelimit:{agent_id}:{constraint_id}");
        self.counter_store.reset(&key).await
    }
}

fn check_threshold(usage: f64, limit: f64) -> CheckOutcome {
    let allowed = usage <= limit;
    CheckOutcome { allowed, remaining: Some((limit - usage).max(0.0)), error: None }
}

fn temporal_allows(config: &supervision_models::TemporalConfig, now: DateTime<Utc>) -> bool {
    if config.business_hours_only {
        let hour = now.hour();
        let start = config.start_hour.unwrap_or(9);
        let end = config.end_hour.unwrap_or(17);
        if !(start..end).contains(&hour) {
            return false;
        }
    }
    if !config.allowed_days.is_empty() {
        let weekday = now.weekday().num_days_from_monday();
        if !config.allowed_days.contains(&weekday) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use supervision_common::adapters::{InMemoryCounterStore, InMemoryDataStore};

    fn rate_limit_constraint() -> Constraint {
        Constraint {
            constraint_id: "c1".to_string(),
            name: "api-calls".to_string(),
            constraint_type: ConstraintType::RateLimit,
            limit: 2.0,
            window_seconds: 60,
            scope: "global".to_string(),
            agent_id: None,
            temporal_config: None,
            enabled: true,
        }
    }

    #[tokio::test]
    async fn rate_limit_denies_once_exhausted_and_records_violation() {
        let data_store = Arc::new(InMemoryDataStore::new());
        let counter_store = Arc::new(InMemoryCounterStore::new());
        data_store.put_constraint(rate_limit_constraint()).await.unwrap();
        let enforcer = ConstraintEnforcer::new(data_store.clone(), counter_store, false);

        for _ in 0..2 {
            let outcome = enforcer.check("agent-1", "c1", None, 1.0).await.unwrap();
            assert!(outcome.allowed);
        }
        let denied = enforcer.check("agent-1", "c1", None, 1.0).await.unwrap();
        assert!(!denied.allowed);
        assert_eq!(data_store.list_violations(Some("agent-1")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn quota_accepts_at_exactly_the_limit() {
        let data_store = Arc::new(InMemoryDataStore::new());
        let counter_store = Arc::new(InMemoryCounterStore::new());
        data_store
            .put_constraint(Constraint {
                constraint_id: "q1".to_string(),
                name: "storage".to_string(),
                constraint_type: ConstraintType::Quota,
                limit: 100.0,
                window_seconds: 0,
                scope: "global".to_string(),
                agent_id: None,
                temporal_config: None,
                enabled: true,
            })
            .await
            .unwrap();
        let enforcer = ConstraintEnforcer::new(data_store, counter_store, false);
        let outcome = enforcer.check("agent-1", "q1", Some(100.0), 1.0).await.unwrap();
        assert!(outcome.allowed);
    }

    #[tokio::test]
    async fn counter_store_failure_fails_open_when_configured() {
        let data_store = Arc::new(InMemoryDataStore::new());
        data_store.put_constraint(rate_limit_constraint()).await.unwrap();

        let mut mock = supervision_common::adapters::MockCounterStore::new();
        mock.expect_check_token_bucket()
            .returning(|_, _, _, _| Err(supervision_common::error::SupervisionError::RedisConnectionFailed("counter store down".to_string())));
        let enforcer = ConstraintEnforcer::new(data_store, Arc::new(mock), true);

        let outcome = enforcer.check("agent-1", "c1", None, 1.0).await.unwrap();
        assert!(outcome.allowed);
    }

    #[tokio::test]
    async fn counter_store_failure_fails_closed_when_configured() {
        let data_store = Arc::new(InMemoryDataStore::new());
        data_store.put_constraint(rate_limit_constraint()).await.unwrap();

        let mut mock = supervision_common::adapters::MockCounterStore::new();
        mock.expect_check_token_bucket()
            .returning(|_, _, _, _| Err(supervision_common::error::SupervisionError::RedisConnectionFailed("counter store down".to_string())));
        let enforcer = ConstraintEnforcer::new(data_store, Arc::new(mock), false);

        let outcome = enforcer.check("agent-1", "c1", None, 1.0).await.unwrap();
        assert!(!outcome.allowed);
    }
}
