use serde::Deserialize;

/// Supervision Core configuration. Loaded from `L08_`-prefixed environment
/// variables via `envy` in `supervision_service::config`; this struct only
/// carries the shape and the defaults (see SPEC_FULL.md §6, §10).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupervisionConfiguration {
    pub dev_mode: bool,

    // Policy engine
    pub enable_policy_caching: bool,
    pub policy_cache_max_size: usize,
    pub policy_cache_ttl_seconds: u64,
    pub max_policy_version_history: usize,
    pub policy_evaluation_timeout_ms: u64,
    pub deny_wins_rule: bool,

    // Constraint enforcement
    pub enable_constraint_enforcement: bool,
    pub rate_limit_window_seconds: u64,
    pub allow_on_consensus_fail: bool,
    pub redis_script_timeout_ms: u64,

    // Anomaly detection
    pub enable_anomaly_detection: bool,
    pub baseline_sample_size: usize,
    pub min_baseline_samples: usize,
    pub z_score_threshold: f64,
    pub iqr_multiplier: f64,
    pub rolling_window_days: u32,

    // Escalation
    pub escalation_timeout_seconds: u64,
    pub escalation_retry_count: u32,
    pub escalation_retry_delay_seconds: u64,
    pub enable_escalation_notifications: bool,
    pub max_escalation_level: u32,
    pub require_mfa_for_approval: bool,

    // Audit trail
    pub enable_immutable_audit: bool,
    pub audit_retention_days: u32,
    pub audit_signing_enabled: bool,
    pub audit_signing_key_id: String,

    // Access control
    pub require_mfa_for_admin: bool,
    pub admin_action_logging: bool,
    pub session_timeout_minutes: u64,

    // Performance / observability
    pub max_concurrent_evaluations: usize,
    pub evaluation_queue_size: usize,
    pub metrics_enabled: bool,
    pub metrics_prefix: String,
}

impl Default for SupervisionConfiguration {
    fn default() -> Self {
        Self {
            dev_mode: true,

            enable_policy_caching: true,
            policy_cache_max_size: 1000,
            policy_cache_ttl_seconds: 300,
            max_policy_version_history: 10,
            policy_evaluation_timeout_ms: 100,
            deny_wins_rule: true,

            enable_constraint_enforcement: true,
            rate_limit_window_seconds: 60,
            allow_on_consensus_fail: false,
            redis_script_timeout_ms: 50,

            enable_anomaly_detection: true,
            baseline_sample_size: 1000,
            min_baseline_samples: 30,
            z_score_threshold: 3.0,
            iqr_multiplier: 1.5,
            rolling_window_days: 30,

            escalation_timeout_seconds: 300,
            escalation_retry_count: 3,
            escalation_retry_delay_seconds: 2,
            enable_escalation_notifications: true,
            max_escalation_level: 3,
            require_mfa_for_approval: true,

            enable_immutable_audit: true,
            audit_retention_days: 365,
            audit_signing_enabled: true,
            audit_signing_key_id: "audit_signer_v1".to_string(),

            require_mfa_for_admin: true,
            admin_action_logging: true,
            session_timeout_minutes: 60,

            max_concurrent_evaluations: 100,
            evaluation_queue_size: 1000,
            metrics_enabled: true,
            metrics_prefix: "l08_supervision".to_string(),
        }
    }
}
