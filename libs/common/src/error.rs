//! Error taxonomy for the Supervision Core (L08).
//!
//! Every variant carries a stable `E8xxx` code (see `code()`) and maps to an
//! HTTP status (see `http_status()`) for the thin health/admin surface in
//! `supervision-service`. Categories follow the E8000-E8999 range:
//!
//! - E8000-E8099 policy
//! - E8100-E8199 constraint
//! - E8200-E8299 escalation
//! - E8300-E8399 anomaly detection
//! - E8400-E8499 audit trail
//! - E8500-E8599 access control
//! - E8600-E8699 integration
//! - E8700-E8799 configuration
//! - E8800-E8899 performance
//! - E8900-E8999 internal

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SupervisionError>;

#[derive(Debug, Error)]
pub enum SupervisionError {
    // Policy errors (E8001-E8012)
    #[error("policy not found: {0}")]
    PolicyNotFound(String),
    #[error("policy evaluation failed: {0}")]
    PolicyEvaluationFailed(String),
    #[error("policy condition compilation failed: {0}")]
    PolicyCompilationFailed(String),
    #[error("conflicting policies detected: {0}")]
    PolicyConflictDetected(String),
    #[error("invalid policy condition expression: {0}")]
    PolicyInvalidCondition(String),
    #[error("policy version conflict: {0}")]
    PolicyVersionConflict(String),
    #[error("invalid policy scope: {0}")]
    PolicyScopeInvalid(String),
    #[error("invalid policy rule definition: {0}")]
    PolicyRuleInvalid(String),
    #[error("policy deployment failed: {0}")]
    PolicyDeployFailed(String),
    #[error("policy rollback failed: {0}")]
    PolicyRollbackFailed(String),
    #[error("policy cache error: {0}")]
    PolicyCacheError(String),
    #[error("required context missing for policy evaluation: {0}")]
    PolicyContextMissing(String),

    // Constraint errors (E8101-E8109)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("resource cap exceeded: {0}")]
    ResourceCapExceeded(String),
    #[error("constraint not found: {0}")]
    ConstraintNotFound(String),
    #[error("invalid constraint definition: {0}")]
    ConstraintInvalid(String),
    #[error("conflicting constraints detected: {0}")]
    ConstraintConflict(String),
    #[error("temporal constraint violation: {0}")]
    TemporalConstraintViolation(String),
    #[error("operation not allowed outside business hours: {0}")]
    BusinessHoursViolation(String),

    // Escalation errors (E8201-E8210)
    #[error("escalation workflow failed: {0}")]
    EscalationWorkflowFailed(String),
    #[error("escalation timeout exceeded: {0}")]
    EscalationTimeout(String),
    #[error("no approver available: {0}")]
    NoApproverAvailable(String),
    #[error("escalation not found: {0}")]
    EscalationNotFound(String),
    #[error("escalation already resolved: {0}")]
    EscalationAlreadyResolved(String),
    #[error("invalid escalation state transition: {0}")]
    EscalationInvalidState(String),
    #[error("failed to send escalation notification: {0}")]
    EscalationNotificationFailed(String),
    #[error("mfa required for escalation resolution: {0}")]
    EscalationMfaRequired(String),
    #[error("mfa verification failed: {0}")]
    EscalationMfaFailed(String),
    #[error("maximum escalation level exceeded: {0}")]
    EscalationLevelExceeded(String),

    // Anomaly errors (E8301-E8306)
    #[error("anomaly detection failed: {0}")]
    AnomalyDetectionFailed(String),
    #[error("insufficient baseline data: {0}")]
    InsufficientBaselineData(String),
    #[error("baseline computation failed: {0}")]
    BaselineComputationFailed(String),
    #[error("anomaly record not found: {0}")]
    AnomalyNotFound(String),
    #[error("metric not being tracked: {0}")]
    MetricNotTracked(String),
    #[error("invalid detection threshold: {0}")]
    DetectionThresholdInvalid(String),

    // Audit errors (E8401-E8407)
    #[error("failed to write audit entry: {0}")]
    AuditTrailWriteFailed(String),
    #[error("audit signature verification failed: {0}")]
    AuditSignatureInvalid(String),
    #[error("audit entry not found: {0}")]
    AuditEntryNotFound(String),
    #[error("audit trail integrity violation: {0}")]
    AuditIntegrityViolation(String),
    #[error("audit query failed: {0}")]
    AuditQueryFailed(String),
    #[error("audit verification failed: {0}")]
    AuditVerificationFailed(String),
    #[error("audit entry beyond retention period: {0}")]
    AuditRetentionExpired(String),

    // Access control errors (E8501-E8507)
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("mfa verification required: {0}")]
    MfaRequired(String),
    #[error("insufficient privileges: {0}")]
    InsufficientPrivileges(String),
    #[error("session expired: {0}")]
    SessionExpired(String),
    #[error("invalid authentication token: {0}")]
    TokenInvalid(String),
    #[error("permission not found: {0}")]
    PermissionNotFound(String),
    #[error("required role not assigned: {0}")]
    RoleNotAssigned(String),

    // Integration errors (E8601-E8606)
    #[error("failed to connect to L01 data layer: {0}")]
    L01ConnectionFailed(String),
    #[error("failed to connect to L10 human interface: {0}")]
    L10ConnectionFailed(String),
    #[error("failed to connect to vault: {0}")]
    VaultConnectionFailed(String),
    #[error("failed to connect to redis: {0}")]
    RedisConnectionFailed(String),
    #[error("consensus timeout in distributed operation: {0}")]
    ConsensusTimeout(String),
    #[error("bridge not initialized: {0}")]
    BridgeNotInitialized(String),

    // Configuration errors (E8701-E8703)
    #[error("invalid configuration value: {0}")]
    ConfigInvalid(String),
    #[error("required configuration missing: {0}")]
    ConfigMissing(String),
    #[error("failed to load configuration: {0}")]
    ConfigLoadFailed(String),

    // Performance errors (E8801-E8803)
    #[error("evaluation timeout exceeded: {0}")]
    EvaluationTimeout(String),
    #[error("cache miss during high-load: {0}")]
    CacheMiss(String),
    #[error("SLA violation detected: {0}")]
    SlaViolation(String),

    // Internal errors (E8901-E8903)
    #[error("internal error: {0}")]
    Internal(String),
    #[error("feature not implemented: {0}")]
    NotImplemented(String),
    #[error("internal state corruption detected: {0}")]
    StateCorruption(String),
}

impl SupervisionError {
    /// Stable `E8xxx` error code, mirrored into audit entries and responses.
    pub fn code(&self) -> &'static str {
        use SupervisionError::*;
        match self {
            PolicyNotFound(_) => "E8001",
            PolicyEvaluationFailed(_) => "E8002",
            PolicyCompilationFailed(_) => "E8003",
            PolicyConflictDetected(_) => "E8004",
            PolicyInvalidCondition(_) => "E8005",
            PolicyVersionConflict(_) => "E8006",
            PolicyScopeInvalid(_) => "E8007",
            PolicyRuleInvalid(_) => "E8008",
            PolicyDeployFailed(_) => "E8009",
            PolicyRollbackFailed(_) => "E8010",
            PolicyCacheError(_) => "E8011",
            PolicyContextMissing(_) => "E8012",

            ConstraintViolation(_) => "E8101",
            RateLimitExceeded(_) => "E8102",
            QuotaExceeded(_) => "E8103",
            ResourceCapExceeded(_) => "E8104",
            ConstraintNotFound(_) => "E8105",
            ConstraintInvalid(_) => "E8106",
            ConstraintConflict(_) => "E8107",
            TemporalConstraintViolation(_) => "E8108",
            BusinessHoursViolation(_) => "E8109",

            EscalationWorkflowFailed(_) => "E8201",
            EscalationTimeout(_) => "E8202",
            NoApproverAvailable(_) => "E8203",
            EscalationNotFound(_) => "E8204",
            EscalationAlreadyResolved(_) => "E8205",
            EscalationInvalidState(_) => "E8206",
            EscalationNotificationFailed(_) => "E8207",
            EscalationMfaRequired(_) => "E8208",
            EscalationMfaFailed(_) => "E8209",
            EscalationLevelExceeded(_) => "E8210",

            AnomalyDetectionFailed(_) => "E8301",
            InsufficientBaselineData(_) => "E8302",
            BaselineComputationFailed(_) => "E8303",
            AnomalyNotFound(_) => "E8304",
            MetricNotTracked(_) => "E8305",
            DetectionThresholdInvalid(_) => "E8306",

            AuditTrailWriteFailed(_) => "E8401",
            AuditSignatureInvalid(_) => "E8402",
            AuditEntryNotFound(_) => "E8403",
            AuditIntegrityViolation(_) => "E8404",
            AuditQueryFailed(_) => "E8405",
            AuditVerificationFailed(_) => "E8406",
            AuditRetentionExpired(_) => "E8407",

            AccessDenied(_) => "E8501",
            MfaRequired(_) => "E8502",
            InsufficientPrivileges(_) => "E8503",
            SessionExpired(_) => "E8504",
            TokenInvalid(_) => "E8505",
            PermissionNotFound(_) => "E8506",
            RoleNotAssigned(_) => "E8507",

            L01ConnectionFailed(_) => "E8601",
            L10ConnectionFailed(_) => "E8602",
            VaultConnectionFailed(_) => "E8603",
            RedisConnectionFailed(_) => "E8604",
            ConsensusTimeout(_) => "E8605",
            BridgeNotInitialized(_) => "E8606",

            ConfigInvalid(_) => "E8701",
            ConfigMissing(_) => "E8702",
            ConfigLoadFailed(_) => "E8703",

            EvaluationTimeout(_) => "E8801",
            CacheMiss(_) => "E8802",
            SlaViolation(_) => "E8803",

            Internal(_) => "E8901",
            NotImplemented(_) => "E8902",
            StateCorruption(_) => "E8903",
        }
    }

    /// HTTP status for the admin/health surface. Most supervision errors are
    /// policy decisions rather than transport failures, so this is only
    /// consulted by the thin HTTP layer, never by the core engines.
    pub fn http_status(&self) -> u16 {
        use SupervisionError::*;
        match self {
            PolicyNotFound(_)
            | ConstraintNotFound(_)
            | EscalationNotFound(_)
            | AnomalyNotFound(_)
            | AuditEntryNotFound(_)
            | PermissionNotFound(_)
            | MetricNotTracked(_) => 404,

            AccessDenied(_)
            | InsufficientPrivileges(_)
            | RoleNotAssigned(_)
            | TokenInvalid(_)
            | SessionExpired(_) => 403,

            MfaRequired(_) | EscalationMfaRequired(_) | EscalationMfaFailed(_) => 401,

            RateLimitExceeded(_) | QuotaExceeded(_) | ResourceCapExceeded(_) => 429,

            PolicyInvalidCondition(_)
            | PolicyScopeInvalid(_)
            | PolicyRuleInvalid(_)
            | ConstraintInvalid(_)
            | ConfigInvalid(_)
            | ConfigMissing(_)
            | PolicyContextMissing(_)
            | DetectionThresholdInvalid(_) => 400,

            PolicyConflictDetected(_)
            | PolicyVersionConflict(_)
            | ConstraintConflict(_)
            | EscalationAlreadyResolved(_)
            | EscalationInvalidState(_) => 409,

            EvaluationTimeout(_) | EscalationTimeout(_) | ConsensusTimeout(_) => 504,

            L01ConnectionFailed(_)
            | L10ConnectionFailed(_)
            | VaultConnectionFailed(_)
            | RedisConnectionFailed(_)
            | BridgeNotInitialized(_) => 502,

            _ => 500,
        }
    }
}
