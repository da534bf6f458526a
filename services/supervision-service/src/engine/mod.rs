pub mod access_control;
pub mod anomaly_detector;
pub mod audit_log;
pub mod compliance_monitor;
pub mod constraint_enforcer;
pub mod decision_explainer;
pub mod escalation_orchestrator;
pub mod expression;
pub mod policy_engine;

pub use access_control::AccessControl;
pub use anomaly_detector::{AnomalyDetector, AnomalyDetectorConfig};
pub use audit_log::{AuditLog, ChainVerification};
pub use compliance_monitor::{ComplianceMonitor, EscalationOutcome};
pub use constraint_enforcer::{CheckOutcome, ConstraintEnforcer};
pub use decision_explainer::DecisionExplainer;
pub use escalation_orchestrator::{EscalationOrchestrator, EscalationOrchestratorConfig};
pub use policy_engine::PolicyEngine;
