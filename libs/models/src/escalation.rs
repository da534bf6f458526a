use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::EscalationStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationWorkflow {
    pub workflow_id: String,
    pub decision_id: String,
    pub reason: String,
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
    pub status: EscalationStatus,
    pub escalation_level: u32,
    pub approvers: Vec<String>,
    pub assigned_to: Option<String>,
    pub mfa_verified: bool,
    pub created_at: DateTime<Utc>,
    pub notified_at: Option<DateTime<Utc>>,
    pub timeout_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub resolution_notes: String,
}

impl EscalationWorkflow {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
