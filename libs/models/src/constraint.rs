use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ConstraintType;

/// Time-of-day / day-of-week gating attached to a `Constraint`, or used as a
/// pre-filter in front of another constraint type.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TemporalConfig {
    #[serde(default)]
    pub business_hours_only: bool,
    /// Hour of day (0-23, inclusive lower bound) business hours start.
    pub start_hour: Option<u32>,
    /// Hour of day (0-23, exclusive upper bound) business hours end.
    pub end_hour: Option<u32>,
    /// 0 = Monday .. 6 = Sunday.
    #[serde(default)]
    pub allowed_days: Vec<u32>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    pub constraint_id: String,
    pub name: String,
    pub constraint_type: ConstraintType,
    pub limit: f64,
    pub window_seconds: u64,
    pub scope: String,
    pub agent_id: Option<String>,
    pub temporal_config: Option<TemporalConfig>,
    pub enabled: bool,
}

/// Append-only record of a denied constraint check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintViolation {
    pub violation_id: String,
    pub constraint_id: String,
    pub agent_id: String,
    pub current_usage: f64,
    pub limit: f64,
    pub violation_type: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}
