use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::AnomalySeverity;

/// Rolling statistical summary of a metric for one agent. Recomputed on
/// every observation once `sample_count >= min_baseline_samples`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineStats {
    /// Bounded FIFO of the most recent observations, capacity =
    /// `baseline_sample_size`.
    pub values: VecDeque<f64>,
    pub capacity: usize,
    pub sample_count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub q1: f64,
    pub q3: f64,
    pub last_updated: DateTime<Utc>,
}

impl BaselineStats {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
            sample_count: 0,
            mean: 0.0,
            std: 0.0,
            min: 0.0,
            max: 0.0,
            q1: 0.0,
            q3: 0.0,
            last_updated: Utc::now(),
        }
    }

    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }
}

/// A single emitted anomaly. The `acknowledged*` fields are a denormalized
/// projection of the latest `AcknowledgementRecord`, not independently
/// mutated state (see SPEC_FULL.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub anomaly_id: String,
    pub agent_id: String,
    pub metric_name: String,
    pub severity: AnomalySeverity,
    pub baseline_value: f64,
    pub observed_value: f64,
    pub z_score: f64,
    pub iqr_score: f64,
    pub detection_method: String,
    pub confidence: f64,
    pub description: String,
    pub detected_at: DateTime<Utc>,
    pub acknowledged: bool,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

/// Append-only acknowledgement of an `Anomaly`. `AnomalyDetector` never
/// mutates the original anomaly record; it stores one of these instead and
/// projects the latest one onto read views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcknowledgementRecord {
    pub anomaly_id: String,
    pub acknowledged_by: String,
    pub acknowledged_at: DateTime<Utc>,
    pub note: Option<String>,
}
