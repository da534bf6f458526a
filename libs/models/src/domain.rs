use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Final outcome of a policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum PolicyVerdict {
    Allow,
    Deny,
    Escalate,
}

/// Severity classification for a detected anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum AnomalySeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// State of an escalation workflow. `Pending`, `Notified`, `Waiting`,
/// `Assigned` and `InReview` are transient; the remaining three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum EscalationStatus {
    Pending,
    Notified,
    Waiting,
    Assigned,
    InReview,
    Approved,
    Rejected,
    TimedOut,
}

impl EscalationStatus {
    /// Terminal states have no outgoing edges in the state graph (spec.md §4.4).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EscalationStatus::Approved | EscalationStatus::Rejected | EscalationStatus::TimedOut
        )
    }

    /// The fixed adjacency list of the escalation state machine.
    pub fn valid_next_states(self) -> &'static [EscalationStatus] {
        use EscalationStatus::*;
        match self {
            Pending => &[Notified, TimedOut],
            Notified => &[Waiting, Assigned, TimedOut],
            Waiting => &[Approved, Rejected, TimedOut],
            Assigned => &[InReview, TimedOut],
            InReview => &[Approved, Rejected, TimedOut],
            Approved | Rejected | TimedOut => &[],
        }
    }

    pub fn can_transition_to(self, next: EscalationStatus) -> bool {
        self.valid_next_states().contains(&next)
    }
}

/// The kind of constraint a `Constraint` enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum ConstraintType {
    RateLimit,
    Quota,
    ResourceCap,
    OperationRestriction,
    Temporal,
}

/// Agent metadata used to build the `agent` branch of a policy evaluation's
/// context (spec.md §4.1 step 1, "fetch agent context from DataStore").
/// Mirrors the original L01 bridge's `get_agent_context` payload
/// (`agent_id`, `team`, `department`, `permissions`, `created_at`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentContext {
    pub agent_id: String,
    pub team: String,
    pub department: String,
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

impl AgentContext {
    /// The context returned for an agent with no registered record, matching
    /// the original bridge's mock fallback (`team: "default"`,
    /// `department: "engineering"`, no permissions).
    pub fn default_for(agent_id: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            team: "default".to_string(),
            department: "engineering".to_string(),
            permissions: Vec::new(),
            created_at: Utc::now(),
            attributes: HashMap::new(),
        }
    }

    /// Render as a JSON object so `PolicyEngine` can splice it into the
    /// evaluation context under the `agent` key.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_transitions_match_state_graph() {
        assert!(EscalationStatus::Pending.can_transition_to(EscalationStatus::Notified));
        assert!(EscalationStatus::Pending.can_transition_to(EscalationStatus::TimedOut));
        assert!(!EscalationStatus::Pending.can_transition_to(EscalationStatus::Approved));
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for s in [
            EscalationStatus::Approved,
            EscalationStatus::Rejected,
            EscalationStatus::TimedOut,
        ] {
            assert!(s.is_terminal());
            assert!(s.valid_next_states().is_empty());
        }
    }

    #[test]
    fn verdict_serializes_uppercase() {
        let v = serde_json::to_string(&PolicyVerdict::Escalate).unwrap();
        assert_eq!(v, "\"ESCALATE\"");
    }

    #[test]
    fn fake_generated_team_name_round_trips_through_to_value() {
        use fake::{Fake, Faker};
        let team: String = Faker.fake();
        let mut ctx = AgentContext::default_for("agent-1");
        ctx.team = team.clone();
        let value = ctx.to_value();
        assert_eq!(value.get("team").unwrap().as_str().unwrap(), team);
    }
}
