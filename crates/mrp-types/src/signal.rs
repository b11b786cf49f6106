//! Signal lifecycle
//!
//! A signal starts `Pending` and moves exactly once to `Resolved` or
//! `Escalated`. Resolution and escalation details live inside the state
//! variant, so they can only exist together with the matching status.

use crate::id::SignalId;
use crate::report::RiskReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status without attached data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStatus {
    /// Awaiting intervention, deadline armed
    Pending,
    /// Intervention logged before the deadline
    Resolved,
    /// Deadline passed without intervention
    Escalated,
}

impl SignalStatus {
    /// Wire name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SignalStatus::Pending => "PENDING",
            SignalStatus::Resolved => "RESOLVED",
            SignalStatus::Escalated => "ESCALATED",
        }
    }

    /// Terminal states accept no further transition
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, SignalStatus::Pending)
    }
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tier a signal is handed to on escalation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EscalationTier {
    /// Tier-2 supervisor
    #[serde(rename = "TIER_2")]
    Tier2,
}

impl fmt::Display for EscalationTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EscalationTier::Tier2 => f.write_str("TIER_2"),
        }
    }
}

/// Staff intervention that resolved a signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Action taken
    pub action: String,
    /// Staff member who acted
    pub staff_id: String,
    /// Optional notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// When the intervention was committed
    pub resolved_at: DateTime<Utc>,
}

/// Automatic hand-off after a missed deadline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escalation {
    /// When the escalation was committed
    pub escalated_at: DateTime<Utc>,
    /// Receiving tier
    pub target: EscalationTier,
    /// Human-readable reason
    pub reason: String,
}

/// Status together with its terminal data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "details", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalState {
    /// Awaiting intervention
    Pending,
    /// Resolved by intervention
    Resolved(Resolution),
    /// Escalated by the scheduler
    Escalated(Escalation),
}

/// Current record of one submitted report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    /// Identifier
    pub id: SignalId,
    /// Immutable intake payload
    pub report: RiskReport,
    /// Intake time
    pub created_at: DateTime<Utc>,
    /// `created_at` plus the fixed escalation timeout
    pub deadline: DateTime<Utc>,
    /// Lifecycle state
    pub state: SignalState,
}

impl Signal {
    /// New pending signal
    #[must_use]
    pub fn pending(
        id: SignalId,
        report: RiskReport,
        created_at: DateTime<Utc>,
        deadline: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            report,
            created_at,
            deadline,
            state: SignalState::Pending,
        }
    }

    /// Status discriminant
    #[inline]
    #[must_use]
    pub fn status(&self) -> SignalStatus {
        match self.state {
            SignalState::Pending => SignalStatus::Pending,
            SignalState::Resolved(_) => SignalStatus::Resolved,
            SignalState::Escalated(_) => SignalStatus::Escalated,
        }
    }

    /// Whether the signal still awaits intervention
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self.state, SignalState::Pending)
    }

    /// Resolution, present only when resolved
    #[must_use]
    pub fn resolution(&self) -> Option<&Resolution> {
        match &self.state {
            SignalState::Resolved(r) => Some(r),
            _ => None,
        }
    }

    /// Escalation, present only when escalated
    #[must_use]
    pub fn escalation(&self) -> Option<&Escalation> {
        match &self.state {
            SignalState::Escalated(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Severity;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn signal() -> Signal {
        let now = Utc::now();
        Signal::pending(
            SignalId::new(),
            RiskReport::new("S1", "bullying", Severity::High, "text", "keywords"),
            now,
            now + Duration::minutes(10),
        )
    }

    #[test]
    fn pending_has_no_terminal_data() {
        let s = signal();
        assert_eq!(s.status(), SignalStatus::Pending);
        assert!(s.resolution().is_none());
        assert!(s.escalation().is_none());
    }

    #[test]
    fn status_follows_state() {
        let mut s = signal();
        s.state = SignalState::Escalated(Escalation {
            escalated_at: s.deadline,
            target: EscalationTier::Tier2,
            reason: "missed".into(),
        });
        assert_eq!(s.status(), SignalStatus::Escalated);
        assert!(s.status().is_terminal());
        assert!(s.escalation().is_some());
    }

    #[test]
    fn state_serializes_with_status_tag() {
        let mut s = signal();
        s.state = SignalState::Resolved(Resolution {
            action: "Parent Contacted".into(),
            staff_id: "ST1".into(),
            notes: None,
            resolved_at: s.created_at,
        });
        let value = serde_json::to_value(&s.state).unwrap();
        assert_eq!(value["status"], "RESOLVED");
        assert_eq!(value["details"]["staff_id"], "ST1");

        let back: SignalState = serde_json::from_value(value).unwrap();
        assert_eq!(back, s.state);
    }
}
