//! Typed audit events
//!
//! Every audit entry carries exactly one [`AuditEvent`]. The entry stores
//! the [`EventType`] discriminant and the canonical JSON of the variant's
//! payload; [`AuditEvent::decode`] reverses that split.

use crate::report::RiskReport;
use crate::signal::EscalationTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Audit event discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventType {
    /// Signal accepted at intake
    #[serde(rename = "SIGNAL_RECEIVED")]
    SignalReceived,
    /// Staff intervention resolved the signal
    #[serde(rename = "INTERVENTION_LOGGED")]
    InterventionLogged,
    /// Deadline passed, handed to tier 2
    #[serde(rename = "ESCALATED_TO_TIER2")]
    EscalatedToTier2,
}

impl EventType {
    /// All event types, in lifecycle order
    pub const ALL: [EventType; 3] = [
        EventType::SignalReceived,
        EventType::InterventionLogged,
        EventType::EscalatedToTier2,
    ];

    /// Wire name, also fed into the entry hash
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EventType::SignalReceived => "SIGNAL_RECEIVED",
            EventType::InterventionLogged => "INTERVENTION_LOGGED",
            EventType::EscalatedToTier2 => "ESCALATED_TO_TIER2",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of `SIGNAL_RECEIVED`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalReceived {
    /// Report as submitted
    pub report: RiskReport,
    /// Escalation deadline armed at intake
    pub deadline: DateTime<Utc>,
}

/// Payload of `INTERVENTION_LOGGED`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterventionLogged {
    /// Action taken
    pub action: String,
    /// Staff member who acted
    pub staff_id: String,
    /// Optional notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Resolution time
    pub resolved_at: DateTime<Utc>,
    /// Time from intake to resolution
    pub elapsed_ms: i64,
}

/// Payload of `ESCALATED_TO_TIER2`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalatedToTier2 {
    /// Receiving tier
    pub target: EscalationTier,
    /// Why the signal was escalated
    pub reason: String,
    /// Escalation time
    pub escalated_at: DateTime<Utc>,
    /// When the deadline timer was armed
    pub timer_started_at: DateTime<Utc>,
}

/// One lifecycle event, tagged by type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEvent {
    /// See [`SignalReceived`]
    SignalReceived(SignalReceived),
    /// See [`InterventionLogged`]
    InterventionLogged(InterventionLogged),
    /// See [`EscalatedToTier2`]
    EscalatedToTier2(EscalatedToTier2),
}

impl AuditEvent {
    /// Discriminant of this event
    #[inline]
    #[must_use]
    pub fn event_type(&self) -> EventType {
        match self {
            AuditEvent::SignalReceived(_) => EventType::SignalReceived,
            AuditEvent::InterventionLogged(_) => EventType::InterventionLogged,
            AuditEvent::EscalatedToTier2(_) => EventType::EscalatedToTier2,
        }
    }

    /// Canonical JSON of the payload
    ///
    /// Struct fields serialize in declaration order and metadata is a sorted
    /// map, so equal events always encode to identical bytes.
    ///
    /// # Errors
    /// Returns the serializer error if encoding fails
    pub fn canonical_payload(&self) -> Result<String, serde_json::Error> {
        match self {
            AuditEvent::SignalReceived(p) => serde_json::to_string(p),
            AuditEvent::InterventionLogged(p) => serde_json::to_string(p),
            AuditEvent::EscalatedToTier2(p) => serde_json::to_string(p),
        }
    }

    /// Rebuild an event from its stored discriminant and payload
    ///
    /// # Errors
    /// Returns the deserializer error if the payload does not match the type
    pub fn decode(event_type: EventType, payload: &str) -> Result<Self, serde_json::Error> {
        Ok(match event_type {
            EventType::SignalReceived => AuditEvent::SignalReceived(serde_json::from_str(payload)?),
            EventType::InterventionLogged => {
                AuditEvent::InterventionLogged(serde_json::from_str(payload)?)
            }
            EventType::EscalatedToTier2 => {
                AuditEvent::EscalatedToTier2(serde_json::from_str(payload)?)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Severity;
    use pretty_assertions::assert_eq;

    #[test]
    fn event_type_wire_names() {
        let json = serde_json::to_string(&EventType::EscalatedToTier2).unwrap();
        assert_eq!(json, "\"ESCALATED_TO_TIER2\"");
        for t in EventType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json.trim_matches('"'), t.as_str());
        }
    }

    #[test]
    fn payload_decodes_back_to_event() {
        let now = Utc::now();
        let event = AuditEvent::SignalReceived(SignalReceived {
            report: RiskReport::new("S1", "bullying", Severity::Critical, "text", "keywords")
                .with_metadata("b", "2")
                .with_metadata("a", "1"),
            deadline: now,
        });
        let payload = event.canonical_payload().unwrap();
        let decoded = AuditEvent::decode(event.event_type(), &payload).unwrap();
        assert_eq!(decoded, event);
        // sorted metadata keeps the encoding canonical
        assert!(payload.find("\"a\"").unwrap() < payload.find("\"b\"").unwrap());
    }

    #[test]
    fn decode_rejects_mismatched_payload() {
        let now = Utc::now();
        let event = AuditEvent::InterventionLogged(InterventionLogged {
            action: "Parent Contacted".into(),
            staff_id: "ST1".into(),
            notes: None,
            resolved_at: now,
            elapsed_ms: 120_000,
        });
        let payload = event.canonical_payload().unwrap();
        assert!(AuditEvent::decode(EventType::EscalatedToTier2, &payload).is_err());
    }
}
