//! Request, receipt and error shapes seen by external routers
//!
//! Requests arrive as raw strings; parsing and validation happen here, so
//! the store only ever sees typed values.

use crate::error::{ErrorKind, MrpError};
use chrono::{DateTime, Utc};
use mrp_audit::{AuditEntry, ChainHash};
use mrp_types::{
    Escalation, EventType, Resolution, RiskReport, Severity, Signal, SignalId, SignalStatus,
    ValidationError,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Risk classification input for `submit_signal`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitSignalRequest {
    /// Subject the report concerns
    pub subject_id: String,
    /// Classified risk type
    pub risk_type: String,
    /// `HIGH` or `CRITICAL`
    pub severity: String,
    /// Free-text description
    pub description: String,
    /// Detection source
    pub detected_by: String,
    /// Optional metadata
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl SubmitSignalRequest {
    /// Parse into a validated report
    ///
    /// # Errors
    /// Returns [`ValidationError`] for an unknown severity or blank required field
    pub fn into_report(self) -> Result<RiskReport, ValidationError> {
        let severity: Severity = self.severity.parse()?;
        let report = RiskReport {
            subject_id: self.subject_id,
            risk_type: self.risk_type,
            severity,
            description: self.description,
            detected_by: self.detected_by,
            metadata: self.metadata,
        };
        report.validate()?;
        Ok(report)
    }
}

/// Staff input for `log_intervention`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogInterventionRequest {
    /// Action taken
    pub action: String,
    /// Staff member
    pub staff_id: String,
    /// Optional notes
    #[serde(default)]
    pub notes: Option<String>,
}

/// Outcome of a successful submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    /// Assigned id
    pub id: SignalId,
    /// Always `PENDING`
    pub status: SignalStatus,
    /// Escalation deadline
    pub deadline: DateTime<Utc>,
}

/// Outcome of a successful intervention
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterventionReceipt {
    /// Resolved signal
    pub id: SignalId,
    /// Always `RESOLVED`
    pub status: SignalStatus,
}

/// Flat, serializable view of a signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct SignalView {
    pub id: SignalId,
    pub subject_id: String,
    pub risk_type: String,
    pub severity: Severity,
    pub description: String,
    pub detected_by: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    pub status: SignalStatus,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    /// Present only when resolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    /// Present only when escalated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation: Option<Escalation>,
}

impl From<Signal> for SignalView {
    fn from(signal: Signal) -> Self {
        let status = signal.status();
        let resolution = signal.resolution().cloned();
        let escalation = signal.escalation().cloned();
        let report = signal.report;
        Self {
            id: signal.id,
            subject_id: report.subject_id,
            risk_type: report.risk_type,
            severity: report.severity,
            description: report.description,
            detected_by: report.detected_by,
            metadata: report.metadata,
            status,
            created_at: signal.created_at,
            deadline: signal.deadline,
            resolution,
            escalation,
        }
    }
}

/// Audit entry with its payload expanded for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct AuditEntryView {
    pub sequence: u64,
    pub signal_id: SignalId,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    /// Payload parsed as JSON; the raw string if it does not parse
    pub payload: serde_json::Value,
    pub prev_hash: ChainHash,
    pub hash: ChainHash,
    /// Whether the entry carries a signature
    pub signed: bool,
}

impl From<&AuditEntry> for AuditEntryView {
    fn from(entry: &AuditEntry) -> Self {
        let payload = serde_json::from_str(&entry.payload)
            .unwrap_or_else(|_| serde_json::Value::String(entry.payload.clone()));
        Self {
            sequence: entry.sequence,
            signal_id: entry.signal_id,
            event_type: entry.event_type,
            timestamp: entry.timestamp,
            payload,
            prev_hash: entry.prev_hash,
            hash: entry.hash,
            signed: entry.signature.is_some(),
        }
    }
}

/// Error returned to routers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct BoundaryError {
    /// Classification
    pub kind: ErrorKind,
    /// Human-readable detail
    pub message: String,
}

impl BoundaryError {
    /// HTTP-equivalent status code
    #[inline]
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }
}

impl From<MrpError> for BoundaryError {
    fn from(err: MrpError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<ValidationError> for BoundaryError {
    fn from(err: ValidationError) -> Self {
        MrpError::from(err).into()
    }
}

/// Parse a signal id from a path or query parameter
///
/// # Errors
/// Returns [`ValidationError::InvalidSignalId`] if it is not a UUID
pub fn parse_signal_id(raw: &str) -> Result<SignalId, ValidationError> {
    raw.trim().parse()
}
