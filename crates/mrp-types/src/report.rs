//! Risk report submitted at intake
//!
//! The report is produced upstream by classification logic and is stored
//! unchanged in the `SIGNAL_RECEIVED` audit entry.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Severity of a tracked signal
///
/// Only high-risk reports enter mandatory-response tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// High risk
    High,
    /// Critical risk
    Critical,
}

impl Severity {
    /// Wire name (`HIGH` / `CRITICAL`)
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("HIGH") {
            Ok(Severity::High)
        } else if trimmed.eq_ignore_ascii_case("CRITICAL") {
            Ok(Severity::Critical)
        } else {
            Err(ValidationError::InvalidSeverity(s.to_string()))
        }
    }
}

/// Immutable payload of a signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskReport {
    /// Subject the report concerns
    pub subject_id: String,
    /// Classified risk type
    pub risk_type: String,
    /// Severity
    pub severity: Severity,
    /// Free-text description
    pub description: String,
    /// Detection source
    pub detected_by: String,
    /// Additional metadata (sorted for canonical encoding)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl RiskReport {
    /// Create a report without metadata
    #[must_use]
    pub fn new(
        subject_id: impl Into<String>,
        risk_type: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
        detected_by: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            risk_type: risk_type.into(),
            severity,
            description: description.into(),
            detected_by: detected_by.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata entry
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Check the fields required for intake
    ///
    /// # Errors
    /// Returns [`ValidationError::EmptyField`] for a blank subject or description
    pub fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::require_non_empty("subject_id", &self.subject_id)?;
        ValidationError::require_non_empty("description", &self.description)?;
        Ok(())
    }
}
