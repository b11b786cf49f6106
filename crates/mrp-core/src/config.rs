//! Runtime configuration
//!
//! Loaded once at startup. The escalation timeout in particular is fixed for
//! the lifetime of a running service; nothing here is reloaded.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default escalation timeout (10 minutes)
pub const DEFAULT_ESCALATION_TIMEOUT_MS: u64 = 600_000;

/// Longest accepted escalation timeout (30 days)
pub const MAX_ESCALATION_TIMEOUT_MS: u64 = 30 * 24 * 60 * 60 * 1000;

/// Configuration loading or validation failure
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        /// Config file
        path: PathBuf,
        /// I/O error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for [`MrpConfig`]
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("{field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MrpConfig {
    /// Time from intake until automatic tier-2 escalation
    pub escalation_timeout_ms: u64,
    /// Delay before retrying an escalation whose audit append failed
    pub escalation_retry_ms: u64,
    /// Default window for recent audit entries
    pub recent_entries_limit: usize,
    /// Journal file; in-memory chain when absent
    pub journal_path: Option<PathBuf>,
    /// `tracing` filter directive
    pub log_filter: String,
    /// Emit JSON log lines
    pub log_json: bool,
}

impl Default for MrpConfig {
    fn default() -> Self {
        Self {
            escalation_timeout_ms: DEFAULT_ESCALATION_TIMEOUT_MS,
            escalation_retry_ms: 1_000,
            recent_entries_limit: 100,
            journal_path: None,
            log_filter: "info".to_string(),
            log_json: false,
        }
    }
}

impl MrpConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With escalation timeout
    #[inline]
    #[must_use]
    pub fn with_escalation_timeout(mut self, timeout: Duration) -> Self {
        self.escalation_timeout_ms = saturating_millis(timeout);
        self
    }

    /// With escalation retry delay
    #[inline]
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.escalation_retry_ms = saturating_millis(delay);
        self
    }

    /// With recent-entries window
    #[inline]
    #[must_use]
    pub fn with_recent_entries_limit(mut self, limit: usize) -> Self {
        self.recent_entries_limit = limit;
        self
    }

    /// With journal file
    #[inline]
    #[must_use]
    pub fn with_journal_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.journal_path = Some(path.into());
        self
    }

    /// With log filter
    #[inline]
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// With JSON log output
    #[inline]
    #[must_use]
    pub fn with_log_json(mut self, json: bool) -> Self {
        self.log_json = json;
        self
    }

    /// Escalation timeout as a [`Duration`]
    #[inline]
    #[must_use]
    pub fn escalation_timeout(&self) -> Duration {
        Duration::from_millis(self.escalation_timeout_ms)
    }

    /// Retry delay as a [`Duration`]
    #[inline]
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.escalation_retry_ms)
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// Returns [`ConfigError`] on malformed TOML or out-of-range values
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file cannot be read or is invalid
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the first bad field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.escalation_timeout_ms == 0 || self.escalation_timeout_ms > MAX_ESCALATION_TIMEOUT_MS
        {
            return Err(ConfigError::Invalid {
                field: "escalation_timeout_ms",
                reason: format!("must be between 1 and {MAX_ESCALATION_TIMEOUT_MS}"),
            });
        }
        if self.escalation_retry_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "escalation_retry_ms",
                reason: "must be positive".into(),
            });
        }
        if self.recent_entries_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "recent_entries_limit",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }
}

fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_protocol() {
        let config = MrpConfig::default();
        assert_eq!(config.escalation_timeout(), Duration::from_secs(600));
        assert_eq!(config.recent_entries_limit, 100);
        assert!(config.journal_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_sets_fields() {
        let config = MrpConfig::new()
            .with_escalation_timeout(Duration::from_secs(30))
            .with_retry_delay(Duration::from_millis(250))
            .with_journal_path("/tmp/audit.jsonl")
            .with_log_json(true);
        assert_eq!(config.escalation_timeout_ms, 30_000);
        assert_eq!(config.escalation_retry_ms, 250);
        assert_eq!(config.journal_path, Some(PathBuf::from("/tmp/audit.jsonl")));
        assert!(config.log_json);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = MrpConfig::from_toml_str("escalation_timeout_ms = 5000\n").unwrap();
        assert_eq!(config.escalation_timeout_ms, 5000);
        assert_eq!(config.escalation_retry_ms, 1_000);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn zero_values_are_rejected() {
        let err = MrpConfig::from_toml_str("escalation_timeout_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "escalation_timeout_ms", .. }));

        let err = MrpConfig::from_toml_str("recent_entries_limit = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "recent_entries_limit", .. }));
    }

    #[test]
    fn unknown_types_fail_to_parse() {
        let err = MrpConfig::from_toml_str("escalation_timeout_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
