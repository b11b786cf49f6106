//! Error taxonomy for the core
//!
//! - [`MrpError`]: what store and service operations return
//! - [`ErrorKind`]: the stable, serializable classification routers map
//!   onto status codes

use crate::config::ConfigError;
use mrp_audit::{ChainIntegrityViolation, PersistenceError};
use mrp_types::{SignalId, SignalStatus, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Main core error type
#[derive(Debug, thiserror::Error)]
pub enum MrpError {
    /// Malformed input; nothing was mutated
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Unknown signal id
    #[error("signal {0} not found")]
    NotFound(SignalId),

    /// Signal already left PENDING
    #[error("signal {id} is already {status}")]
    AlreadyTerminal {
        /// Signal
        id: SignalId,
        /// Its terminal status
        status: SignalStatus,
    },

    /// Audit append or storage failed; the transition did not happen
    #[error("persistence failure: {0}")]
    Persistence(#[from] PersistenceError),

    /// Verification found tampering
    #[error(transparent)]
    Integrity(#[from] ChainIntegrityViolation),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl MrpError {
    /// Stable classification
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyTerminal { .. } => ErrorKind::AlreadyTerminal,
            Self::Persistence(_) => ErrorKind::Persistence,
            Self::Integrity(_) => ErrorKind::Integrity,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Check if error is retryable
    ///
    /// Only persistence failures are; every other error is a final answer
    /// about the input or the signal's state.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

/// Error classification exposed at the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed input
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,
    /// Unknown signal
    #[serde(rename = "NOT_FOUND")]
    NotFound,
    /// Signal already resolved or escalated
    #[serde(rename = "ALREADY_TERMINAL")]
    AlreadyTerminal,
    /// Storage failure
    #[serde(rename = "PERSISTENCE_FAILURE")]
    Persistence,
    /// Tampered audit history
    #[serde(rename = "CHAIN_INTEGRITY_VIOLATION")]
    Integrity,
    /// Bad configuration
    #[serde(rename = "CONFIG_ERROR")]
    Config,
}

impl ErrorKind {
    /// HTTP-equivalent status code
    #[inline]
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::AlreadyTerminal => 409,
            ErrorKind::Persistence | ErrorKind::Integrity | ErrorKind::Config => 500,
        }
    }

    /// Wire name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::AlreadyTerminal => "ALREADY_TERMINAL",
            ErrorKind::Persistence => "PERSISTENCE_FAILURE",
            ErrorKind::Integrity => "CHAIN_INTEGRITY_VIOLATION",
            ErrorKind::Config => "CONFIG_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result alias for core operations
pub type Result<T, E = MrpError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_status_codes() {
        let id = SignalId::new();
        assert_eq!(MrpError::NotFound(id).kind().status_code(), 404);
        assert_eq!(
            MrpError::AlreadyTerminal {
                id,
                status: SignalStatus::Resolved
            }
            .kind()
            .status_code(),
            409
        );
        assert_eq!(
            MrpError::Validation(ValidationError::EmptyField("action"))
                .kind()
                .status_code(),
            400
        );
    }

    #[test]
    fn only_persistence_is_retryable() {
        let err = MrpError::Persistence(PersistenceError::Unavailable("down".into()));
        assert!(err.is_retryable());
        assert!(!MrpError::NotFound(SignalId::new()).is_retryable());
    }

    #[test]
    fn kind_serializes_to_wire_name() {
        let json = serde_json::to_string(&ErrorKind::Persistence).unwrap();
        assert_eq!(json, "\"PERSISTENCE_FAILURE\"");
        assert_eq!(ErrorKind::Integrity.to_string(), "CHAIN_INTEGRITY_VIOLATION");
    }
}
