//! Error types for the audit chain
//!
//! Two distinct families:
//! - [`PersistenceError`]: the storage layer failed; the in-flight append
//!   did not happen
//! - [`ChainIntegrityViolation`]: stored history disagrees with its hashes;
//!   only ever produced from a verification report

use crate::verify::IntegrityFailure;
use std::path::PathBuf;

/// Storage failure during load or append
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Underlying I/O failed
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Entry or payload could not be encoded
    #[error("failed to encode entry: {0}")]
    Encode(#[source] serde_json::Error),

    /// A committed payload no longer matches its event type
    #[error("entry {sequence} has an undecodable payload: {source}")]
    Decode {
        /// Sequence of the offending entry
        sequence: u64,
        /// Parser error
        #[source]
        source: serde_json::Error,
    },

    /// A newline-terminated journal line does not parse
    #[error("corrupt journal {path}: line {line}: {reason}")]
    Corrupt {
        /// Journal file
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// Parser message
        reason: String,
    },

    /// Storage refused the write
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Stored history disagrees with recomputed hashes or linkage
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("chain integrity violated at sequence {broken_at}: {failure}")]
pub struct ChainIntegrityViolation {
    /// First sequence that failed
    pub broken_at: u64,
    /// What failed there
    pub failure: IntegrityFailure,
}
