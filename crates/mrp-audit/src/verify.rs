//! Chain verification
//!
//! Tampering is an expected, reportable outcome: verification returns a
//! [`ChainVerification`] report and never fails for altered data.

use crate::entry::AuditEntry;
use crate::error::ChainIntegrityViolation;
use crate::hash::ChainHash;
use crate::signer::EntrySigner;
use serde::{Deserialize, Serialize};

/// Why an entry failed verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityFailure {
    /// Stored sequence differs from the entry's position
    #[error("sequence gap (found {found})")]
    SequenceGap {
        /// Sequence stored in the entry
        found: u64,
    },
    /// `prev_hash` differs from the predecessor's stored hash
    #[error("prev_hash does not match predecessor")]
    BrokenLink,
    /// Stored hash differs from the recomputed one
    #[error("stored hash does not match contents")]
    HashMismatch,
    /// Attesting signer found no signature
    #[error("signature missing")]
    SignatureMissing,
    /// Signature does not verify
    #[error("signature invalid")]
    SignatureInvalid,
}

/// Result of verifying a chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerification {
    /// No entry failed
    pub valid: bool,
    /// First failing sequence
    pub broken_at: Option<u64>,
    /// Failure at `broken_at`
    pub failure: Option<IntegrityFailure>,
    /// Entries examined (stops at the first failure)
    pub entries_checked: u64,
    /// Signatures that were checked and found valid
    pub signatures_checked: u64,
}

impl ChainVerification {
    /// Convert into a `Result`, yielding the entry count when valid
    ///
    /// # Errors
    /// Returns [`ChainIntegrityViolation`] when the chain is broken
    pub fn into_result(self) -> Result<u64, ChainIntegrityViolation> {
        match (self.broken_at, self.failure) {
            (Some(broken_at), Some(failure)) => Err(ChainIntegrityViolation { broken_at, failure }),
            _ => Ok(self.entries_checked),
        }
    }
}

/// Verify entries in commit order
///
/// Checks, for every entry `n`: `sequence == n`, `prev_hash` equals the
/// stored hash of entry `n - 1` (genesis for 0), the stored hash equals the
/// recomputed one, and, when `signer` is attesting, a valid signature over
/// the hash. Reports the first failing sequence.
pub fn verify_entries<'a, I>(entries: I, signer: &dyn EntrySigner) -> ChainVerification
where
    I: IntoIterator<Item = &'a AuditEntry>,
{
    let attesting = signer.is_attesting();
    let mut expected_prev = ChainHash::GENESIS;
    let mut checked = 0u64;
    let mut signatures = 0u64;

    for (position, entry) in (0u64..).zip(entries) {
        let failure = if entry.sequence != position {
            Some(IntegrityFailure::SequenceGap {
                found: entry.sequence,
            })
        } else if entry.prev_hash != expected_prev {
            Some(IntegrityFailure::BrokenLink)
        } else if entry.compute_hash() != entry.hash {
            Some(IntegrityFailure::HashMismatch)
        } else if attesting {
            match &entry.signature {
                None => Some(IntegrityFailure::SignatureMissing),
                Some(sig) if !signer.verify(entry.hash.as_bytes(), sig) => {
                    Some(IntegrityFailure::SignatureInvalid)
                }
                Some(_) => {
                    signatures += 1;
                    None
                }
            }
        } else {
            None
        };

        checked += 1;
        if let Some(failure) = failure {
            tracing::warn!(sequence = position, %failure, "audit chain verification failed");
            return ChainVerification {
                valid: false,
                broken_at: Some(position),
                failure: Some(failure),
                entries_checked: checked,
                signatures_checked: signatures,
            };
        }
        expected_prev = entry.hash;
    }

    ChainVerification {
        valid: true,
        broken_at: None,
        failure: None,
        entries_checked: checked,
        signatures_checked: signatures,
    }
}
