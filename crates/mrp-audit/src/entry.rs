//! Committed audit entries and their chain hash

use crate::hash::{ChainHash, FieldHasher};
use crate::signer::EntrySignature;
use chrono::{DateTime, SecondsFormat, Utc};
use mrp_types::{AuditEvent, EventType, SignalId};
use serde::{Deserialize, Serialize};

/// One committed, immutable audit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the global chain, starting at 0
    pub sequence: u64,
    /// Signal this entry concerns
    pub signal_id: SignalId,
    /// Event discriminant
    pub event_type: EventType,
    /// Commit time
    pub timestamp: DateTime<Utc>,
    /// Canonical JSON of the event payload
    pub payload: String,
    /// Hash of the preceding entry
    pub prev_hash: ChainHash,
    /// Hash over this entry's fields and `prev_hash`
    pub hash: ChainHash,
    /// Signer output over `hash`, if a signer was configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<EntrySignature>,
}

impl AuditEntry {
    /// Recompute the hash from the stored fields
    #[must_use]
    pub fn compute_hash(&self) -> ChainHash {
        entry_hash(
            &self.prev_hash,
            self.signal_id,
            self.event_type,
            &self.timestamp,
            &self.payload,
            self.sequence,
        )
    }

    /// Decode the typed event
    ///
    /// # Errors
    /// Returns the deserializer error if the payload does not match `event_type`
    pub fn event(&self) -> Result<AuditEvent, serde_json::Error> {
        AuditEvent::decode(self.event_type, &self.payload)
    }
}

pub(crate) fn entry_hash(
    prev_hash: &ChainHash,
    signal_id: SignalId,
    event_type: EventType,
    timestamp: &DateTime<Utc>,
    payload: &str,
    sequence: u64,
) -> ChainHash {
    let mut hasher = FieldHasher::new();
    hasher
        .fixed(prev_hash.as_bytes())
        .fixed(signal_id.as_bytes())
        .field(event_type.as_str().as_bytes())
        .field(
            timestamp
                .to_rfc3339_opts(SecondsFormat::Nanos, true)
                .as_bytes(),
        )
        .field(payload.as_bytes())
        .fixed(&sequence.to_le_bytes());
    hasher.finish()
}
