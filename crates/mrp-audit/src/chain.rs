//! The audit chain
//!
//! A single global, append-only sequence of hash-linked entries. The chain
//! head is owned here and only moves inside [`AuditChain::append`], which is
//! serialized by one writer lock. Readers work on persistent-vector
//! snapshots, so they always see a committed prefix and never block the
//! writer for longer than a pointer swap.

use crate::entry::{entry_hash, AuditEntry};
use crate::error::PersistenceError;
use crate::hash::ChainHash;
use crate::signer::{EntrySigner, NoopSigner};
use crate::storage::{ChainStorage, MemoryStorage};
use crate::verify::{verify_entries, ChainVerification};
use chrono::{DateTime, Utc};
use mrp_types::{AuditEvent, EventType, SignalId};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
struct ChainState {
    entries: im::Vector<AuditEntry>,
    by_signal: im::HashMap<SignalId, im::Vector<u64>>,
}

impl ChainState {
    fn head(&self) -> ChainHash {
        self.entries.last().map_or(ChainHash::GENESIS, |e| e.hash)
    }

    fn push(&mut self, entry: AuditEntry) {
        self.by_signal
            .entry(entry.signal_id)
            .or_insert_with(im::Vector::new)
            .push_back(entry.sequence);
        self.entries.push_back(entry);
    }
}

/// Aggregate view of the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStatistics {
    /// Committed entries
    pub total_entries: u64,
    /// Distinct signals referenced
    pub unique_signals: u64,
    /// Entry count per event type
    pub events_by_type: BTreeMap<EventType, u64>,
    /// Result of a full verification
    pub chain_valid: bool,
    /// Current head hash
    pub head: ChainHash,
}

impl ChainStatistics {
    /// Statistics over an arbitrary entry sequence
    #[must_use]
    pub fn collect<'a, I>(entries: I, chain_valid: bool) -> Self
    where
        I: IntoIterator<Item = &'a AuditEntry>,
    {
        let mut total = 0u64;
        let mut signals = HashSet::new();
        let mut by_type = BTreeMap::new();
        let mut head = ChainHash::GENESIS;
        for entry in entries {
            total += 1;
            signals.insert(entry.signal_id);
            *by_type.entry(entry.event_type).or_insert(0) += 1;
            head = entry.hash;
        }
        Self {
            total_entries: total,
            unique_signals: signals.len() as u64,
            events_by_type: by_type,
            chain_valid,
            head,
        }
    }
}

/// Append-only, hash-linked audit log
#[derive(Debug)]
pub struct AuditChain {
    storage: Arc<dyn ChainStorage>,
    signer: Arc<dyn EntrySigner>,
    append_lock: Mutex<()>,
    state: RwLock<ChainState>,
}

impl AuditChain {
    /// Empty chain without durable storage or signing
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            storage: Arc::new(MemoryStorage),
            signer: Arc::new(NoopSigner),
            append_lock: Mutex::new(()),
            state: RwLock::new(ChainState::default()),
        }
    }

    /// Open a chain over `storage`, loading committed entries
    ///
    /// Loaded history is not rewritten even if it fails verification; the
    /// failure is logged and remains visible through [`AuditChain::verify`].
    ///
    /// # Errors
    /// Returns [`PersistenceError`] if storage cannot be read
    pub fn open(
        storage: Arc<dyn ChainStorage>,
        signer: Arc<dyn EntrySigner>,
    ) -> Result<Self, PersistenceError> {
        let mut state = ChainState::default();
        for entry in storage.load()? {
            state.push(entry);
        }

        let report = verify_entries(state.entries.iter(), signer.as_ref());
        if report.valid {
            tracing::info!(
                entries = state.entries.len(),
                head = %state.head().short(),
                "audit chain opened"
            );
        } else {
            tracing::error!(
                entries = state.entries.len(),
                broken_at = ?report.broken_at,
                "audit chain opened with integrity violation"
            );
        }

        Ok(Self {
            storage,
            signer,
            append_lock: Mutex::new(()),
            state: RwLock::new(state),
        })
    }

    /// Commit one event and return the entry
    ///
    /// The entry is persisted before the head advances; if storage fails
    /// the chain is left exactly as it was.
    ///
    /// # Errors
    /// Returns [`PersistenceError`] if the payload cannot be encoded or the
    /// storage rejects the write
    pub fn append(
        &self,
        signal_id: SignalId,
        event: &AuditEvent,
        timestamp: DateTime<Utc>,
    ) -> Result<AuditEntry, PersistenceError> {
        let payload = event.canonical_payload().map_err(PersistenceError::Encode)?;
        let event_type = event.event_type();

        let _writer = self.append_lock.lock();
        let (sequence, prev_hash) = {
            let state = self.state.read();
            (state.entries.len() as u64, state.head())
        };

        let hash = entry_hash(&prev_hash, signal_id, event_type, &timestamp, &payload, sequence);
        let entry = AuditEntry {
            sequence,
            signal_id,
            event_type,
            timestamp,
            payload,
            prev_hash,
            hash,
            signature: self.signer.sign(hash.as_bytes()),
        };

        if let Err(err) = self.storage.persist(&entry) {
            tracing::error!(%signal_id, sequence, error = %err, "audit append failed");
            return Err(err);
        }

        self.state.write().push(entry.clone());
        tracing::debug!(%signal_id, sequence, %event_type, hash = %hash.short(), "audit entry committed");
        Ok(entry)
    }

    /// Hash of the newest entry (genesis when empty)
    #[must_use]
    pub fn head(&self) -> ChainHash {
        self.state.read().head()
    }

    /// Number of committed entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// Whether nothing has been committed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consistent copy of the whole chain (O(1))
    #[must_use]
    pub fn snapshot(&self) -> im::Vector<AuditEntry> {
        self.state.read().entries.clone()
    }

    /// Entries for one signal, oldest first
    ///
    /// The iterator works on a snapshot taken now; calling again after more
    /// appends yields the longer history.
    #[must_use]
    pub fn entries_for(&self, signal_id: SignalId) -> SignalTrail {
        let state = self.state.read();
        SignalTrail {
            entries: state.entries.clone(),
            positions: state.by_signal.get(&signal_id).cloned().unwrap_or_default(),
            cursor: 0,
        }
    }

    /// Up to `limit` entries, newest first
    #[must_use]
    pub fn recent_entries(&self, limit: usize) -> Vec<AuditEntry> {
        self.snapshot().iter().rev().take(limit).cloned().collect()
    }

    /// Recompute every hash and link
    #[must_use]
    pub fn verify(&self) -> ChainVerification {
        let snapshot = self.snapshot();
        verify_entries(snapshot.iter(), self.signer.as_ref())
    }

    /// Counts and validity of the current chain
    #[must_use]
    pub fn statistics(&self) -> ChainStatistics {
        let snapshot = self.snapshot();
        let valid = verify_entries(snapshot.iter(), self.signer.as_ref()).valid;
        ChainStatistics::collect(snapshot.iter(), valid)
    }

    /// Signer in use
    #[must_use]
    pub fn signer(&self) -> &Arc<dyn EntrySigner> {
        &self.signer
    }
}

impl Default for AuditChain {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Lazy, finite view of one signal's entries
#[derive(Debug, Clone)]
pub struct SignalTrail {
    entries: im::Vector<AuditEntry>,
    positions: im::Vector<u64>,
    cursor: usize,
}

impl Iterator for SignalTrail {
    type Item = AuditEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let position = *self.positions.get(self.cursor)?;
        self.cursor += 1;
        usize::try_from(position)
            .ok()
            .and_then(|idx| self.entries.get(idx))
            .cloned()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.positions.len().saturating_sub(self.cursor);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SignalTrail {}
