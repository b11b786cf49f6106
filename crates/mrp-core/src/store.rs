//! Signal record store and state machine
//!
//! Transitions: `PENDING -> RESOLVED` (intervention) and
//! `PENDING -> ESCALATED` (deadline). Each signal sits behind its own mutex;
//! the status check, the audit append and the in-memory mutation happen in
//! one critical section, in that order. If the append fails the signal is
//! left exactly as it was.
//!
//! Lock order is always signal, then chain, then deadline queue.

use crate::clock::Clock;
use crate::deadline::DeadlineQueue;
use crate::error::MrpError;
use crate::notify::Tier2Notifier;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use mrp_audit::{AuditChain, PersistenceError};
use mrp_types::{
    AuditEvent, EscalatedToTier2, Escalation, EscalationTier, InterventionLogged, Resolution,
    RiskReport, Signal, SignalId, SignalReceived, SignalState, ValidationError,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
struct SignalCell {
    /// Audit sequence of the `SIGNAL_RECEIVED` entry, orders equal timestamps
    intake_sequence: u64,
    signal: Mutex<Signal>,
}

/// Current state of every signal
#[derive(Debug)]
pub struct SignalStore {
    signals: DashMap<SignalId, Arc<SignalCell>>,
    chain: Arc<AuditChain>,
    deadlines: Arc<DeadlineQueue>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Tier2Notifier>,
    timeout: Duration,
}

impl SignalStore {
    /// Store over `chain`, arming timers on `deadlines`
    #[must_use]
    pub fn new(
        chain: Arc<AuditChain>,
        deadlines: Arc<DeadlineQueue>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Tier2Notifier>,
        timeout: Duration,
    ) -> Self {
        Self {
            signals: DashMap::new(),
            chain,
            deadlines,
            clock,
            notifier,
            timeout,
        }
    }

    /// Accept a report as a new PENDING signal
    ///
    /// # Errors
    /// - [`MrpError::Validation`] for a blank subject or description
    /// - [`MrpError::Persistence`] if the `SIGNAL_RECEIVED` append failed
    pub fn intake(&self, report: RiskReport) -> Result<Signal, MrpError> {
        report.validate()?;

        let id = SignalId::new();
        let created_at = self.clock.now();
        let deadline = self.wall_deadline(created_at);
        let event = AuditEvent::SignalReceived(SignalReceived {
            report: report.clone(),
            deadline,
        });

        let entry = self.chain.append(id, &event, created_at)?;
        let signal = Signal::pending(id, report, created_at, deadline);
        self.signals.insert(
            id,
            Arc::new(SignalCell {
                intake_sequence: entry.sequence,
                signal: Mutex::new(signal.clone()),
            }),
        );
        self.deadlines.schedule(id, Instant::now() + self.timeout);

        tracing::info!(
            signal_id = %id,
            sequence = entry.sequence,
            severity = %signal.report.severity,
            %deadline,
            "signal received"
        );
        Ok(signal)
    }

    /// Resolve a PENDING signal with a staff intervention
    ///
    /// # Errors
    /// - [`MrpError::Validation`] for a blank action or staff id
    /// - [`MrpError::NotFound`] for an unknown id
    /// - [`MrpError::AlreadyTerminal`] if the signal already left PENDING
    /// - [`MrpError::Persistence`] if the append failed; the signal stays PENDING
    pub fn record_intervention(
        &self,
        id: SignalId,
        action: &str,
        staff_id: &str,
        notes: Option<String>,
    ) -> Result<Signal, MrpError> {
        ValidationError::require_non_empty("action", action)?;
        ValidationError::require_non_empty("staff_id", staff_id)?;

        let cell = self.cell(id)?;
        let mut signal = cell.signal.lock();
        if !signal.is_pending() {
            tracing::info!(signal_id = %id, status = %signal.status(), "intervention rejected");
            return Err(MrpError::AlreadyTerminal {
                id,
                status: signal.status(),
            });
        }

        let resolved_at = self.clock.now();
        let event = AuditEvent::InterventionLogged(InterventionLogged {
            action: action.to_string(),
            staff_id: staff_id.to_string(),
            notes: notes.clone(),
            resolved_at,
            elapsed_ms: (resolved_at - signal.created_at).num_milliseconds(),
        });
        let entry = self.chain.append(id, &event, resolved_at)?;
        self.deadlines.cancel(id);

        signal.state = SignalState::Resolved(Resolution {
            action: action.to_string(),
            staff_id: staff_id.to_string(),
            notes,
            resolved_at,
        });
        tracing::info!(
            signal_id = %id,
            sequence = entry.sequence,
            %staff_id,
            status = %signal.status(),
            "intervention logged"
        );
        Ok(signal.clone())
    }

    /// Escalate a still-PENDING signal to tier 2
    ///
    /// Called by the scheduler when a deadline fires. Once the transition is
    /// committed and the signal lock released, tier-2 delivery is spawned on
    /// its own task; the caller never waits on the sink and a failed delivery
    /// is logged only. Outside a Tokio runtime delivery is skipped.
    ///
    /// # Errors
    /// - [`MrpError::NotFound`] for an unknown id
    /// - [`MrpError::AlreadyTerminal`] if an intervention won the race
    /// - [`MrpError::Persistence`] if the append failed; the signal stays PENDING
    pub fn escalate(&self, id: SignalId) -> Result<Signal, MrpError> {
        let signal = self.commit_escalation(id)?;
        if let Some(escalation) = signal.escalation() {
            self.dispatch_notification(id, escalation.clone());
        }
        Ok(signal)
    }

    fn dispatch_notification(&self, id: SignalId, escalation: Escalation) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(signal_id = %id, "no runtime, tier-2 notification skipped");
            return;
        };
        let notifier = Arc::clone(&self.notifier);
        runtime.spawn(async move {
            if let Err(err) = notifier.notify(id, &escalation).await {
                tracing::warn!(signal_id = %id, error = %err, "tier-2 notification failed");
            }
        });
    }

    fn commit_escalation(&self, id: SignalId) -> Result<Signal, MrpError> {
        let cell = self.cell(id)?;
        let mut signal = cell.signal.lock();
        if !signal.is_pending() {
            return Err(MrpError::AlreadyTerminal {
                id,
                status: signal.status(),
            });
        }

        let escalated_at = self.clock.now();
        let reason = format!(
            "No intervention logged within {} seconds",
            self.timeout.as_secs()
        );
        let event = AuditEvent::EscalatedToTier2(EscalatedToTier2 {
            target: EscalationTier::Tier2,
            reason: reason.clone(),
            escalated_at,
            timer_started_at: signal.created_at,
        });
        let entry = self.chain.append(id, &event, escalated_at)?;
        self.deadlines.cancel(id);

        signal.state = SignalState::Escalated(Escalation {
            escalated_at,
            target: EscalationTier::Tier2,
            reason,
        });
        tracing::warn!(
            signal_id = %id,
            sequence = entry.sequence,
            status = %signal.status(),
            "signal escalated"
        );
        Ok(signal.clone())
    }

    /// Current record of one signal
    ///
    /// # Errors
    /// Returns [`MrpError::NotFound`] for an unknown id
    pub fn get(&self, id: SignalId) -> Result<Signal, MrpError> {
        Ok(self.cell(id)?.signal.lock().clone())
    }

    /// Signals still awaiting intervention, oldest first
    #[must_use]
    pub fn list_pending(&self) -> Vec<Signal> {
        self.collect(Signal::is_pending)
    }

    /// Every signal, oldest first
    #[must_use]
    pub fn list_all(&self) -> Vec<Signal> {
        self.collect(|_| true)
    }

    /// Number of tracked signals
    #[must_use]
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    /// Whether no signal was ever accepted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Rebuild every signal by replaying the audit chain
    ///
    /// Meant for an empty store at startup. Every signal still PENDING
    /// afterwards has its timer re-armed for the time remaining; overdue
    /// signals are due immediately. Returns the pending signals.
    ///
    /// # Errors
    /// Returns [`MrpError::Persistence`] if a committed payload cannot be decoded
    pub fn restore(&self) -> Result<Vec<Signal>, MrpError> {
        let snapshot = self.chain.snapshot();
        for entry in &snapshot {
            let event = entry.event().map_err(|source| PersistenceError::Decode {
                sequence: entry.sequence,
                source,
            })?;
            match event {
                AuditEvent::SignalReceived(received) => {
                    let signal = Signal::pending(
                        entry.signal_id,
                        received.report,
                        entry.timestamp,
                        received.deadline,
                    );
                    self.signals.insert(
                        entry.signal_id,
                        Arc::new(SignalCell {
                            intake_sequence: entry.sequence,
                            signal: Mutex::new(signal),
                        }),
                    );
                }
                AuditEvent::InterventionLogged(logged) => {
                    let state = SignalState::Resolved(Resolution {
                        action: logged.action,
                        staff_id: logged.staff_id,
                        notes: logged.notes,
                        resolved_at: logged.resolved_at,
                    });
                    self.replay_terminal(entry.signal_id, entry.sequence, state);
                }
                AuditEvent::EscalatedToTier2(escalated) => {
                    let state = SignalState::Escalated(Escalation {
                        escalated_at: escalated.escalated_at,
                        target: escalated.target,
                        reason: escalated.reason,
                    });
                    self.replay_terminal(entry.signal_id, entry.sequence, state);
                }
            }
        }

        let now = self.clock.now();
        let pending = self.list_pending();
        for signal in &pending {
            let remaining = (signal.deadline - now).to_std().unwrap_or(Duration::ZERO);
            self.deadlines.schedule(signal.id, Instant::now() + remaining);
        }

        tracing::info!(
            signals = self.signals.len(),
            pending = pending.len(),
            entries = snapshot.len(),
            "signal store restored from audit chain"
        );
        Ok(pending)
    }

    fn replay_terminal(
        &self,
        id: SignalId,
        sequence: u64,
        state: SignalState,
    ) {
        let Some(cell) = self.signals.get(&id).map(|c| Arc::clone(c.value())) else {
            tracing::warn!(signal_id = %id, sequence, "transition for unknown signal ignored");
            return;
        };
        let mut signal = cell.signal.lock();
        if signal.is_pending() {
            signal.state = state;
        } else {
            tracing::warn!(signal_id = %id, sequence, "second transition ignored on replay");
        }
    }

    /// Timers armed by this store
    #[must_use]
    pub fn deadlines(&self) -> &Arc<DeadlineQueue> {
        &self.deadlines
    }

    /// Audit chain this store writes to
    #[must_use]
    pub fn chain(&self) -> &Arc<AuditChain> {
        &self.chain
    }

    /// Fixed escalation timeout
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn cell(&self, id: SignalId) -> Result<Arc<SignalCell>, MrpError> {
        self.signals
            .get(&id)
            .map(|c| Arc::clone(c.value()))
            .ok_or(MrpError::NotFound(id))
    }

    fn collect(&self, keep: impl Fn(&Signal) -> bool) -> Vec<Signal> {
        let mut cells: Vec<Arc<SignalCell>> =
            self.signals.iter().map(|c| Arc::clone(c.value())).collect();
        cells.sort_by_key(|c| c.intake_sequence);

        let mut signals: Vec<Signal> = cells
            .iter()
            .map(|c| c.signal.lock().clone())
            .filter(|s| keep(s))
            .collect();
        // stable: equal timestamps keep intake order
        signals.sort_by_key(|s| s.created_at);
        signals
    }

    fn wall_deadline(&self, created_at: DateTime<Utc>) -> DateTime<Utc> {
        let millis = i64::try_from(self.timeout.as_millis()).unwrap_or(i64::MAX);
        chrono::Duration::try_milliseconds(millis)
            .and_then(|d| created_at.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::notify::LoggingNotifier;
    use mrp_types::{EventType, Severity, SignalStatus};

    fn store() -> SignalStore {
        SignalStore::new(
            Arc::new(AuditChain::in_memory()),
            Arc::new(DeadlineQueue::new()),
            Arc::new(SystemClock),
            Arc::new(LoggingNotifier),
            Duration::from_secs(600),
        )
    }

    fn report() -> RiskReport {
        RiskReport::new("S1", "self-harm", Severity::Critical, "flagged text", "keywords")
    }

    #[tokio::test]
    async fn intake_creates_pending_with_deadline() {
        let store = store();
        let signal = store.intake(report()).unwrap();
        assert_eq!(signal.status(), SignalStatus::Pending);
        assert_eq!(signal.deadline - signal.created_at, chrono::Duration::minutes(10));
        assert!(store.deadlines().contains(signal.id));
        assert_eq!(store.chain().len(), 1);
    }

    #[tokio::test]
    async fn invalid_intake_touches_nothing() {
        let store = store();
        let mut bad = report();
        bad.description = "  ".into();
        let err = store.intake(bad).unwrap_err();
        assert!(matches!(err, MrpError::Validation(ValidationError::EmptyField("description"))));
        assert!(store.is_empty());
        assert!(store.chain().is_empty());
        assert!(store.deadlines().is_empty());
    }

    #[tokio::test]
    async fn intervention_resolves_and_cancels_timer() {
        let store = store();
        let signal = store.intake(report()).unwrap();
        let resolved = store
            .record_intervention(signal.id, "Parent Contacted", "ST1", Some("called".into()))
            .unwrap();
        assert_eq!(resolved.status(), SignalStatus::Resolved);
        assert_eq!(resolved.resolution().unwrap().staff_id, "ST1");
        assert!(!store.deadlines().contains(signal.id));

        let trail: Vec<_> = store.chain().entries_for(signal.id).collect();
        assert_eq!(trail[1].event_type, EventType::InterventionLogged);
    }

    #[tokio::test]
    async fn blank_action_is_rejected_before_lookup() {
        let store = store();
        let err = store
            .record_intervention(SignalId::new(), "", "ST1", None)
            .unwrap_err();
        assert!(matches!(err, MrpError::Validation(ValidationError::EmptyField("action"))));
    }

    #[tokio::test]
    async fn escalation_after_resolution_is_terminal_noop() {
        let store = store();
        let signal = store.intake(report()).unwrap();
        store.record_intervention(signal.id, "Counselor Meeting", "ST2", None).unwrap();

        let err = store.escalate(signal.id).unwrap_err();
        assert!(matches!(
            err,
            MrpError::AlreadyTerminal { status: SignalStatus::Resolved, .. }
        ));
        assert_eq!(store.chain().len(), 2);
    }

    #[tokio::test]
    async fn escalation_records_reason_and_timer_start() {
        let store = store();
        let signal = store.intake(report()).unwrap();
        let escalated = store.escalate(signal.id).unwrap();
        let escalation = escalated.escalation().unwrap();
        assert_eq!(escalation.reason, "No intervention logged within 600 seconds");

        let entry = store.chain().entries_for(signal.id).last().unwrap();
        match entry.event().unwrap() {
            AuditEvent::EscalatedToTier2(e) => assert_eq!(e.timer_started_at, signal.created_at),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_signal_is_not_found() {
        let store = store();
        let id = SignalId::new();
        assert!(matches!(store.get(id), Err(MrpError::NotFound(found)) if found == id));
        assert!(matches!(store.escalate(id), Err(MrpError::NotFound(_))));
    }

    #[tokio::test]
    async fn listings_are_ordered_by_intake() {
        let store = store();
        let a = store.intake(report()).unwrap();
        let b = store.intake(report()).unwrap();
        let c = store.intake(report()).unwrap();
        store.record_intervention(b.id, "Parent Contacted", "ST1", None).unwrap();

        let all: Vec<_> = store.list_all().into_iter().map(|s| s.id).collect();
        assert_eq!(all, vec![a.id, b.id, c.id]);
        let pending: Vec<_> = store.list_pending().into_iter().map(|s| s.id).collect();
        assert_eq!(pending, vec![a.id, c.id]);
    }

    #[tokio::test]
    async fn restore_replays_states() {
        let original = store();
        let a = original.intake(report()).unwrap();
        let b = original.intake(report()).unwrap();
        let c = original.intake(report()).unwrap();
        original.record_intervention(a.id, "Parent Contacted", "ST1", None).unwrap();
        original.escalate(b.id).unwrap();

        let restored = SignalStore::new(
            Arc::clone(original.chain()),
            Arc::new(DeadlineQueue::new()),
            Arc::new(SystemClock),
            Arc::new(LoggingNotifier),
            Duration::from_secs(600),
        );
        let pending = restored.restore().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, c.id);
        assert!(restored.deadlines().contains(c.id));
        assert_eq!(restored.get(a.id).unwrap(), original.get(a.id).unwrap());
        assert_eq!(restored.get(b.id).unwrap(), original.get(b.id).unwrap());
    }
}
