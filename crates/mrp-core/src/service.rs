//! Intake/intervention boundary
//!
//! [`MrpService`] owns the audit chain, the signal store and the escalation
//! scheduler. Routers call into it with raw requests and get typed receipts
//! or a [`BoundaryError`] back.

use crate::boundary::{
    parse_signal_id, AuditEntryView, BoundaryError, InterventionReceipt, LogInterventionRequest,
    SignalView, SubmitReceipt, SubmitSignalRequest,
};
use crate::clock::{Clock, SystemClock};
use crate::config::MrpConfig;
use crate::deadline::DeadlineQueue;
use crate::error::MrpError;
use crate::notify::{LoggingNotifier, Tier2Notifier};
use crate::scheduler::{EscalationScheduler, SchedulerHandle};
use crate::store::SignalStore;
use mrp_audit::{
    AuditChain, ChainHash, ChainStatistics, ChainStorage, ChainVerification, EntrySigner,
    JournalStorage, MemoryStorage, NoopSigner,
};
use mrp_types::SignalStatus;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Liveness summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// `healthy`, or `degraded` when the chain fails verification
    pub status: String,
    /// Chain verification result
    pub chain_valid: bool,
    /// Committed audit entries
    pub chain_length: u64,
    /// Current head hash
    pub head: ChainHash,
    /// Signals ever accepted
    pub total_signals: u64,
    /// Signals awaiting intervention
    pub pending_signals: u64,
    /// Whether the escalation scheduler is running
    pub scheduler_running: bool,
}

/// Builder for [`MrpService`]
#[derive(Debug)]
pub struct MrpServiceBuilder {
    config: MrpConfig,
    clock: Option<Arc<dyn Clock>>,
    storage: Option<Arc<dyn ChainStorage>>,
    signer: Option<Arc<dyn EntrySigner>>,
    notifier: Option<Arc<dyn Tier2Notifier>>,
}

impl MrpServiceBuilder {
    /// With timestamp source (default [`SystemClock`])
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// With chain storage, overriding `journal_path`
    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn ChainStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// With entry signer (default [`NoopSigner`])
    #[must_use]
    pub fn signer(mut self, signer: Arc<dyn EntrySigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// With tier-2 sink (default [`LoggingNotifier`])
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn Tier2Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Open the chain, restore signals and start the scheduler
    ///
    /// Signals left PENDING by a previous run are re-armed; those already
    /// past their deadline escalate as soon as the scheduler runs.
    ///
    /// # Errors
    /// - [`MrpError::Config`] for invalid configuration
    /// - [`MrpError::Persistence`] if storage cannot be opened or replayed
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime
    pub fn start(self) -> Result<MrpService, MrpError> {
        self.config.validate()?;

        let storage: Arc<dyn ChainStorage> = match (self.storage, &self.config.journal_path) {
            (Some(storage), _) => storage,
            (None, Some(path)) => Arc::new(JournalStorage::open(path)?),
            (None, None) => Arc::new(MemoryStorage),
        };
        let signer = self.signer.unwrap_or_else(|| Arc::new(NoopSigner));
        let chain = Arc::new(AuditChain::open(storage, signer)?);

        let store = Arc::new(SignalStore::new(
            Arc::clone(&chain),
            Arc::new(DeadlineQueue::new()),
            self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            self.notifier.unwrap_or_else(|| Arc::new(LoggingNotifier)),
            self.config.escalation_timeout(),
        ));
        let pending = store.restore()?;

        let scheduler =
            EscalationScheduler::new(Arc::clone(&store), self.config.retry_delay()).spawn();

        tracing::info!(
            timeout_ms = self.config.escalation_timeout_ms,
            chain_length = chain.len(),
            pending = pending.len(),
            journal = ?self.config.journal_path,
            "mrp service started"
        );
        Ok(MrpService {
            config: self.config,
            chain,
            store,
            scheduler: Mutex::new(Some(scheduler)),
        })
    }
}

/// Boundary façade over store, chain and scheduler
#[derive(Debug)]
pub struct MrpService {
    config: MrpConfig,
    chain: Arc<AuditChain>,
    store: Arc<SignalStore>,
    scheduler: Mutex<Option<SchedulerHandle>>,
}

impl MrpService {
    /// Builder with `config`
    #[must_use]
    pub fn builder(config: MrpConfig) -> MrpServiceBuilder {
        MrpServiceBuilder {
            config,
            clock: None,
            storage: None,
            signer: None,
            notifier: None,
        }
    }

    /// Accept a risk report
    ///
    /// # Errors
    /// Returns a 400 for malformed input and a 500 if the audit append failed
    pub fn submit_signal(
        &self,
        request: SubmitSignalRequest,
    ) -> Result<SubmitReceipt, BoundaryError> {
        let report = request.into_report()?;
        let signal = self.store.intake(report)?;
        Ok(SubmitReceipt {
            id: signal.id,
            status: signal.status(),
            deadline: signal.deadline,
        })
    }

    /// Record a staff intervention
    ///
    /// # Errors
    /// Returns a 400, 404, 409 or 500 per [`crate::ErrorKind::status_code`]
    pub fn log_intervention(
        &self,
        signal_id: &str,
        request: LogInterventionRequest,
    ) -> Result<InterventionReceipt, BoundaryError> {
        let id = parse_signal_id(signal_id)?;
        let notes = request.notes.filter(|n| !n.trim().is_empty());
        let signal = self
            .store
            .record_intervention(id, &request.action, &request.staff_id, notes)?;
        Ok(InterventionReceipt {
            id: signal.id,
            status: signal.status(),
        })
    }

    /// One signal
    ///
    /// # Errors
    /// Returns a 400 for a malformed id and a 404 for an unknown one
    pub fn get_signal(&self, signal_id: &str) -> Result<SignalView, BoundaryError> {
        let id = parse_signal_id(signal_id)?;
        Ok(self.store.get(id)?.into())
    }

    /// Signals awaiting intervention, oldest first
    #[must_use]
    pub fn list_pending(&self) -> Vec<SignalView> {
        self.store.list_pending().into_iter().map(Into::into).collect()
    }

    /// Every signal, oldest first
    #[must_use]
    pub fn list_signals(&self) -> Vec<SignalView> {
        self.store.list_all().into_iter().map(Into::into).collect()
    }

    /// Audit trail of one signal in commit order
    ///
    /// # Errors
    /// Returns a 400 for a malformed id and a 404 for an unknown one
    pub fn audit_trail(&self, signal_id: &str) -> Result<Vec<AuditEntryView>, BoundaryError> {
        let id = parse_signal_id(signal_id)?;
        self.store.get(id)?;
        Ok(self.chain.entries_for(id).map(|e| AuditEntryView::from(&e)).collect())
    }

    /// Newest entries first; `None` uses the configured window
    #[must_use]
    pub fn recent_audit(&self, limit: Option<usize>) -> Vec<AuditEntryView> {
        let limit = limit.unwrap_or(self.config.recent_entries_limit);
        self.chain
            .recent_entries(limit)
            .iter()
            .map(AuditEntryView::from)
            .collect()
    }

    /// Full chain verification
    #[must_use]
    pub fn verify_chain(&self) -> ChainVerification {
        self.chain.verify()
    }

    /// Verify and fail on tampering
    ///
    /// # Errors
    /// Returns [`MrpError::Integrity`] with the first broken sequence
    pub fn ensure_chain_intact(&self) -> Result<u64, MrpError> {
        Ok(self.chain.verify().into_result()?)
    }

    /// Entry counts and chain validity
    #[must_use]
    pub fn audit_statistics(&self) -> ChainStatistics {
        self.chain.statistics()
    }

    /// Liveness summary
    #[must_use]
    pub fn health(&self) -> HealthReport {
        let chain_valid = self.chain.verify().valid;
        let signals = self.store.list_all();
        let pending = signals
            .iter()
            .filter(|s| s.status() == SignalStatus::Pending)
            .count();
        let scheduler_running = self
            .scheduler
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished());
        HealthReport {
            status: if chain_valid { "healthy" } else { "degraded" }.to_string(),
            chain_valid,
            chain_length: self.chain.len() as u64,
            head: self.chain.head(),
            total_signals: signals.len() as u64,
            pending_signals: pending as u64,
            scheduler_running,
        }
    }

    /// Stop the scheduler; store state is left untouched
    pub async fn shutdown(&self) {
        let handle = self.scheduler.lock().take();
        if let Some(handle) = handle {
            handle.shutdown().await;
            tracing::info!(pending = self.store.list_pending().len(), "mrp service stopped");
        }
    }

    /// Underlying store
    #[must_use]
    pub fn store(&self) -> &Arc<SignalStore> {
        &self.store
    }

    /// Underlying audit chain
    #[must_use]
    pub fn chain(&self) -> &Arc<AuditChain> {
        &self.chain
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &MrpConfig {
        &self.config
    }
}
