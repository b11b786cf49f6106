//! Testing utilities for MRP workspace
//!
//! Shared fixtures, a storage backend that fails on demand, and helpers for
//! driving the service under paused tokio time.

#![allow(missing_docs)]

use chrono::{DateTime, TimeZone, Utc};
use mrp_audit::{AuditEntry, ChainStorage, PersistenceError};
use mrp_core::{
    AnchoredClock, ChannelNotifier, LogInterventionRequest, MrpConfig, MrpService,
    SubmitSignalRequest, Tier2Alert,
};
use mrp_types::{RiskReport, Severity};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// Fixed wall-clock anchor so timestamps are reproducible
pub fn anchor() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap()
}

pub fn report(subject: &str) -> RiskReport {
    RiskReport::new(subject, "self-harm", Severity::Critical, "flagged message", "keywords")
}

pub fn submit_request(subject: &str) -> SubmitSignalRequest {
    SubmitSignalRequest {
        subject_id: subject.to_string(),
        risk_type: "self-harm".to_string(),
        severity: "CRITICAL".to_string(),
        description: "flagged message".to_string(),
        detected_by: "keywords".to_string(),
        ..Default::default()
    }
}

pub fn intervention(staff_id: &str) -> LogInterventionRequest {
    LogInterventionRequest {
        action: "Parent Contacted".to_string(),
        staff_id: staff_id.to_string(),
        notes: Some("spoke with guardian".to_string()),
    }
}

/// Memory storage that fails every persist while `failing` is set
#[derive(Debug, Default)]
pub struct FlakyStorage {
    failing: AtomicBool,
    persisted: Mutex<Vec<AuditEntry>>,
}

impl FlakyStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn persisted(&self) -> usize {
        self.persisted.lock().len()
    }
}

impl ChainStorage for FlakyStorage {
    fn load(&self) -> Result<Vec<AuditEntry>, PersistenceError> {
        Ok(self.persisted.lock().clone())
    }

    fn persist(&self, entry: &AuditEntry) -> Result<(), PersistenceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("injected failure".into()));
        }
        self.persisted.lock().push(entry.clone());
        Ok(())
    }
}

/// Service plus its tier-2 alert stream
pub struct Harness {
    pub service: MrpService,
    pub alerts: UnboundedReceiver<Tier2Alert>,
}

/// Config with a short timeout and retry delay
pub fn config(timeout: Duration) -> MrpConfig {
    MrpConfig::new()
        .with_escalation_timeout(timeout)
        .with_retry_delay(Duration::from_millis(500))
}

/// Start a service on an anchored clock and a channel notifier
///
/// Call from a `#[tokio::test(start_paused = true)]` test.
pub fn start(config: MrpConfig) -> Harness {
    start_with_storage(config, None)
}

pub fn start_with_storage(config: MrpConfig, storage: Option<Arc<dyn ChainStorage>>) -> Harness {
    let (notifier, alerts) = ChannelNotifier::channel();
    let mut builder = MrpService::builder(config)
        .clock(Arc::new(AnchoredClock::new(anchor())))
        .notifier(Arc::new(notifier));
    if let Some(storage) = storage {
        builder = builder.storage(storage);
    }
    Harness {
        service: builder.start().unwrap(),
        alerts,
    }
}

/// Let spawned tasks run without advancing time
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
