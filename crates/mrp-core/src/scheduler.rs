//! Escalation scheduler
//!
//! One task sleeps until the earliest armed deadline, a queue change or
//! shutdown, whichever comes first. Due signals are taken off the queue and
//! handed to [`SignalStore::escalate`]; the store decides whether the
//! signal is still PENDING. The queue lock is never held while escalating,
//! and tier-2 delivery runs on its own task so a slow sink cannot delay
//! the next deadline.

use crate::error::MrpError;
use crate::store::SignalStore;
use mrp_types::SignalId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Running scheduler task
///
/// Dropping the handle stops the task.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stop the task and wait for it to finish its current escalation
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::error!(error = %err, "escalation scheduler task failed");
            }
        }
    }

    /// Whether the task has exited
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Deadline-driven escalation loop
#[derive(Debug)]
pub struct EscalationScheduler {
    store: Arc<SignalStore>,
    retry_delay: Duration,
}

impl EscalationScheduler {
    /// Scheduler over `store`'s deadline queue
    #[must_use]
    pub fn new(store: Arc<SignalStore>, retry_delay: Duration) -> Self {
        Self { store, retry_delay }
    }

    /// Spawn the loop on the current Tokio runtime
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime
    #[must_use]
    pub fn spawn(self) -> SchedulerHandle {
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(self.run(rx));
        SchedulerHandle {
            shutdown: tx,
            task: Some(task),
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let queue = Arc::clone(self.store.deadlines());
        tracing::info!(
            armed = queue.len(),
            timeout_secs = self.store.timeout().as_secs(),
            "escalation scheduler started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            for signal_id in queue.take_due(Instant::now()) {
                self.fire(signal_id);
            }

            let next = queue.next_deadline();
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                () = queue.changed() => {}
                () = sleep_until(next) => {}
            }
        }

        tracing::info!(armed = queue.len(), "escalation scheduler stopped");
    }

    fn fire(&self, signal_id: SignalId) {
        match self.store.escalate(signal_id) {
            Ok(_) => {}
            Err(MrpError::AlreadyTerminal { status, .. }) => {
                tracing::debug!(%signal_id, %status, "deadline fired after resolution, ignored");
            }
            Err(MrpError::NotFound(_)) => {
                tracing::debug!(%signal_id, "deadline fired for unknown signal, ignored");
            }
            Err(err) if err.is_retryable() => {
                tracing::error!(
                    %signal_id,
                    error = %err,
                    retry_ms = u64::try_from(self.retry_delay.as_millis()).unwrap_or(u64::MAX),
                    "escalation failed, re-queued"
                );
                self.store
                    .deadlines()
                    .schedule(signal_id, Instant::now() + self.retry_delay);
            }
            Err(err) => {
                tracing::error!(%signal_id, error = %err, "escalation failed");
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::AnchoredClock;
    use crate::deadline::DeadlineQueue;
    use crate::notify::{ChannelNotifier, NotifyError, Tier2Alert, Tier2Notifier};
    use async_trait::async_trait;
    use mrp_audit::AuditChain;
    use mrp_types::{Escalation, RiskReport, Severity, SignalStatus};
    use tokio::sync::mpsc::UnboundedReceiver;

    /// Sink that takes five minutes per delivery
    #[derive(Debug)]
    struct SlowNotifier;

    #[async_trait]
    impl Tier2Notifier for SlowNotifier {
        async fn notify(&self, _: SignalId, _: &Escalation) -> Result<(), NotifyError> {
            tokio::time::sleep(Duration::from_secs(300)).await;
            Ok(())
        }
    }

    fn store(timeout: Duration) -> (Arc<SignalStore>, UnboundedReceiver<Tier2Alert>) {
        let (notifier, rx) = ChannelNotifier::channel();
        let store = SignalStore::new(
            Arc::new(AuditChain::in_memory()),
            Arc::new(DeadlineQueue::new()),
            Arc::new(AnchoredClock::starting_now()),
            Arc::new(notifier),
            timeout,
        );
        (Arc::new(store), rx)
    }

    fn report() -> RiskReport {
        RiskReport::new("S1", "bullying", Severity::High, "flagged", "keywords")
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_escalates_pending_signal() {
        let (store, mut alerts) = store(Duration::from_secs(60));
        let _handle = EscalationScheduler::new(Arc::clone(&store), Duration::from_secs(1)).spawn();

        let signal = store.intake(report()).unwrap();
        let alert = alerts.recv().await.unwrap();

        assert_eq!(alert.signal_id, signal.id);
        assert_eq!(store.get(signal.id).unwrap().status(), SignalStatus::Escalated);
        let waited = alert.escalation.escalated_at - signal.created_at;
        assert!(waited >= chrono::Duration::seconds(60));
        assert!(waited < chrono::Duration::seconds(61));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_the_task() {
        let (store, mut alerts) = store(Duration::from_secs(5));
        let handle = EscalationScheduler::new(Arc::clone(&store), Duration::from_secs(1)).spawn();
        drop(handle);

        let signal = store.intake(report()).unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(alerts.try_recv().is_err());
        assert_eq!(store.get(signal.id).unwrap().status(), SignalStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_waits_for_the_task() {
        let (store, _alerts) = store(Duration::from_secs(5));
        let handle = EscalationScheduler::new(store, Duration::from_secs(1)).spawn();
        tokio::task::yield_now().await;
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn slow_notifier_does_not_delay_later_deadlines() {
        let store = Arc::new(SignalStore::new(
            Arc::new(AuditChain::in_memory()),
            Arc::new(DeadlineQueue::new()),
            Arc::new(AnchoredClock::starting_now()),
            Arc::new(SlowNotifier),
            Duration::from_secs(60),
        ));
        let _handle = EscalationScheduler::new(Arc::clone(&store), Duration::from_secs(1)).spawn();
        let start = Instant::now();

        let first = store.intake(report()).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        let second = store.intake(report()).unwrap();

        tokio::time::sleep_until(start + Duration::from_secs(120)).await;
        assert_eq!(store.get(first.id).unwrap().status(), SignalStatus::Escalated);
        assert_eq!(store.get(second.id).unwrap().status(), SignalStatus::Escalated);

        let late = store.get(second.id).unwrap().escalation().unwrap().escalated_at
            - second.created_at;
        assert!(late < chrono::Duration::seconds(61));
    }
}
