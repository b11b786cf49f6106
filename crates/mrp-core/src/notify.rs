//! Tier-2 notification sink
//!
//! Called after an escalation has been committed. Delivery is best-effort:
//! a failed notification is logged and never rolls back the escalation.

use async_trait::async_trait;
use mrp_types::{Escalation, SignalId};
use tokio::sync::mpsc;

/// Notification delivery failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("tier-2 notification failed: {0}")]
pub struct NotifyError(pub String);

/// Receiver of committed escalations
#[async_trait]
pub trait Tier2Notifier: Send + Sync + std::fmt::Debug {
    /// Deliver one escalation
    ///
    /// # Errors
    /// Returns [`NotifyError`] if delivery failed
    async fn notify(&self, signal_id: SignalId, escalation: &Escalation)
        -> Result<(), NotifyError>;
}

/// Default sink: a warning-level log event
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Tier2Notifier for LoggingNotifier {
    async fn notify(
        &self,
        signal_id: SignalId,
        escalation: &Escalation,
    ) -> Result<(), NotifyError> {
        tracing::warn!(
            %signal_id,
            target_tier = %escalation.target,
            reason = %escalation.reason,
            "signal escalated to tier 2"
        );
        Ok(())
    }
}

/// Escalation as delivered through a [`ChannelNotifier`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tier2Alert {
    /// Escalated signal
    pub signal_id: SignalId,
    /// Escalation details
    pub escalation: Escalation,
}

/// Sink that forwards alerts over a tokio channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Tier2Alert>,
}

impl ChannelNotifier {
    /// Notifier and the receiving end of its channel
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Tier2Alert>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Tier2Notifier for ChannelNotifier {
    async fn notify(
        &self,
        signal_id: SignalId,
        escalation: &Escalation,
    ) -> Result<(), NotifyError> {
        self.tx
            .send(Tier2Alert {
                signal_id,
                escalation: escalation.clone(),
            })
            .map_err(|_| NotifyError("alert receiver dropped".into()))
    }
}
