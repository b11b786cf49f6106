//! Earliest-deadline-first queue of escalation timers
//!
//! At most one live timer per signal: scheduling a signal again replaces its
//! previous deadline. Cancelling is plain removal. Every change wakes the
//! scheduler task so it can recompute how long to sleep.

use mrp_types::SignalId;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct QueueState {
    by_deadline: BTreeSet<(Instant, SignalId)>,
    by_signal: HashMap<SignalId, Instant>,
}

/// Pending escalation deadlines
#[derive(Debug, Default)]
pub struct DeadlineQueue {
    state: Mutex<QueueState>,
    changed: Notify,
}

impl DeadlineQueue {
    /// Empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) the timer for `signal_id`
    pub fn schedule(&self, signal_id: SignalId, deadline: Instant) {
        {
            let mut state = self.state.lock();
            if let Some(previous) = state.by_signal.insert(signal_id, deadline) {
                state.by_deadline.remove(&(previous, signal_id));
            }
            state.by_deadline.insert((deadline, signal_id));
        }
        self.changed.notify_one();
    }

    /// Disarm the timer; returns whether one was live
    pub fn cancel(&self, signal_id: SignalId) -> bool {
        let removed = {
            let mut state = self.state.lock();
            match state.by_signal.remove(&signal_id) {
                Some(deadline) => state.by_deadline.remove(&(deadline, signal_id)),
                None => false,
            }
        };
        if removed {
            self.changed.notify_one();
        }
        removed
    }

    /// Remove and return every signal whose deadline is at or before `now`
    pub fn take_due(&self, now: Instant) -> Vec<SignalId> {
        let mut state = self.state.lock();
        let mut due = Vec::new();
        while let Some(&(deadline, signal_id)) = state.by_deadline.first() {
            if deadline > now {
                break;
            }
            state.by_deadline.pop_first();
            state.by_signal.remove(&signal_id);
            due.push(signal_id);
        }
        due
    }

    /// Earliest armed deadline
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.state.lock().by_deadline.first().map(|(deadline, _)| *deadline)
    }

    /// Whether a timer is live for `signal_id`
    #[must_use]
    pub fn contains(&self, signal_id: SignalId) -> bool {
        self.state.lock().by_signal.contains_key(&signal_id)
    }

    /// Number of live timers
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().by_signal.len()
    }

    /// Whether no timer is live
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves after the next change to the queue
    ///
    /// A change that happened while nobody was waiting is remembered, so a
    /// waiter never misses an update made between two polls.
    pub async fn changed(&self) {
        self.changed.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn due_entries_come_out_in_deadline_order() {
        let queue = DeadlineQueue::new();
        let now = Instant::now();
        let (a, b, c) = (SignalId::new(), SignalId::new(), SignalId::new());
        queue.schedule(a, now + Duration::from_secs(3));
        queue.schedule(b, now + Duration::from_secs(1));
        queue.schedule(c, now + Duration::from_secs(10));

        assert_eq!(queue.next_deadline(), Some(now + Duration::from_secs(1)));
        assert_eq!(queue.take_due(now + Duration::from_secs(5)), vec![b, a]);
        assert_eq!(queue.len(), 1);
        assert!(queue.contains(c));
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_the_timer() {
        let queue = DeadlineQueue::new();
        let now = Instant::now();
        let a = SignalId::new();
        queue.schedule(a, now + Duration::from_secs(1));
        queue.schedule(a, now + Duration::from_secs(60));

        assert_eq!(queue.len(), 1);
        assert!(queue.take_due(now + Duration::from_secs(2)).is_empty());
        assert_eq!(queue.next_deadline(), Some(now + Duration::from_secs(60)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_removes_once() {
        let queue = DeadlineQueue::new();
        let a = SignalId::new();
        queue.schedule(a, Instant::now());
        assert!(queue.cancel(a));
        assert!(!queue.cancel(a));
        assert!(queue.is_empty());
        assert_eq!(queue.next_deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn change_before_wait_is_not_lost() {
        let queue = DeadlineQueue::new();
        queue.schedule(SignalId::new(), Instant::now());
        tokio::time::timeout(Duration::from_millis(10), queue.changed())
            .await
            .expect("stored notification should complete immediately");
    }
}
