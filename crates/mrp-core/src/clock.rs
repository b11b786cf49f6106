//! Wall-clock source for timestamps
//!
//! Deadlines are enforced on tokio's monotonic clock; the [`Clock`] only
//! supplies the wall-clock times written into signals and audit entries.

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Source of commit timestamps
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current wall-clock time
    fn now(&self) -> DateTime<Utc>;
}

/// System wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall-clock anchor advanced by tokio's monotonic clock
///
/// Under paused tokio time this yields timestamps that move exactly with
/// `tokio::time::advance`, which keeps scheduler tests deterministic.
#[derive(Debug, Clone, Copy)]
pub struct AnchoredClock {
    wall: DateTime<Utc>,
    start: Instant,
}

impl AnchoredClock {
    /// Anchor `wall` to the current tokio instant
    #[must_use]
    pub fn new(wall: DateTime<Utc>) -> Self {
        Self {
            wall,
            start: Instant::now(),
        }
    }

    /// Anchor the current system time
    #[must_use]
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for AnchoredClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.start.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.wall + elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn anchored_clock_follows_tokio_time() {
        let wall = Utc::now();
        let clock = AnchoredClock::new(wall);
        assert_eq!(clock.now(), wall);

        tokio::time::advance(Duration::from_secs(90)).await;
        assert_eq!(clock.now(), wall + chrono::Duration::seconds(90));
    }
}
