//! Bounded polling. Every wait in this crate is a deadline plus a sleep
//! interval; there is no push notification from the browser.

use std::time::Duration;
use tokio::time::Instant;

/// A budget/interval pair for a polling loop.
///
/// Uses the tokio clock so tests can run with paused time.
#[derive(Debug)]
pub struct Poller {
    deadline: Instant,
    interval: Duration,
}

impl Poller {
    pub fn new(budget: Duration, interval: Duration) -> Self {
        Self {
            deadline: Instant::now() + budget,
            interval,
        }
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Sleep one interval (clamped to the remaining budget).
    pub async fn wait(&self) {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        tokio::time::sleep(self.interval.min(remaining)).await;
    }
}
