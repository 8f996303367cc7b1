//! Automatic reconnection policy.
//!
//! After an established connection is lost the transport retries on a fixed
//! schedule: immediately, then after 2, 10 and 30 seconds. When the schedule
//! is exhausted the connection is reported closed.

use std::time::Duration;

/// Default retry schedule in milliseconds.
pub const DEFAULT_RETRY_DELAYS_MS: [u64; 4] = [0, 2_000, 10_000, 30_000];

/// Walks a fixed list of retry delays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    delays: Vec<Duration>,
    attempt_count: usize,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_RETRY_DELAYS_MS
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
        )
    }
}

impl ReconnectPolicy {
    /// Policy retrying once per entry of `delays`.
    pub fn new(delays: Vec<Duration>) -> Self {
        Self {
            delays,
            attempt_count: 0,
        }
    }

    /// Delay before the next attempt, or `None` once the schedule is used up.
    pub fn next_delay(&mut self) -> Option<Duration> {
        let delay = self.delays.get(self.attempt_count).copied()?;
        self.attempt_count += 1;
        Some(delay)
    }

    /// Start over after a successful reconnect.
    pub fn reset(&mut self) {
        self.attempt_count = 0;
    }

    /// Attempts handed out since the last reset.
    pub fn attempt_count(&self) -> usize {
        self.attempt_count
    }

    /// Total number of attempts per outage.
    pub fn max_attempts(&self) -> usize {
        self.delays.len()
    }
}
