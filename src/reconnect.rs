//! Reconnect scheduling for unexpected disconnects.
//!
//! Retries use pure exponential backoff with no jitter and no ceiling other
//! than the attempt limit, so the wait sequence is exactly reproducible:
//! 1s, 2s, 4s, 8s, 16s with the default base delay. Manual closes never
//! schedule a retry, and a successful open resets the attempt counter.

use std::time::Duration;

/// Backoff schedule applied after an unexpected close or a failed dial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Retries attempted before giving up and staying closed.
    pub max_attempts: u32,
    /// Wait before the first retry; each later retry doubles it.
    pub base_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(1_000),
        }
    }
}

impl ReconnectPolicy {
    /// Whether another retry may be scheduled after `attempts_so_far`
    /// consecutive failures.
    pub fn allows(&self, attempts_so_far: u32) -> bool {
        attempts_so_far < self.max_attempts
    }

    /// Delay before retry number `attempt` (1-based): `base_delay * 2^(attempt-1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(31);
        let multiplier = 1u32 << shift;
        self.base_delay
            .checked_mul(multiplier)
            .unwrap_or(Duration::MAX)
    }
}
