//! Exponential backoff between transient transport failures.

use std::time::Duration;

/// Delay schedule: start at `initial`, double after every failure, never exceed `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// First delay.
    pub initial: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    /// Fresh schedule for one logical request.
    #[must_use]
    pub fn start(self) -> Backoff {
        Backoff {
            next: self.initial.min(self.max),
            max: self.max,
            retries: 0,
        }
    }
}

/// Running delay state for one request.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
    retries: u32,
}

impl Backoff {
    /// Delay before the next retry; advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = self.next.saturating_mul(2).min(self.max);
        self.retries = self.retries.saturating_add(1);
        delay
    }

    /// Retries scheduled so far.
    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.retries
    }
}
