//! Exponential backoff with additive jitter for retryable failures.

use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;

/// Default upper bound (exclusive) on the random jitter added per failure.
pub const DEFAULT_JITTER_CEILING: Duration = Duration::from_secs(5);

/// Computes `next = current * 2 + uniform[0, jitter_ceiling)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    jitter_ceiling: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_JITTER_CEILING)
    }
}

impl RetryPolicy {
    /// Create a policy with the given jitter ceiling. Zero disables jitter.
    #[must_use]
    pub const fn new(jitter_ceiling: Duration) -> Self {
        Self { jitter_ceiling }
    }

    /// Upper bound (exclusive) on jitter.
    #[must_use]
    pub const fn jitter_ceiling(&self) -> Duration {
        self.jitter_ceiling
    }

    /// Next delay after a failure, using the thread-local RNG.
    #[must_use]
    pub fn next_delay(&self, current: Duration) -> Duration {
        self.next_delay_with(current, &mut rand::rng())
    }

    /// Next delay after a failure, drawing jitter from `rng`.
    pub fn next_delay_with<R: Rng>(&self, current: Duration, rng: &mut R) -> Duration {
        let ceiling = u64::try_from(self.jitter_ceiling.as_nanos()).unwrap_or(u64::MAX);
        let jitter = if ceiling == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(rng.random_range(0..ceiling))
        };
        current.saturating_mul(2).saturating_add(jitter)
    }
}

/// Backoff delay owned by a single resource.
///
/// Starts at zero. Only the resource's own lock guards it; the scheduler
/// advances it on retryable failures and never resets it. Resetting after a
/// successful load is up to the resource.
#[derive(Debug, Default)]
pub struct RetryState {
    load_delay: Mutex<Duration>,
}

impl RetryState {
    /// Fresh state with zero delay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current accumulated delay.
    #[must_use]
    pub fn current(&self) -> Duration {
        *self.load_delay.lock()
    }

    /// Advance the delay by one failure under the lock and return it.
    pub fn record_failure(&self, policy: &RetryPolicy) -> Duration {
        let mut delay = self.load_delay.lock();
        *delay = policy.next_delay(*delay);
        *delay
    }

    /// Drop accumulated backoff back to zero.
    pub fn reset(&self) {
        *self.load_delay.lock() = Duration::ZERO;
    }
}
