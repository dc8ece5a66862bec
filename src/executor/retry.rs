//! Bounded exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Default number of attempts per task (initial call + retries).
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry.
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Default cap on a single backoff delay.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Default jitter factor applied multiplicatively to each delay.
const DEFAULT_JITTER: f64 = 0.2;

/// Retry policy for transient collaborator failures.
///
/// Delays grow exponentially (`base * 2^(attempt-1)`, capped at
/// `max_delay`) and carry multiplicative jitter so that many items
/// retrying against the same rate-limited collaborator do not fire in
/// lockstep.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay, pre-jitter.
    pub max_delay: Duration,
    /// Jitter factor in [0.0, 1.0); each delay is scaled by a random
    /// value in `[1 - jitter, 1 + jitter]`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter: DEFAULT_JITTER,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given attempt budget and default delays.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Sets the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the delay cap.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the jitter factor.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Policy with zero delays, for deterministic tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: 0.0,
        }
    }

    /// Delay to sleep after the `attempt`-th failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let scaled = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay);

        if self.jitter <= 0.0 || scaled.is_zero() {
            return scaled;
        }

        let factor = rand::thread_rng().gen_range(1.0 - self.jitter..=1.0 + self.jitter);
        scaled.mul_f64(factor)
    }
}
