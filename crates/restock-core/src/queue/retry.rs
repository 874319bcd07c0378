//! Retry policy: decides backoff delays for Notification Source fetches.

use std::time::Duration;

use rand::Rng;

/// Bounded retry with exponential backoff.
///
/// `max_attempts` counts the first try, so `max_attempts = 1` means
/// "never retry".
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Backoff multiplier for exponential backoff.
    pub multiplier: f64,

    /// Upper bound of the random extra delay, as a fraction of the computed
    /// delay. Within 0.0..=1.0; 0.0 disables jitter.
    pub jitter: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            multiplier,
            jitter: 0.1,
        }
    }

    /// Fail on the first error, no waiting.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, 1.0).with_jitter(0.0)
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = if jitter.is_nan() { 0.0 } else { jitter.clamp(0.0, 1.0) };
        self
    }

    /// Delay after the `attempts`-th failure (1-indexed), without jitter.
    ///
    /// delay = base_delay * multiplier^(attempts - 1)
    ///
    /// With base_delay=2s, multiplier=2.0: 2s, 4s, 8s, 16s, ...
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let base_secs = self.base_delay.as_secs_f64();
        let delay_secs = base_secs * self.multiplier.powi(attempts.saturating_sub(1) as i32);
        Duration::try_from_secs_f64(delay_secs).unwrap_or(Duration::MAX)
    }

    /// `next_delay` plus up to `jitter * next_delay` of random slack.
    pub fn delay_with_jitter(&self, attempts: u32) -> Duration {
        let delay = self.next_delay(attempts);
        if self.jitter <= 0.0 || delay.is_zero() {
            return delay;
        }
        let extra = rand::thread_rng().gen_range(0.0..=self.jitter);
        let slack =
            Duration::try_from_secs_f64(delay.as_secs_f64() * extra).unwrap_or(Duration::MAX);
        delay.saturating_add(slack)
    }

    /// Whether another attempt is allowed after `attempts` failures.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(2), 2.0)
    }
}
