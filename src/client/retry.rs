use std::time::Duration;

use tracing::warn;

use super::{CompletionRequest, ModelClient};
use crate::error::ServiceError;

pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Bounded exponential backoff for rate-limited calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: DEFAULT_INITIAL_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    /// Delay after the given 1-based failed attempt.
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        let exponent = i32::try_from(failed_attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        if capped.is_finite() && capped > 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.max_delay
        }
    }

    pub fn should_retry(&self, err: &ServiceError) -> bool {
        err.is_transient()
    }
}

pub struct RetryingClient<'a> {
    inner: &'a dyn ModelClient,
    policy: RetryPolicy,
    sleeper: &'a dyn Sleeper,
}

impl<'a> RetryingClient<'a> {
    pub fn new(inner: &'a dyn ModelClient, policy: RetryPolicy, sleeper: &'a dyn Sleeper) -> Self {
        Self {
            inner,
            policy,
            sleeper,
        }
    }
}

impl ModelClient for RetryingClient<'_> {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, ServiceError> {
        let mut attempt = 1;
        loop {
            match self.inner.complete(request) {
                Ok(text) => return Ok(text),
                Err(err) if self.policy.should_retry(&err) && attempt < self.policy.max_attempts => {
                    let backoff = self.policy.delay_for(attempt);
                    let delay = err.retry_after().map_or(backoff, |hint| hint.max(backoff));
                    warn!(
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "model call rate limited; backing off"
                    );
                    self.sleeper.sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
