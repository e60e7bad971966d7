use crate::{ReasoningClient, ReasoningError};
use rand::Rng;
use rootcause_core::LlmConfig;
use std::thread;
use std::time::Duration;

type Sleeper = Box<dyn Fn(Duration) + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fractional jitter, e.g. `0.2` spreads each delay over ±20%.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 4,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &LlmConfig) -> Self {
        Self {
            max_retries: u32::from(cfg.max_retries),
            base_delay: Duration::from_millis(cfg.retry_base_ms),
            max_delay: Duration::from_millis(cfg.retry_max_ms.max(cfg.retry_base_ms)),
            jitter: if cfg.retry_jitter.is_finite() {
                cfg.retry_jitter.clamp(0.0, 1.0)
            } else {
                0.0
            },
        }
    }

    /// Un-jittered delay before retry number `attempt` (0-based).
    pub fn nominal_delay(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.min(31));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay actually slept: `Retry-After` wins when the server sends one.
    pub fn delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(server_hint) = retry_after {
            return server_hint.min(self.max_delay);
        }
        let nominal = self.nominal_delay(attempt);
        if !self.jitter.is_finite() || self.jitter <= 0.0 || nominal.is_zero() {
            return nominal;
        }
        let spread = rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        nominal.mul_f64(1.0 + spread).min(self.max_delay)
    }
}

/// Wraps a client and transparently retries rate-limited submissions.
///
/// Non rate-limit failures are returned immediately. When retries run out the
/// last `RateLimited` error is returned with the total attempt count.
pub struct RetryingClient<C> {
    inner: C,
    policy: RetryPolicy,
    sleep: Sleeper,
}

impl<C: ReasoningClient> RetryingClient<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            sleep: Box::new(thread::sleep),
        }
    }

    /// Replace the blocking sleep, e.g. to record delays in tests.
    pub fn with_sleeper(mut self, sleep: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<C: ReasoningClient> ReasoningClient for RetryingClient<C> {
    fn submit(&self, prompt: &str) -> Result<String, ReasoningError> {
        let mut attempt: u32 = 0;
        loop {
            match self.inner.submit(prompt) {
                Ok(text) => return Ok(text),
                Err(ReasoningError::RateLimited {
                    retry_after,
                    detail,
                    ..
                }) => {
                    if attempt >= self.policy.max_retries {
                        return Err(ReasoningError::RateLimited {
                            attempts: attempt + 1,
                            retry_after,
                            detail,
                        });
                    }
                    (self.sleep)(self.policy.delay(attempt, retry_after));
                    attempt += 1;
                }
                Err(other) => return Err(other),
            }
        }
    }
}
