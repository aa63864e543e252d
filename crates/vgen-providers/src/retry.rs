//! Resilient call executor: retry with jittered exponential backoff.
//!
//! Every outbound network call in the system goes through this executor.
//! Call sites supply only a budget (attempts and delays) and a retryable
//! classifier; the loop itself lives here.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

/// Budget for one call site.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first (must be >= 1).
    pub max_attempts: u32,
    /// Delay before the first retry (doubles each attempt).
    pub initial_delay: Duration,
    /// Ceiling for the computed delay, before jitter.
    pub max_delay: Duration,
    /// Operation name for logging.
    pub operation_name: String,
}

impl RetryPolicy {
    /// Default budget for ordinary provider calls.
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            operation_name: operation_name.into(),
        }
    }

    /// Generous budget for calls the job cannot proceed without.
    pub fn critical(operation_name: impl Into<String>) -> Self {
        Self {
            max_attempts: 5,
            ..Self::new(operation_name)
        }
    }

    /// Tight budget for best-effort side calls.
    pub fn best_effort(operation_name: impl Into<String>) -> Self {
        Self {
            max_attempts: 2,
            ..Self::new(operation_name)
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Geometric delay for the given retry number (1-based), clamped.
    fn base_delay_for(&self, retry: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)));
        delay.min(self.max_delay)
    }

    /// Delay with a uniform 0.5-1.5x jitter applied, so concurrent callers
    /// hitting the same limit don't retry in lockstep.
    fn jittered_delay_for(&self, retry: u32) -> Duration {
        let base = self.base_delay_for(retry);
        let factor: f64 = rand::rng().random_range(0.5..1.5);
        base.mul_f64(factor)
    }
}

/// Execute `operation`, retrying while `is_retryable` matches the failure
/// and the attempt budget lasts. The last failure is returned unchanged.
pub async fn call_with_retry<F, Fut, T, E, R>(
    policy: &RetryPolicy,
    is_retryable: R,
    operation: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    R: Fn(&E) -> bool,
{
    let mut attempt = 1u32;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        "{} succeeded on attempt {}/{}",
                        policy.operation_name, attempt, policy.max_attempts
                    );
                }
                return Ok(value);
            }
            Err(e) if attempt < policy.max_attempts && is_retryable(&e) => {
                let delay = policy.jittered_delay_for(attempt);
                warn!(
                    "{} attempt {}/{} failed, retrying in {:?}: {}",
                    policy.operation_name, attempt, policy.max_attempts, delay, e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
