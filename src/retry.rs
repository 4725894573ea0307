use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use thiserror::Error;
use tracing::warn;

/// Bounded retry with exponential backoff and multiplicative jitter.
///
/// Provider rate limits and transient 5xx responses are expected during a
/// long benchmark run; every generation call goes through this wrapper.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    /// Each delay is scaled by a random factor in `1.0 ± jitter`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 100,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    fn delay_before_attempt(&self, completed_attempts: usize) -> Duration {
        let base = self.initial_delay.as_secs_f64()
            * self.backoff_factor.powi(completed_attempts as i32 - 1);
        let capped = base.min(self.max_delay.as_secs_f64());
        let scaled = if self.jitter > 0.0 {
            capped * rand::thread_rng().gen_range(1.0 - self.jitter..=1.0 + self.jitter)
        } else {
            capped
        };
        Duration::from_secs_f64(scaled.max(0.0))
    }
}

/// Every attempt failed. The orchestrator matches on this type to decide
/// that a provider is dead and the run must abort.
#[derive(Debug, Error)]
#[error("{label}: giving up after {attempts} attempts: {last_error}")]
pub struct RetryExhausted {
    pub label: String,
    pub attempts: usize,
    pub last_error: String,
}

/// Run `op` until it succeeds or the policy's attempt budget is spent.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = String::new();
    for attempt in 1..=policy.max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                last_error = format!("{err:#}");
                if attempt < policy.max_attempts {
                    let delay = policy.delay_before_attempt(attempt);
                    warn!(
                        "retry attempt {} for {} after error: {} (waiting {}ms)",
                        attempt,
                        label,
                        last_error,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(RetryExhausted {
        label: label.to_string(),
        attempts: policy.max_attempts,
        last_error,
    }
    .into())
}
