//! Bounded retry with a pluggable backoff
//!
//! The retry loop knows nothing about downloads: it calls an operation until the
//! result reports itself as not retryable or the attempt budget is spent. The delay
//! between attempts comes from [`RetryConfig`]; the default is a fixed 5 second pause
//! without jitter.
//!
//! # Example
//!
//! ```no_run
//! use channel_dl::retry::{IsRetryable, run_with_retry};
//! use channel_dl::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum Attempt {
//!     Done,
//!     Flaky,
//! }
//!
//! impl IsRetryable for Attempt {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, Attempt::Flaky)
//!     }
//! }
//!
//! # async fn example() {
//! let config = RetryConfig::default();
//! let result = run_with_retry(&config, |_attempt| async { Attempt::Done }).await;
//! assert_eq!(result.attempts, 1);
//! # }
//! ```

use crate::config::RetryConfig;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Values that can say whether the operation producing them should run again
pub trait IsRetryable {
    /// Returns true if the operation should be attempted again
    fn is_retryable(&self) -> bool;
}

/// Final value of a retry loop together with how many attempts were made
#[derive(Debug)]
pub struct RetryResult<T> {
    /// Last value produced, `None` only when zero attempts were allowed
    pub last: Option<T>,
    /// Number of times the operation ran
    pub attempts: u32,
}

/// Run `operation` up to `config.max_attempts` times.
///
/// Stops at the first value whose [`IsRetryable::is_retryable`] is false. Between
/// a retryable value and the next attempt the task sleeps for
/// [`RetryConfig::delay_for`]; there is no sleep after the final attempt.
/// The closure receives the 1-based attempt number.
pub async fn run_with_retry<F, Fut, T>(config: &RetryConfig, mut operation: F) -> RetryResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = T>,
    T: IsRetryable,
{
    let mut last = None;
    let mut attempts = 0;

    while attempts < config.max_attempts {
        attempts += 1;
        let value = operation(attempts).await;

        if !value.is_retryable() {
            if attempts > 1 {
                tracing::info!(attempts, "Operation settled after retry");
            }
            return RetryResult {
                last: Some(value),
                attempts,
            };
        }

        if attempts < config.max_attempts {
            let delay = config.delay_for(attempts);
            tracing::warn!(
                attempt = attempts,
                max_attempts = config.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
        last = Some(value);
    }

    RetryResult { last, attempts }
}

impl RetryConfig {
    /// Delay to wait after the given failed attempt (1-based).
    ///
    /// `initial_delay * backoff_multiplier^(attempt - 1)`, capped at `max_delay`,
    /// then jittered when enabled. With the default multiplier of 1.0 the delay is
    /// constant.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let cap = self.max_delay.max(self.initial_delay);
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        // NaN fails is_finite, so it takes the cap as well
        let base = if secs.is_finite() {
            Duration::try_from_secs_f64(secs.clamp(0.0, cap.as_secs_f64())).unwrap_or(cap)
        } else {
            cap
        };

        if self.jitter { add_jitter(base) } else { base }
    }

    /// Copy of this config with a different attempt budget
    pub fn with_max_attempts(&self, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..self.clone()
        }
    }
}

/// Add random jitter to a delay
///
/// Jitter is uniformly distributed between 0% and 100% of the delay, so the
/// result lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor)).unwrap_or(delay)
}
