//! Bounded retry with fixed delay and error classification
//!
//! Wraps an async operation in up to `max_attempts` tries. The delay
//! between attempts is fixed, not exponential: the upstreams enforce
//! fixed-window limits, so backing off further buys nothing.
//!
//! Classification is an explicit table (see [`is_retryable`]) rather than
//! string matching, so both branches are testable.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::ApiError;

/// Retry policy: attempt budget plus inter-attempt delay
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "crate::config::serde_duration_ms")]
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

/// Decide whether an attempt is worth repeating.
///
/// Retryable: timeouts, connection-level failures, HTTP 5xx, plus 408
/// (request timeout) and 429 (the upstream's own throttle - the fixed
/// delay usually clears it).
///
/// Fatal: every other 4xx (the request itself is wrong), decode and
/// missing-data failures (repeating returns the same body), and our own
/// rate-limit rejection (the window will not reopen within one delay).
pub fn is_retryable(error: &ApiError) -> bool {
    match error {
        ApiError::Timeout { .. } | ApiError::Network { .. } => true,
        ApiError::Status { code, .. } => *code >= 500 || *code == 408 || *code == 429,
        ApiError::Decode(_)
        | ApiError::MissingData(_)
        | ApiError::RateLimited { .. }
        | ApiError::RetryExhausted { .. } => false,
    }
}

/// Executes async operations under a [`RetryPolicy`]
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation`, retrying retryable failures up to the attempt
    /// budget with a fixed delay in between.
    ///
    /// Success short-circuits remaining attempts. A fatal error is
    /// returned as-is. Exhaustion wraps the last error in
    /// [`ApiError::RetryExhausted`] tagged with `label` and the attempt
    /// count.
    pub async fn execute<F, Fut, T>(&self, label: &str, operation: F) -> Result<T, ApiError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(label, attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    if !is_retryable(&err) {
                        warn!(label, attempt, error = %err, "fatal error, not retrying");
                        return Err(err);
                    }

                    warn!(
                        label,
                        attempt,
                        max_attempts,
                        error = %err,
                        "retryable error"
                    );
                    last_error = Some(err);

                    if attempt < max_attempts {
                        sleep(self.policy.delay).await;
                    }
                }
            }
        }

        // last_error is always set when the loop falls through
        let source = last_error.unwrap_or_else(|| ApiError::Network {
            url: String::new(),
            message: "retry loop exited without recording an error".to_string(),
        });

        Err(ApiError::RetryExhausted {
            label: label.to_string(),
            attempts: max_attempts,
            source: Box::new(source),
        })
    }
}
