//! Error taxonomy for the collector core
//!
//! Two families: [`PoolError`] for the browser pool (resource unavailable,
//! surfaces to the caller) and [`ApiError`] for the external Naver APIs
//! (classified into retryable vs fatal by the retry layer). Scraping faults
//! never appear here - they are absorbed into typed
//! [`ScrapeStatus`](crate::scraper::ScrapeStatus) values because the
//! orchestrator must keep going regardless.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the browser session pool
#[derive(Debug, Error)]
pub enum PoolError {
    /// No session available and no capacity to create one right now
    #[error("browser pool exhausted ({active}/{max_size} sessions checked out)")]
    Exhausted { active: usize, max_size: usize },

    /// FIFO wait for a session exceeded the configured acquire timeout
    #[error("timed out after {waited:?} waiting for a pooled browser session")]
    AcquireTimeout { waited: Duration },

    /// Launching the underlying browser process failed
    #[error("failed to create browser session: {0}")]
    SessionCreation(String),

    /// Pool is shutting down and no longer hands out sessions
    #[error("browser pool is closed")]
    Closed,
}

/// Errors from the external JSON API path (HTTP client, rate limiter, retries)
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request exceeded its deadline
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// Connection-level failure (DNS, refused, reset)
    #[error("network error calling {url}: {message}")]
    Network { url: String, message: String },

    /// Upstream answered with a non-success HTTP status
    #[error("upstream returned HTTP {code} for {url}")]
    Status { code: u16, url: String },

    /// Response body did not match the expected schema
    #[error("failed to decode upstream response: {0}")]
    Decode(String),

    /// Expected payload section absent from an otherwise valid response
    #[error("upstream response missing expected data: {0}")]
    MissingData(String),

    /// Admission check rejected the call before it was attempted
    #[error("rate limit exceeded for route '{route}', retry after {retry_after:?}")]
    RateLimited { route: String, retry_after: Duration },

    /// All retry attempts were consumed; carries the final underlying error
    #[error("'{label}' failed after {attempts} attempts: {source}")]
    RetryExhausted {
        label: String,
        attempts: u32,
        #[source]
        source: Box<ApiError>,
    },
}

impl ApiError {
    /// Map a reqwest failure into the taxonomy.
    ///
    /// Status-bearing errors keep their code so the retry classifier can
    /// distinguish 5xx from 4xx; everything else collapses into
    /// timeout / network / decode.
    pub fn from_reqwest(err: reqwest::Error, url: &str) -> Self {
        if err.is_timeout() {
            return Self::Timeout {
                url: url.to_string(),
            };
        }
        if let Some(status) = err.status() {
            return Self::Status {
                code: status.as_u16(),
                url: url.to_string(),
            };
        }
        if err.is_decode() {
            return Self::Decode(err.to_string());
        }
        Self::Network {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}
