//! Fail-fast admission control for external API routes
//!
//! Rolling-window limiter keyed by `(route, caller)` against a per-route
//! rule table. A denied check rejects *before* the expensive call is
//! attempted - no queueing, no sleeping - so throttled callers can surface
//! a throttling response without burning pool or API budget.
//!
//! The key set is bounded by an LRU cache so a hostile caller cannot grow
//! memory without bound. Each limiter instance is independently
//! constructed; nothing here is process-global, so tests can instantiate
//! as many as they need.

use lru::LruCache;
use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::ApiError;

/// Maximum number of `(route, caller)` windows tracked simultaneously
const MAX_TRACKED_WINDOWS: usize = 1024;

/// Admission rule for one route
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RateLimitRule {
    /// Route identifier, e.g. `"keyword_tool"`
    pub route_key: String,
    /// Requests admitted per window
    pub max_requests: u32,
    /// Rolling window length
    #[serde(with = "crate::config::serde_duration_ms")]
    pub window: Duration,
}

impl RateLimitRule {
    pub fn new(route_key: impl Into<String>, max_requests: u32, window: Duration) -> Self {
        Self {
            route_key: route_key.into(),
            max_requests,
            window,
        }
    }
}

/// Rolling-window admission controller
pub struct RateLimiter {
    rules: HashMap<String, RateLimitRule>,
    windows: Mutex<LruCache<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Build a limiter from a rule table. Routes without a rule are
    /// admitted unconditionally.
    pub fn new(rules: impl IntoIterator<Item = RateLimitRule>) -> Self {
        let rules: HashMap<String, RateLimitRule> = rules
            .into_iter()
            .map(|rule| (rule.route_key.clone(), rule))
            .collect();

        let capacity = NonZeroUsize::new(MAX_TRACKED_WINDOWS)
            .unwrap_or(NonZeroUsize::MIN);

        Self {
            rules,
            windows: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Admit or reject one request for `route` on behalf of `caller`.
    ///
    /// Admission is recorded immediately, so a passed check counts against
    /// the window even if the caller's request later fails.
    pub async fn check(&self, route: &str, caller: &str) -> Result<(), ApiError> {
        let Some(rule) = self.rules.get(route) else {
            debug!(route, "no rate-limit rule for route, admitting");
            return Ok(());
        };

        let key = format!("{route}:{caller}");
        let now = Instant::now();

        let mut windows = self.windows.lock().await;
        let timestamps = windows.get_or_insert_mut(key, VecDeque::new);

        // Prune admissions that have left the rolling window
        while let Some(oldest) = timestamps.front() {
            if now.duration_since(*oldest) >= rule.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= rule.max_requests as usize {
            // Oldest admission defines when a slot frees up
            let retry_after = timestamps
                .front()
                .map(|oldest| rule.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(rule.window);

            warn!(
                route,
                caller,
                in_window = timestamps.len(),
                max = rule.max_requests,
                ?retry_after,
                "rate limit exceeded, rejecting before call"
            );

            return Err(ApiError::RateLimited {
                route: route.to_string(),
                retry_after,
            });
        }

        timestamps.push_back(now);
        Ok(())
    }

    /// Number of `(route, caller)` windows currently tracked
    pub async fn tracked_window_count(&self) -> usize {
        self.windows.lock().await.len()
    }

    /// Drop all tracked windows (test hook and admin reset)
    pub async fn clear(&self) {
        self.windows.lock().await.clear();
    }
}
