//! Injectable usage accounting and analysis caching
//!
//! Both were process-wide globals in earlier revisions; they are now
//! explicitly constructed objects with defined reset semantics so tests
//! (and multi-tenant embeddings) get independent instances.

use chrono::{NaiveDate, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::workflow::KeywordAnalysis;

/// Counts external API calls per UTC day, rolling over automatically.
///
/// The limit is soft: exceeding it logs a warning but never blocks - hard
/// admission control belongs to the rate limiter.
pub struct DailyCounter {
    state: Mutex<(NaiveDate, u64)>,
    soft_limit: Option<u64>,
}

impl DailyCounter {
    pub fn new(soft_limit: Option<u64>) -> Self {
        Self {
            state: Mutex::new((Utc::now().date_naive(), 0)),
            soft_limit,
        }
    }

    /// Record one call and return the running count for today.
    pub fn record(&self) -> u64 {
        let today = Utc::now().date_naive();
        let mut state = self.state.lock();

        if state.0 != today {
            debug!(previous_day = %state.0, calls = state.1, "daily counter rollover");
            *state = (today, 0);
        }

        state.1 += 1;
        if let Some(limit) = self.soft_limit {
            if state.1 > limit {
                warn!(calls = state.1, limit, "daily API soft budget exceeded");
            }
        }
        state.1
    }

    /// Calls recorded for the current UTC day.
    pub fn today(&self) -> u64 {
        let today = Utc::now().date_naive();
        let state = self.state.lock();
        if state.0 == today {
            state.1
        } else {
            0
        }
    }

    /// Zero the counter regardless of date.
    pub fn reset(&self) {
        *self.state.lock() = (Utc::now().date_naive(), 0);
    }
}

struct CachedAnalysis {
    analysis: KeywordAnalysis,
    stored_at: Instant,
}

/// Bounded per-query cache of derived keyword analysis with TTL.
///
/// Consulted by the "quick" workflow entrypoint to avoid re-deriving
/// analysis when a recent complete run already produced one.
pub struct AnalysisCache {
    inner: Mutex<LruCache<String, CachedAnalysis>>,
    ttl: Duration,
}

impl AnalysisCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn get(&self, query: &str) -> Option<KeywordAnalysis> {
        let mut cache = self.inner.lock();
        match cache.get(query) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.analysis.clone()),
            Some(_) => {
                cache.pop(query);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, query: &str, analysis: KeywordAnalysis) {
        self.inner.lock().put(
            query.to_string(),
            CachedAnalysis {
                analysis,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self::new(256, Duration::from_secs(600))
    }
}
