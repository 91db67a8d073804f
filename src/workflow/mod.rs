//! Workflow orchestration: concurrent fan-out with graceful degradation
//!
//! The orchestrator walks `Idle → Dispatch → Collect → Merge → Done` per
//! request. Dispatch fans out the independent sources concurrently;
//! Collect awaits all of them regardless of individual failure (each
//! branch's error is captured locally, allSettled-style, into a
//! fixed-shape record); Merge assembles the combined result noting which
//! sources failed. One source's failure never cancels another's in-flight
//! work, and the workflow always returns a structured response - never an
//! unhandled error to the edge.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::browser_pool::{BrowserPool, ChromeFactory};
use crate::config::ScrapeConfig;
use crate::error::{ApiError, PoolError};
use crate::naver_api::ApiKeywordData;
use crate::scraper::types::{KeywordCategory, KeywordHarvest};
use crate::scraper::PageScraper;
use crate::usage::AnalysisCache;

/// Workflow phases, logged at each transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Dispatch,
    Collect,
    Merge,
    Done,
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Self::Dispatch => "dispatch",
            Self::Collect => "collect",
            Self::Merge => "merge",
            Self::Done => "done",
        }
    }
}

/// Browser-backed keyword collection source
#[async_trait]
pub trait ScrapeSource: Send + Sync {
    async fn collect(
        &self,
        query: &str,
        categories: &[KeywordCategory],
    ) -> anyhow::Result<KeywordHarvest>;

    /// Lightweight probe: can the source serve a request right now?
    async fn health(&self) -> bool;
}

/// External JSON API source
#[async_trait]
pub trait ApiSource: Send + Sync {
    async fn related_keywords(&self, query: &str) -> Result<ApiKeywordData, ApiError>;
    async fn health(&self) -> bool;
}

/// Production [`ScrapeSource`] over the browser pool
pub struct PoolScrapeSource {
    pool: Arc<BrowserPool<ChromeFactory>>,
    config: ScrapeConfig,
}

impl PoolScrapeSource {
    pub fn new(pool: Arc<BrowserPool<ChromeFactory>>, config: ScrapeConfig) -> Self {
        Self { pool, config }
    }
}

#[async_trait]
impl ScrapeSource for PoolScrapeSource {
    async fn collect(
        &self,
        query: &str,
        categories: &[KeywordCategory],
    ) -> anyhow::Result<KeywordHarvest> {
        let scraper = PageScraper::initialize(&self.pool, self.config.clone()).await?;
        let harvest = scraper.scrape_all_keywords(query, categories).await;
        scraper.close().await;
        Ok(harvest)
    }

    async fn health(&self) -> bool {
        match self.pool.try_acquire().await {
            Ok(mut guard) => {
                guard.release().await;
                true
            }
            // A full pool is busy, not broken
            Err(PoolError::Exhausted { .. }) => true,
            Err(e) => {
                warn!(error = %e, "scrape source health probe failed");
                false
            }
        }
    }
}

/// Derived per-query numbers handed verbatim to external layers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordAnalysis {
    pub total_unique_keywords: usize,
    pub per_category_counts: BTreeMap<KeywordCategory, usize>,
    pub api_keyword_count: usize,
    /// Sum of monthly volumes over API keywords where both device counts
    /// are known; masked rows are excluded rather than estimated
    pub total_monthly_searches: u64,
    pub generated_at: DateTime<Utc>,
}

/// Combined outcome of one workflow request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub query: String,
    pub scraping_data: Option<KeywordHarvest>,
    pub api_data: Option<ApiKeywordData>,
    pub keyword_analysis: Option<KeywordAnalysis>,
    /// Names of sources that failed this request
    pub failed_sources: Vec<String>,
    pub success: bool,
    pub message: String,
    pub execution_time_seconds: f64,
    pub timestamp: DateTime<Utc>,
}

/// Per-source health booleans plus their logical AND
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub scraping: bool,
    pub api: bool,
    pub overall: bool,
}

/// Fans out sources, collects best-effort partial results, merges them.
pub struct WorkflowOrchestrator {
    scrape: Arc<dyn ScrapeSource>,
    api: Arc<dyn ApiSource>,
    cache: Arc<AnalysisCache>,
}

impl WorkflowOrchestrator {
    pub fn new(
        scrape: Arc<dyn ScrapeSource>,
        api: Arc<dyn ApiSource>,
        cache: Arc<AnalysisCache>,
    ) -> Self {
        Self { scrape, api, cache }
    }

    /// Complete workflow: scraping + API + derived analysis, concurrently.
    pub async fn execute_complete(
        &self,
        query: &str,
        categories: &[KeywordCategory],
    ) -> WorkflowResult {
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        debug!(%request_id, query, phase = Phase::Dispatch.as_str(), "complete workflow");

        let (scrape_outcome, api_outcome) = tokio::join!(
            self.scrape.collect(query, categories),
            self.api.related_keywords(query),
        );

        debug!(%request_id, phase = Phase::Collect.as_str(), "sources settled");
        let mut failed_sources = Vec::new();

        let scraping_data = match scrape_outcome {
            Ok(harvest) => Some(harvest),
            Err(e) => {
                warn!(%request_id, error = %format!("{e:#}"), "scraping source failed");
                failed_sources.push("scraping".to_string());
                None
            }
        };

        let api_data = match api_outcome {
            Ok(data) => Some(data),
            Err(e) => {
                warn!(%request_id, error = %e, "API source failed");
                failed_sources.push("naver_api".to_string());
                None
            }
        };

        debug!(%request_id, phase = Phase::Merge.as_str(), failed = failed_sources.len(), "merging");
        let keyword_analysis = if scraping_data.is_some() || api_data.is_some() {
            let analysis = derive_analysis(scraping_data.as_ref(), api_data.as_ref());
            self.cache.put(query, analysis.clone());
            Some(analysis)
        } else {
            None
        };

        self.finish(
            request_id,
            query,
            scraping_data,
            api_data,
            keyword_analysis,
            failed_sources,
            2,
            started,
        )
    }

    /// Quick workflow: API plus cached analysis only, no browser touched.
    pub async fn execute_quick(&self, query: &str) -> WorkflowResult {
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        debug!(%request_id, query, phase = Phase::Dispatch.as_str(), "quick workflow");

        let mut failed_sources = Vec::new();
        let api_data = match self.api.related_keywords(query).await {
            Ok(data) => Some(data),
            Err(e) => {
                warn!(%request_id, error = %e, "API source failed");
                failed_sources.push("naver_api".to_string());
                None
            }
        };

        // Cached analysis from an earlier complete run counts as a source
        // of its own: it can serve the request even when the API failed.
        // On a cache miss, derive from the fresh API payload alone.
        let cached_analysis = self.cache.get(query);
        let served_from_cache = cached_analysis.is_some();
        let keyword_analysis = cached_analysis.or_else(|| {
            api_data.as_ref().map(|data| {
                let analysis = derive_analysis(None, Some(data));
                self.cache.put(query, analysis.clone());
                analysis
            })
        });

        let source_count = if served_from_cache { 2 } else { 1 };
        self.finish(
            request_id,
            query,
            None,
            api_data,
            keyword_analysis,
            failed_sources,
            source_count,
            started,
        )
    }

    /// Scraping-only workflow: browser source, nothing else.
    pub async fn execute_scraping_only(
        &self,
        query: &str,
        categories: &[KeywordCategory],
    ) -> WorkflowResult {
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        debug!(%request_id, query, phase = Phase::Dispatch.as_str(), "scraping-only workflow");

        let mut failed_sources = Vec::new();
        let scraping_data = match self.scrape.collect(query, categories).await {
            Ok(harvest) => Some(harvest),
            Err(e) => {
                warn!(%request_id, error = %format!("{e:#}"), "scraping source failed");
                failed_sources.push("scraping".to_string());
                None
            }
        };

        let keyword_analysis = scraping_data
            .as_ref()
            .map(|harvest| derive_analysis(Some(harvest), None));

        self.finish(
            request_id,
            query,
            scraping_data,
            None,
            keyword_analysis,
            failed_sources,
            1,
            started,
        )
    }

    /// Probe each source and report booleans plus their AND.
    pub async fn health_check(&self) -> HealthReport {
        let (scraping, api) = tokio::join!(self.scrape.health(), self.api.health());
        HealthReport {
            scraping,
            api,
            overall: scraping && api,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        request_id: Uuid,
        query: &str,
        scraping_data: Option<KeywordHarvest>,
        api_data: Option<ApiKeywordData>,
        keyword_analysis: Option<KeywordAnalysis>,
        failed_sources: Vec<String>,
        source_count: usize,
        started: Instant,
    ) -> WorkflowResult {
        let success = failed_sources.len() < source_count;
        let message = if failed_sources.is_empty() {
            format!("all sources succeeded for '{query}'")
        } else if success {
            format!(
                "partial result for '{query}': {} failed",
                failed_sources.join(", ")
            )
        } else {
            format!(
                "all sources failed for '{query}': {}",
                failed_sources.join(", ")
            )
        };

        let execution_time_seconds = started.elapsed().as_secs_f64();
        info!(
            %request_id,
            query,
            phase = Phase::Done.as_str(),
            success,
            execution_time_seconds,
            "workflow finished"
        );

        WorkflowResult {
            query: query.to_string(),
            scraping_data,
            api_data,
            keyword_analysis,
            failed_sources,
            success,
            message,
            execution_time_seconds,
            timestamp: Utc::now(),
        }
    }
}

/// Derive the combined per-query numbers from whichever sources succeeded.
fn derive_analysis(
    scraping: Option<&KeywordHarvest>,
    api: Option<&ApiKeywordData>,
) -> KeywordAnalysis {
    let per_category_counts: BTreeMap<KeywordCategory, usize> = scraping
        .map(|harvest| {
            harvest
                .categories
                .iter()
                .map(|(category, outcome)| (*category, outcome.count))
                .collect()
        })
        .unwrap_or_default();

    let total_monthly_searches = api
        .map(|data| {
            data.keywords
                .iter()
                .filter_map(|kw| kw.total_monthly_searches())
                .sum()
        })
        .unwrap_or(0);

    KeywordAnalysis {
        total_unique_keywords: scraping.map(|h| h.keywords.len()).unwrap_or(0),
        per_category_counts,
        api_keyword_count: api.map(|data| data.keywords.len()).unwrap_or(0),
        total_monthly_searches,
        generated_at: Utc::now(),
    }
}
