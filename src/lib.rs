//! kwscout: Naver keyword signal collector
//!
//! Gathers keyword signals about a search term from the Naver web UI by
//! driving pooled headless-browser sessions, blends that with the
//! rate-limited Naver keyword JSON API, and produces a combined result
//! under a time budget while tolerating partial failures.
//!
//! The moving parts, leaf first: [`matcher`] (edit-distance/Jaccard
//! similarity), [`browser_pool`] (bounded reusable Chrome sessions),
//! [`scraper`] (selector-fallback extraction with validation and dedup),
//! [`retry`] + [`rate_limiter`] (the external-API discipline),
//! [`naver_api`] (the typed API boundary) and [`workflow`] (concurrent
//! fan-out with graceful degradation).

pub mod browser_pool;
pub mod config;
pub mod error;
pub mod matcher;
pub mod naver_api;
pub mod rate_limiter;
pub mod retry;
pub mod scraper;
pub mod usage;
pub mod workflow;

pub use browser_pool::{
    BrowserPool, ChromeFactory, ChromeSession, PoolConfig, PoolStatus, SessionFactory,
    SessionGuard,
};
pub use config::{ApiConfig, CollectorConfig, CollectorConfigBuilder, ScrapeConfig, UrlTemplates};
pub use error::{ApiError, PoolError};
pub use naver_api::{ApiKeyword, ApiKeywordData, NaverApiClient};
pub use rate_limiter::{RateLimitRule, RateLimiter};
pub use retry::{RetryExecutor, RetryPolicy};
pub use scraper::{
    KeywordCategory, KeywordHarvest, PageScraper, ScrapeStatus, ScrapedKeyword, ScrapingResult,
};
pub use usage::{AnalysisCache, DailyCounter};
pub use workflow::{
    ApiSource, HealthReport, KeywordAnalysis, PoolScrapeSource, ScrapeSource, WorkflowOrchestrator,
    WorkflowResult,
};
