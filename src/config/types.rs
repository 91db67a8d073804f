//! Core configuration types for keyword collection
//!
//! The collector consumes configuration, it does not own it: pool sizing,
//! per-category caps, retry policy, the rate-limit rule table, target-site
//! URL templates and selector overrides all arrive from the embedding
//! layer. Everything except API credentials has a working default.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

use crate::browser_pool::PoolConfig;
use crate::rate_limiter::RateLimitRule;
use crate::retry::RetryPolicy;
use crate::scraper::types::{
    KeywordCategory, DEFAULT_BLACKLIST, MAX_KEYWORDS_PER_TYPE, MAX_KEYWORD_LENGTH,
    MIN_KEYWORD_LENGTH, QUERY_SIMILARITY_REJECT_THRESHOLD,
};

use super::serde_duration_ms;

/// URL templates for the scraped site
///
/// Query strings are appended as percent-encoded pairs via [`Url`], never
/// by string formatting, so Hangul queries survive intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlTemplates {
    /// Mobile search results page (trending, smartblock, related-search)
    pub search_base: String,
    /// Autosuggest completion page
    pub autosuggest_base: String,
}

impl Default for UrlTemplates {
    fn default() -> Self {
        Self {
            search_base: "https://m.search.naver.com/search.naver".to_string(),
            autosuggest_base: "https://m.search.naver.com/search.naver".to_string(),
        }
    }
}

impl UrlTemplates {
    /// Build the target URL for one category and physical page (1-based).
    pub fn page_url(
        &self,
        category: KeywordCategory,
        query: &str,
        page: u8,
    ) -> Result<Url, url::ParseError> {
        let base = match category {
            KeywordCategory::Autosuggest => &self.autosuggest_base,
            _ => &self.search_base,
        };

        let mut url = Url::parse(base)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("query", query);
            if category == KeywordCategory::Autosuggest {
                pairs.append_pair("where", "m_atcmp");
            }
            if page > 1 {
                // Naver pages related-search results in blocks of 15
                let start = (u16::from(page) - 1) * 15 + 1;
                pairs.append_pair("start", &start.to_string());
            }
        }
        Ok(url)
    }
}

/// Scraping-side configuration: URLs, selectors, validation bounds, caps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    pub urls: UrlTemplates,

    /// Per-category selector overrides. Categories without an entry use
    /// the compiled-in candidate tables.
    #[serde(default)]
    pub selector_overrides: BTreeMap<KeywordCategory, Vec<String>>,

    /// Bound on waiting for a page's load-settled condition
    #[serde(with = "serde_duration_ms")]
    pub page_load_timeout: Duration,

    /// Poll interval while waiting for a region to render
    #[serde(with = "serde_duration_ms")]
    pub settle_poll_interval: Duration,

    /// Cap on keywords kept per category
    pub max_keywords_per_category: usize,

    /// Validation bounds, in characters
    pub min_keyword_length: usize,
    pub max_keyword_length: usize,

    /// Reject keywords at or above this similarity to the query
    pub query_similarity_threshold: f64,

    /// Case-insensitive substring blacklist
    pub blacklist: Vec<String>,

    /// Source tag stamped onto scraped keywords
    pub source_tag: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            urls: UrlTemplates::default(),
            selector_overrides: BTreeMap::new(),
            page_load_timeout: Duration::from_secs(10),
            settle_poll_interval: Duration::from_millis(150),
            max_keywords_per_category: MAX_KEYWORDS_PER_TYPE,
            min_keyword_length: MIN_KEYWORD_LENGTH,
            max_keyword_length: MAX_KEYWORD_LENGTH,
            query_similarity_threshold: QUERY_SIMILARITY_REJECT_THRESHOLD,
            blacklist: DEFAULT_BLACKLIST.iter().map(|s| s.to_string()).collect(),
            source_tag: "naver_mobile_search".to_string(),
        }
    }
}

impl ScrapeConfig {
    /// Ordered selector candidates for a category: override if present,
    /// compiled-in table otherwise.
    pub fn selectors_for(&self, category: KeywordCategory) -> Vec<String> {
        match self.selector_overrides.get(&category) {
            Some(overrides) if !overrides.is_empty() => overrides.clone(),
            _ => category
                .default_selectors()
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Naver keyword API client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Keyword-tool API base, overridable for tests
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub customer_id: String,
    #[serde(with = "serde_duration_ms")]
    pub request_timeout: Duration,
    /// Soft budget of API calls per UTC day; exceeding it only logs
    pub daily_soft_limit: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.searchad.naver.com".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            customer_id: String::new(),
            request_timeout: Duration::from_secs(10),
            daily_soft_limit: Some(10_000),
        }
    }
}

/// Top-level configuration consumed by the collector core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default = "CollectorConfig::default_rate_rules")]
    pub rate_rules: Vec<RateLimitRule>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            scrape: ScrapeConfig::default(),
            api: ApiConfig::default(),
            retry: RetryPolicy::default(),
            rate_rules: Self::default_rate_rules(),
        }
    }
}

impl CollectorConfig {
    /// Route table matching the upstreams' published fixed-window limits
    pub fn default_rate_rules() -> Vec<RateLimitRule> {
        vec![
            RateLimitRule::new("keyword_tool", 5, Duration::from_secs(1)),
            RateLimitRule::new("health", 30, Duration::from_secs(60)),
        ]
    }

    pub fn builder() -> super::CollectorConfigBuilder {
        super::CollectorConfigBuilder::default()
    }
}
