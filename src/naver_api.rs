//! Rate-limited client for the Naver keyword JSON APIs
//!
//! The upstream response shape is deeply optional (`keywordList` may be
//! absent, entries may lack any field, counts arrive as numbers *or*
//! strings like `"< 10"`). That shape is validated exactly once here, at
//! the client boundary, into [`ApiKeywordData`] - consumers never touch
//! the raw schema.
//!
//! Every call passes the rate limiter first (fail fast, the HTTP request
//! is never built when the window is full), then runs under the retry
//! executor with the fixed-delay policy.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::rate_limiter::RateLimiter;
use crate::retry::RetryExecutor;
use crate::scraper::types::Competition;
use crate::usage::DailyCounter;
use crate::workflow::ApiSource;

/// Route keys used against the rate-limit rule table
pub const ROUTE_KEYWORD_TOOL: &str = "keyword_tool";
pub const ROUTE_HEALTH: &str = "health";

/// One keyword row from the keyword tool, normalized
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyword {
    pub keyword: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_pc_searches: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_mobile_searches: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub competition: Option<Competition>,
}

impl ApiKeyword {
    /// PC + mobile volume when both are known
    pub fn total_monthly_searches(&self) -> Option<u64> {
        match (self.monthly_pc_searches, self.monthly_mobile_searches) {
            (Some(pc), Some(mobile)) => Some(pc + mobile),
            _ => None,
        }
    }
}

/// Validated keyword-tool payload handed to the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeywordData {
    pub query: String,
    pub keywords: Vec<ApiKeyword>,
    pub fetched_at: DateTime<Utc>,
}

// =============================================================================
// Raw upstream schema (private to this boundary)
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawKeywordToolResponse {
    #[serde(rename = "keywordList")]
    keyword_list: Option<Vec<RawKeywordRow>>,
}

#[derive(Debug, Deserialize)]
struct RawKeywordRow {
    #[serde(rename = "relKeyword")]
    rel_keyword: Option<String>,
    #[serde(rename = "monthlyPcQcCnt")]
    monthly_pc_qc_cnt: Option<serde_json::Value>,
    #[serde(rename = "monthlyMobileQcCnt")]
    monthly_mobile_qc_cnt: Option<serde_json::Value>,
    #[serde(rename = "compIdx")]
    comp_idx: Option<String>,
}

/// Counts arrive as numbers or masked strings (`"< 10"`). Masked values
/// keep their bound so totals stay conservative.
fn lenient_count(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => {
            let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        }
        _ => None,
    }
}

fn competition_from_comp_idx(raw: &str) -> Option<Competition> {
    match raw.trim() {
        "높음" => Some(Competition::High),
        "중간" => Some(Competition::Medium),
        "낮음" => Some(Competition::Low),
        _ => None,
    }
}

impl RawKeywordToolResponse {
    /// The single place the optional upstream shape becomes a typed value.
    fn into_data(self, query: &str) -> Result<ApiKeywordData, ApiError> {
        let rows = self
            .keyword_list
            .ok_or_else(|| ApiError::MissingData("keywordList absent from response".into()))?;

        let keywords: Vec<ApiKeyword> = rows
            .into_iter()
            .filter_map(|row| {
                let keyword = row.rel_keyword?.trim().to_string();
                if keyword.is_empty() {
                    return None;
                }
                Some(ApiKeyword {
                    keyword,
                    monthly_pc_searches: row.monthly_pc_qc_cnt.as_ref().and_then(lenient_count),
                    monthly_mobile_searches: row
                        .monthly_mobile_qc_cnt
                        .as_ref()
                        .and_then(lenient_count),
                    competition: row.comp_idx.as_deref().and_then(competition_from_comp_idx),
                })
            })
            .collect();

        if keywords.is_empty() {
            return Err(ApiError::MissingData(format!(
                "keywordList carried no usable rows for '{query}'"
            )));
        }

        Ok(ApiKeywordData {
            query: query.to_string(),
            keywords,
            fetched_at: Utc::now(),
        })
    }
}

// =============================================================================
// Client
// =============================================================================

/// HTTP client for the keyword tool, wired through admission control,
/// retry and the daily usage counter.
pub struct NaverApiClient {
    http: reqwest::Client,
    config: ApiConfig,
    limiter: Arc<RateLimiter>,
    retry: RetryExecutor,
    counter: Arc<DailyCounter>,
}

impl NaverApiClient {
    pub fn new(
        config: ApiConfig,
        limiter: Arc<RateLimiter>,
        retry: RetryExecutor,
        counter: Arc<DailyCounter>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            config,
            limiter,
            retry,
            counter,
        })
    }

    fn keyword_tool_url(&self, query: &str) -> String {
        let mut url = format!(
            "{}/keywordstool?showDetail=1",
            self.config.base_url.trim_end_matches('/')
        );
        url.push_str("&hintKeywords=");
        url.push_str(&urlencode(query));
        url
    }

    /// Fetch related keywords with volumes for `query`.
    ///
    /// Admission first, then retries around the single-attempt fetch; the
    /// daily counter records each admitted call group.
    pub async fn related_keywords(&self, query: &str) -> Result<ApiKeywordData, ApiError> {
        self.limiter.check(ROUTE_KEYWORD_TOOL, "api").await?;
        let calls_today = self.counter.record();
        debug!(query, calls_today, "keyword tool call admitted");

        let data = self
            .retry
            .execute("naver keyword tool", || self.fetch_keyword_tool(query))
            .await?;

        info!(query, keywords = data.keywords.len(), "keyword tool fetch complete");
        Ok(data)
    }

    async fn fetch_keyword_tool(&self, query: &str) -> Result<ApiKeywordData, ApiError> {
        let url = self.keyword_tool_url(query);

        let response = self
            .http
            .get(&url)
            .header("X-Naver-Client-Id", &self.config.client_id)
            .header("X-Naver-Client-Secret", &self.config.client_secret)
            .header("X-Customer", &self.config.customer_id)
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(e, &url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                code: status.as_u16(),
                url,
            });
        }

        let raw: RawKeywordToolResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        raw.into_data(query)
    }

    /// Lightweight reachability probe for health checks.
    pub async fn probe(&self) -> bool {
        if self.limiter.check(ROUTE_HEALTH, "api").await.is_err() {
            warn!("health probe rate limited");
            return false;
        }

        let url = self.config.base_url.clone();
        match self.http.get(&url).send().await {
            // Any HTTP answer means the upstream is reachable
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "API health probe failed");
                false
            }
        }
    }
}

#[async_trait]
impl ApiSource for NaverApiClient {
    async fn related_keywords(&self, query: &str) -> Result<ApiKeywordData, ApiError> {
        NaverApiClient::related_keywords(self, query).await
    }

    async fn health(&self) -> bool {
        self.probe().await
    }
}

/// Minimal percent-encoding for a query-string value.
fn urlencode(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}
