//! Page-scraping engine over pooled browser sessions
//!
//! A [`PageScraper`] borrows one session for its lifetime and runs
//! category-specific extraction pipelines against the Naver mobile UI.
//! The engine is defensive by construction: selector candidates are probed
//! in order and the first match wins, an absent region is `no_content`
//! rather than a failure, and any navigation or DOM fault is converted
//! into a typed `error` result. No scraping failure ever crosses this
//! boundary as an exception - the orchestrator must keep going regardless.
//!
//! Classification is decoupled from the browser behind [`RegionFetch`]:
//! the rules turning raw region texts into per-category outcomes are
//! plain functions over that trait, driven in-memory by tests and through
//! a pooled Chrome page in production.

pub mod extract;
pub mod types;

pub use types::{
    CategoryOutcome, Competition, KeywordCategory, KeywordHarvest, ScrapeStatus, ScrapedKeyword,
    ScrapingResult, SimilarityBucket,
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::page::Page;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::browser_pool::{BrowserPool, ChromeFactory, SessionGuard};
use crate::config::ScrapeConfig;
use crate::error::PoolError;

/// Fetches the raw texts of one category region from a physical page.
///
/// `Ok(None)` means the region is absent - a legitimate outcome, common on
/// low-traffic queries. `Err` is a navigation or DOM fault. [`PageScraper`]
/// is the browser-backed implementation.
#[async_trait]
pub trait RegionFetch: Send + Sync {
    async fn region_texts(
        &self,
        query: &str,
        category: KeywordCategory,
        page_no: u8,
    ) -> Result<Option<Vec<String>>>;
}

/// Consult a second result page only when page 1 matched but yielded
/// fewer keywords than the per-category cap.
pub fn should_consult_second_page(page1_count: usize, cap: usize) -> bool {
    page1_count > 0 && page1_count < cap
}

/// Classify one category's raw texts into a typed result.
///
/// A matched region whose texts all fail validation is `no_content`, so
/// `success` always implies at least one keyword.
pub fn category_result(
    query: &str,
    category: KeywordCategory,
    texts: &[String],
    pages: Vec<u8>,
    config: &ScrapeConfig,
) -> ScrapingResult {
    let keywords = extract::build_keywords(texts, query, category, config);
    if keywords.is_empty() {
        return ScrapingResult::no_content(format!(
            "{category} region matched but yielded no valid keywords"
        ))
        .with_pages(pages);
    }

    info!(
        %category,
        query,
        count = keywords.len(),
        raw = texts.len(),
        "category scrape succeeded"
    );
    ScrapingResult::success(
        keywords,
        format!("collected {category} keywords for '{query}'"),
    )
    .with_pages(pages)
}

/// Scrape one category through `fetch`. Never returns an error: faults
/// become `status = error`, an absent region becomes `no_content`.
pub async fn scrape_category_with(
    fetch: &dyn RegionFetch,
    query: &str,
    category: KeywordCategory,
    config: &ScrapeConfig,
) -> ScrapingResult {
    if category == KeywordCategory::RelatedSearch {
        return scrape_related_search_with(fetch, query, config).await;
    }

    match fetch.region_texts(query, category, 1).await {
        Ok(Some(texts)) => category_result(query, category, &texts, vec![1], config),
        Ok(None) => {
            debug!(%category, query, "region absent, no content");
            ScrapingResult::no_content(format!("no {category} region found for '{query}'"))
        }
        Err(e) => {
            warn!(%category, query, error = %format!("{e:#}"), "category scrape failed");
            ScrapingResult::error(format!("{category} scrape failed: {e:#}"))
        }
    }
}

/// Related-search spans physical pages. Page 2 is consulted only per
/// [`should_consult_second_page`], and a page-2 fault degrades to the
/// page-1 result instead of failing.
async fn scrape_related_search_with(
    fetch: &dyn RegionFetch,
    query: &str,
    config: &ScrapeConfig,
) -> ScrapingResult {
    let category = KeywordCategory::RelatedSearch;

    let mut texts = match fetch.region_texts(query, category, 1).await {
        Ok(Some(texts)) => texts,
        Ok(None) => {
            return ScrapingResult::no_content(format!(
                "no {category} region found for '{query}'"
            ))
        }
        Err(e) => {
            warn!(query, error = %format!("{e:#}"), "related-search page 1 failed");
            return ScrapingResult::error(format!("{category} scrape failed: {e:#}"));
        }
    };

    let mut pages = vec![1];
    let page1_count = extract::build_keywords(&texts, query, category, config).len();

    if should_consult_second_page(page1_count, config.max_keywords_per_category) {
        debug!(query, page1_count, "below target after page 1, consulting page 2");
        match fetch.region_texts(query, category, 2).await {
            Ok(Some(more)) => {
                texts.extend(more);
                pages.push(2);
            }
            Ok(None) => debug!(query, "related-search page 2 empty"),
            Err(e) => warn!(query, error = %format!("{e:#}"), "page 2 fetch failed, keeping page 1"),
        }
    }

    category_result(query, category, &texts, pages, config)
}

/// Scrape the requested categories sequentially, in caller order, with a
/// small jitter between them out of politeness to the target site.
///
/// Returns the per-category outcome map plus a union keyword list that is
/// unique by normalized text.
pub async fn scrape_all_with(
    fetch: &dyn RegionFetch,
    query: &str,
    categories: &[KeywordCategory],
    config: &ScrapeConfig,
) -> KeywordHarvest {
    let mut outcomes: BTreeMap<KeywordCategory, CategoryOutcome> = BTreeMap::new();
    let mut union = Vec::new();

    for (index, &category) in categories.iter().enumerate() {
        if index > 0 {
            let jitter = rand::rng().random_range(200..600);
            tokio::time::sleep(Duration::from_millis(jitter)).await;
        }

        let result = scrape_category_with(fetch, query, category, config).await;
        outcomes.insert(category, CategoryOutcome::from(&result));
        union.extend(result.keywords);
    }

    KeywordHarvest {
        query: query.to_string(),
        keywords: extract::dedup_union(union),
        categories: outcomes,
    }
}

/// Scrapes keyword regions using one pooled browser session.
///
/// `close()` releases the session back to the pool exactly once; dropping
/// the scraper without calling it releases via the guard's RAII path.
pub struct PageScraper {
    guard: Option<SessionGuard<ChromeFactory>>,
    config: ScrapeConfig,
}

impl PageScraper {
    /// Acquire a session from the pool. Surfaces `Exhausted` /
    /// `AcquireTimeout` unchanged so callers can degrade gracefully.
    pub async fn initialize(
        pool: &Arc<BrowserPool<ChromeFactory>>,
        config: ScrapeConfig,
    ) -> Result<Self, PoolError> {
        let guard = pool.acquire().await?;
        info!(session_id = guard.id(), "page scraper initialized");
        Ok(Self {
            guard: Some(guard),
            config,
        })
    }

    fn page(&self) -> Result<&Page> {
        self.guard
            .as_ref()
            .and_then(|g| g.session())
            .map(|s| s.page())
            .ok_or_else(|| anyhow!("scraper session already released"))
    }

    /// Scrape one category with this scraper's session and config.
    pub async fn scrape_category(&self, query: &str, category: KeywordCategory) -> ScrapingResult {
        scrape_category_with(self, query, category, &self.config).await
    }

    /// Scrape the requested categories; see [`scrape_all_with`].
    pub async fn scrape_all_keywords(
        &self,
        query: &str,
        categories: &[KeywordCategory],
    ) -> KeywordHarvest {
        scrape_all_with(self, query, categories, &self.config).await
    }

    /// Navigate to the category's page and probe the ordered selector
    /// candidates until the load-settle deadline.
    ///
    /// `Ok(None)` means the region never appeared (not an error). Selector
    /// probe faults are absorbed and the next candidate is tried.
    async fn collect_region_texts(
        &self,
        query: &str,
        category: KeywordCategory,
        page_no: u8,
    ) -> Result<Option<Vec<String>>> {
        let page = self.page()?;
        let url = self
            .config
            .urls
            .page_url(category, query, page_no)
            .context("build target url")?;

        debug!(%category, %url, "navigating");
        tokio::time::timeout(self.config.page_load_timeout, async {
            page.goto(url.as_str()).await.context("navigate")?;
            page.wait_for_navigation().await.context("wait for load")?;
            Ok::<_, anyhow::Error>(())
        })
        .await
        .map_err(|_| anyhow!("page load timed out after {:?}", self.config.page_load_timeout))??;

        let selectors = self.config.selectors_for(category);
        let deadline = Instant::now() + self.config.page_load_timeout;

        // Regions render client-side after navigation settles, so keep
        // probing the candidate list until the deadline.
        loop {
            for selector in &selectors {
                let elements = match page.find_elements(selector.as_str()).await {
                    Ok(elements) => elements,
                    Err(e) => {
                        debug!(selector = %selector, error = %e, "selector probe failed, trying next");
                        continue;
                    }
                };
                if elements.is_empty() {
                    continue;
                }

                let mut texts = Vec::with_capacity(elements.len());
                for element in elements {
                    if let Ok(Some(text)) = element.inner_text().await {
                        texts.push(text);
                    }
                }
                if !texts.is_empty() {
                    debug!(%category, selector = %selector, matched = texts.len(), "selector candidate matched");
                    return Ok(Some(texts));
                }
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.config.settle_poll_interval).await;
        }
    }

    /// Release the session back to the pool. Safe no matter how scraping
    /// went; a second call through drop is a no-op.
    pub async fn close(mut self) {
        if let Some(mut guard) = self.guard.take() {
            guard.release().await;
            debug!("page scraper closed, session released");
        }
    }
}

#[async_trait]
impl RegionFetch for PageScraper {
    async fn region_texts(
        &self,
        query: &str,
        category: KeywordCategory,
        page_no: u8,
    ) -> Result<Option<Vec<String>>> {
        self.collect_region_texts(query, category, page_no).await
    }
}
