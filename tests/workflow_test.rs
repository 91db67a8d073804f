// Orchestrator semantics with stub sources: partial failure degrades
// gracefully, total failure is reported not raised, the quick path never
// touches the browser, and health is a per-source AND.

use async_trait::async_trait;
use chrono::Utc;
use kwscout::scraper::types::{
    CategoryOutcome, KeywordCategory, KeywordHarvest, ScrapeStatus, ScrapedKeyword,
};
use kwscout::workflow::{ApiSource, ScrapeSource, WorkflowOrchestrator};
use kwscout::{AnalysisCache, ApiError, ApiKeyword, ApiKeywordData};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn sample_harvest(query: &str) -> KeywordHarvest {
    let keyword = |text: &str, category| ScrapedKeyword {
        keyword: text.to_string(),
        category,
        search_volume: None,
        competition: None,
        similarity: None,
        source: "naver_mobile_search".to_string(),
    };

    let mut categories = BTreeMap::new();
    categories.insert(
        KeywordCategory::Trending,
        CategoryOutcome {
            status: ScrapeStatus::Success,
            message: "2 keywords".to_string(),
            count: 2,
            pages: None,
        },
    );
    categories.insert(
        KeywordCategory::Smartblock,
        CategoryOutcome {
            status: ScrapeStatus::NoContent,
            message: "region absent".to_string(),
            count: 0,
            pages: None,
        },
    );

    KeywordHarvest {
        query: query.to_string(),
        keywords: vec![
            keyword("강남역 점심", KeywordCategory::Trending),
            keyword("강남역 저녁", KeywordCategory::Trending),
        ],
        categories,
    }
}

fn sample_api_data(query: &str) -> ApiKeywordData {
    ApiKeywordData {
        query: query.to_string(),
        keywords: vec![
            ApiKeyword {
                keyword: "맛집 추천".to_string(),
                monthly_pc_searches: Some(1_000),
                monthly_mobile_searches: Some(9_000),
                competition: None,
            },
            ApiKeyword {
                keyword: "맛집 예약".to_string(),
                monthly_pc_searches: Some(10),
                monthly_mobile_searches: None, // masked: excluded from totals
                competition: None,
            },
        ],
        fetched_at: Utc::now(),
    }
}

#[derive(Default)]
struct StubScrape {
    fail: bool,
    healthy: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl ScrapeSource for StubScrape {
    async fn collect(
        &self,
        query: &str,
        _categories: &[KeywordCategory],
    ) -> anyhow::Result<KeywordHarvest> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("browser launch failed");
        }
        Ok(sample_harvest(query))
    }

    async fn health(&self) -> bool {
        self.healthy
    }
}

#[derive(Default)]
struct StubApi {
    fail: bool,
    healthy: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl ApiSource for StubApi {
    async fn related_keywords(&self, query: &str) -> Result<ApiKeywordData, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ApiError::Status {
                code: 500,
                url: "https://api.example.test".to_string(),
            });
        }
        Ok(sample_api_data(query))
    }

    async fn health(&self) -> bool {
        self.healthy
    }
}

fn orchestrator(
    scrape: StubScrape,
    api: StubApi,
) -> (WorkflowOrchestrator, Arc<StubScrape>, Arc<StubApi>) {
    let scrape = Arc::new(scrape);
    let api = Arc::new(api);
    let orchestrator = WorkflowOrchestrator::new(
        Arc::clone(&scrape) as Arc<dyn ScrapeSource>,
        Arc::clone(&api) as Arc<dyn ApiSource>,
        Arc::new(AnalysisCache::default()),
    );
    (orchestrator, scrape, api)
}

#[tokio::test]
async fn complete_run_with_both_sources_healthy() {
    let (orchestrator, _, _) = orchestrator(StubScrape::default(), StubApi::default());

    let result = orchestrator
        .execute_complete("맛집", &KeywordCategory::ALL)
        .await;

    assert!(result.success);
    assert!(result.failed_sources.is_empty());
    assert_eq!(result.scraping_data.as_ref().unwrap().total_count(), 2);
    assert_eq!(result.api_data.as_ref().unwrap().keywords.len(), 2);

    let analysis = result.keyword_analysis.unwrap();
    assert_eq!(analysis.total_unique_keywords, 2);
    assert_eq!(
        analysis.per_category_counts.get(&KeywordCategory::Trending),
        Some(&2)
    );
    assert_eq!(analysis.api_keyword_count, 2);
    // Only the row with both device counts contributes
    assert_eq!(analysis.total_monthly_searches, 10_000);
}

#[tokio::test]
async fn scraping_failure_still_returns_api_payload() {
    let (orchestrator, _, _) = orchestrator(
        StubScrape {
            fail: true,
            ..Default::default()
        },
        StubApi::default(),
    );

    let result = orchestrator
        .execute_complete("맛집", &KeywordCategory::ALL)
        .await;

    assert!(result.success, "one surviving source is a partial success");
    assert_eq!(result.failed_sources, vec!["scraping".to_string()]);
    assert!(result.scraping_data.is_none());
    assert!(result.api_data.is_some());
    assert!(result.keyword_analysis.is_some());
    assert!(result.execution_time_seconds > 0.0);
    assert!(result.message.contains("scraping"));
}

#[tokio::test]
async fn api_failure_still_returns_scrape_payload() {
    let (orchestrator, _, _) = orchestrator(
        StubScrape::default(),
        StubApi {
            fail: true,
            ..Default::default()
        },
    );

    let result = orchestrator
        .execute_complete("맛집", &KeywordCategory::ALL)
        .await;

    assert!(result.success);
    assert_eq!(result.failed_sources, vec!["naver_api".to_string()]);
    assert!(result.scraping_data.is_some());
    assert!(result.api_data.is_none());

    let analysis = result.keyword_analysis.unwrap();
    assert_eq!(analysis.api_keyword_count, 0);
    assert_eq!(analysis.total_monthly_searches, 0);
}

#[tokio::test]
async fn total_failure_is_reported_not_raised() {
    let (orchestrator, _, _) = orchestrator(
        StubScrape {
            fail: true,
            ..Default::default()
        },
        StubApi {
            fail: true,
            ..Default::default()
        },
    );

    let result = orchestrator
        .execute_complete("맛집", &KeywordCategory::ALL)
        .await;

    assert!(!result.success);
    assert_eq!(result.failed_sources.len(), 2);
    assert!(result.scraping_data.is_none());
    assert!(result.api_data.is_none());
    assert!(result.keyword_analysis.is_none());
    assert!(result.message.contains("all sources failed"));
}

#[tokio::test]
async fn quick_path_never_touches_the_scrape_source() {
    let (orchestrator, scrape, api) = orchestrator(StubScrape::default(), StubApi::default());

    let result = orchestrator.execute_quick("맛집").await;

    assert!(result.success);
    assert_eq!(scrape.calls.load(Ordering::SeqCst), 0);
    assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    assert!(result.scraping_data.is_none());
    assert!(result.api_data.is_some());
    // Analysis derived from the API payload alone
    let analysis = result.keyword_analysis.unwrap();
    assert_eq!(analysis.total_unique_keywords, 0);
    assert_eq!(analysis.api_keyword_count, 2);
}

#[tokio::test]
async fn quick_path_reuses_cached_analysis_from_a_complete_run() {
    let (orchestrator, _, _) = orchestrator(StubScrape::default(), StubApi::default());

    let complete = orchestrator
        .execute_complete("맛집", &KeywordCategory::ALL)
        .await;
    let cached = complete.keyword_analysis.unwrap();

    let quick = orchestrator.execute_quick("맛집").await;
    let analysis = quick.keyword_analysis.unwrap();

    // The cached analysis carries scrape-derived counts the quick path
    // could not have computed itself
    assert_eq!(analysis.total_unique_keywords, 2);
    assert_eq!(analysis.generated_at, cached.generated_at);
}

#[tokio::test]
async fn quick_path_serves_cached_analysis_when_api_fails() {
    let cache = Arc::new(AnalysisCache::default());
    let warm = WorkflowOrchestrator::new(
        Arc::new(StubScrape::default()),
        Arc::new(StubApi::default()),
        Arc::clone(&cache),
    );
    warm.execute_complete("맛집", &KeywordCategory::ALL).await;

    let orchestrator = WorkflowOrchestrator::new(
        Arc::new(StubScrape::default()),
        Arc::new(StubApi {
            fail: true,
            ..Default::default()
        }),
        cache,
    );
    let result = orchestrator.execute_quick("맛집").await;

    // The cache hit counts as a succeeded source
    assert!(result.success);
    assert_eq!(result.failed_sources, vec!["naver_api".to_string()]);
    assert!(result.api_data.is_none());
    assert_eq!(result.keyword_analysis.unwrap().total_unique_keywords, 2);
}

#[tokio::test]
async fn quick_path_with_cold_cache_and_failed_api_fails_outright() {
    let (orchestrator, _, _) = orchestrator(
        StubScrape::default(),
        StubApi {
            fail: true,
            ..Default::default()
        },
    );

    let result = orchestrator.execute_quick("맛집").await;

    assert!(!result.success);
    assert!(result.api_data.is_none());
    assert!(result.keyword_analysis.is_none());
    assert!(result.message.contains("all sources failed"));
}

#[tokio::test]
async fn scraping_only_path_never_touches_the_api_source() {
    let (orchestrator, scrape, api) = orchestrator(StubScrape::default(), StubApi::default());

    let result = orchestrator
        .execute_scraping_only("맛집", &[KeywordCategory::Trending])
        .await;

    assert!(result.success);
    assert_eq!(scrape.calls.load(Ordering::SeqCst), 1);
    assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    assert!(result.api_data.is_none());
    assert_eq!(result.keyword_analysis.unwrap().api_keyword_count, 0);
}

#[tokio::test]
async fn scraping_only_failure_means_overall_failure() {
    let (orchestrator, _, _) = orchestrator(
        StubScrape {
            fail: true,
            ..Default::default()
        },
        StubApi::default(),
    );

    let result = orchestrator
        .execute_scraping_only("맛집", &KeywordCategory::ALL)
        .await;

    assert!(!result.success);
    assert!(result.keyword_analysis.is_none());
}

#[tokio::test]
async fn health_is_the_logical_and_of_source_probes() {
    let cases = [
        (true, true, true),
        (true, false, false),
        (false, true, false),
        (false, false, false),
    ];

    for (scrape_ok, api_ok, expected) in cases {
        let (orchestrator, _, _) = orchestrator(
            StubScrape {
                healthy: scrape_ok,
                ..Default::default()
            },
            StubApi {
                healthy: api_ok,
                ..Default::default()
            },
        );

        let report = orchestrator.health_check().await;
        assert_eq!(report.scraping, scrape_ok);
        assert_eq!(report.api, api_ok);
        assert_eq!(report.overall, expected);
    }
}

#[tokio::test]
async fn slow_source_does_not_block_the_other_from_completing() {
    struct SlowApi;

    #[async_trait]
    impl ApiSource for SlowApi {
        async fn related_keywords(&self, query: &str) -> Result<ApiKeywordData, ApiError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(sample_api_data(query))
        }

        async fn health(&self) -> bool {
            true
        }
    }

    let orchestrator = WorkflowOrchestrator::new(
        Arc::new(StubScrape::default()),
        Arc::new(SlowApi),
        Arc::new(AnalysisCache::default()),
    );

    let result = orchestrator
        .execute_complete("맛집", &KeywordCategory::ALL)
        .await;

    // Both settled: the fast scrape result was not dropped while waiting
    assert!(result.success);
    assert!(result.scraping_data.is_some());
    assert!(result.api_data.is_some());
}
