// kwscout CLI: run one keyword-collection workflow and print the result.
//
// Credentials come from NAVER_CLIENT_ID / NAVER_CLIENT_SECRET /
// NAVER_CUSTOMER_ID. Log verbosity via RUST_LOG (tracing EnvFilter).

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use kwscout::{
    AnalysisCache, BrowserPool, ChromeFactory, CollectorConfig, DailyCounter, KeywordCategory,
    NaverApiClient, PoolScrapeSource, RateLimiter, RetryExecutor, WorkflowOrchestrator,
};

enum Mode {
    Complete,
    Quick,
    ScrapingOnly,
}

fn usage() -> ! {
    eprintln!("usage: kwscout <query> [--quick | --scrape-only] [--categories a,b,c]");
    std::process::exit(2);
}

fn parse_categories(raw: &str) -> Result<Vec<KeywordCategory>> {
    raw.split(',')
        .map(|name| match name.trim() {
            "trending" => Ok(KeywordCategory::Trending),
            "smartblock" => Ok(KeywordCategory::Smartblock),
            "related_search" => Ok(KeywordCategory::RelatedSearch),
            "autosuggest" => Ok(KeywordCategory::Autosuggest),
            other => bail!("unknown category '{other}'"),
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let Some(query) = args.next() else { usage() };

    let mut mode = Mode::Complete;
    let mut categories = KeywordCategory::ALL.to_vec();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--quick" => mode = Mode::Quick,
            "--scrape-only" => mode = Mode::ScrapingOnly,
            "--categories" => {
                let raw = args.next().unwrap_or_else(|| usage());
                categories = parse_categories(&raw)?;
            }
            _ => usage(),
        }
    }

    let config = CollectorConfig::builder()
        .api_credentials(
            std::env::var("NAVER_CLIENT_ID").unwrap_or_default(),
            std::env::var("NAVER_CLIENT_SECRET").unwrap_or_default(),
            std::env::var("NAVER_CUSTOMER_ID").unwrap_or_default(),
        )
        .build();

    let limiter = Arc::new(RateLimiter::new(config.rate_rules.clone()));
    let counter = Arc::new(DailyCounter::new(config.api.daily_soft_limit));
    let retry = RetryExecutor::new(config.retry.clone());
    let api = Arc::new(
        NaverApiClient::new(config.api.clone(), limiter, retry, counter)
            .context("build API client")?,
    );

    let pool = BrowserPool::new(ChromeFactory::default(), config.pool.clone());
    pool.warm_up().await;
    let scrape = Arc::new(PoolScrapeSource::new(
        Arc::clone(&pool),
        config.scrape.clone(),
    ));

    let orchestrator =
        WorkflowOrchestrator::new(scrape, api, Arc::new(AnalysisCache::default()));

    let result = match mode {
        Mode::Complete => orchestrator.execute_complete(&query, &categories).await,
        Mode::Quick => orchestrator.execute_quick(&query).await,
        Mode::ScrapingOnly => {
            orchestrator
                .execute_scraping_only(&query, &categories)
                .await
        }
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    pool.shutdown().await;

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
