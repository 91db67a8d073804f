//! Fluent builder for [`CollectorConfig`]

use std::time::Duration;

use crate::browser_pool::PoolConfig;
use crate::rate_limiter::RateLimitRule;
use crate::retry::RetryPolicy;

use super::types::{CollectorConfig, ScrapeConfig};

/// Builder over [`CollectorConfig`] defaults.
///
/// Only credentials have no default; everything else can be left alone.
#[derive(Debug, Clone, Default)]
pub struct CollectorConfigBuilder {
    config: CollectorConfig,
}

impl CollectorConfigBuilder {
    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.config.pool = pool;
        self
    }

    pub fn pool_size(mut self, min_size: usize, max_size: usize) -> Self {
        self.config.pool.min_size = min_size;
        self.config.pool.max_size = max_size.max(1);
        self
    }

    pub fn scrape(mut self, scrape: ScrapeConfig) -> Self {
        self.config.scrape = scrape;
        self
    }

    pub fn max_keywords_per_category(mut self, cap: usize) -> Self {
        self.config.scrape.max_keywords_per_category = cap;
        self
    }

    pub fn api_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        customer_id: impl Into<String>,
    ) -> Self {
        self.config.api.client_id = client_id.into();
        self.config.api.client_secret = client_secret.into();
        self.config.api.customer_id = customer_id.into();
        self
    }

    pub fn api_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.api.base_url = base_url.into();
        self
    }

    pub fn retry(mut self, max_attempts: u32, delay: Duration) -> Self {
        self.config.retry = RetryPolicy {
            max_attempts,
            delay,
        };
        self
    }

    /// Replace the whole rate-limit rule table
    pub fn rate_rules(mut self, rules: Vec<RateLimitRule>) -> Self {
        self.config.rate_rules = rules;
        self
    }

    /// Add one rule on top of the existing table
    pub fn rate_rule(mut self, rule: RateLimitRule) -> Self {
        self.config
            .rate_rules
            .retain(|existing| existing.route_key != rule.route_key);
        self.config.rate_rules.push(rule);
        self
    }

    pub fn build(self) -> CollectorConfig {
        self.config
    }
}
