use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;

use super::aggregator;
use super::cache::PriceCache;
use super::fetcher::{FetchStats, QuoteFetcher};
use super::rate_limiter::RateLimiter;
use crate::config::Config;
use crate::models::{PriceResult, Quote, SourceStatus};
use crate::sources::backup::{BackupSource, CoinCapAssets, CoinbaseSpot};
use crate::sources::{symbols, SourceRegistry};

const ROUND_CONCURRENCY: usize = 8;

/// The price-discovery service: cache-fronted, confidence-weighted consensus
/// over every active source, with a three-tier fallback ladder underneath.
///
/// The one external guarantee that matters: `get_token_price` always returns
/// a positive finite number. No failure inside this subsystem reaches the
/// caller as an error.
pub struct PriceEngine {
    registry: Arc<SourceRegistry>,
    limiter: Arc<RateLimiter>,
    fetcher: QuoteFetcher,
    cache: PriceCache,
    backups: Vec<Arc<dyn BackupSource>>,
    fanout_limit: usize,
    round_timeout: Duration,
}

impl PriceEngine {
    pub fn new(config: &Config) -> Self {
        let backups: Vec<Arc<dyn BackupSource>> =
            vec![Arc::new(CoinbaseSpot::new()), Arc::new(CoinCapAssets::new())];
        Self::with_parts(SourceRegistry::builtin(), config, backups)
    }

    pub fn with_parts(
        registry: SourceRegistry,
        config: &Config,
        backups: Vec<Arc<dyn BackupSource>>,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new(&config.limiter));
        let fetcher = QuoteFetcher::new(
            limiter.clone(),
            Duration::from_secs(config.discovery.request_timeout_secs),
        );
        Self {
            registry: Arc::new(registry),
            limiter,
            fetcher,
            cache: PriceCache::new(
                Duration::from_secs(config.discovery.cache_ttl_secs),
                Duration::from_secs(config.discovery.max_stale_secs),
            ),
            backups,
            fanout_limit: config.discovery.fanout_limit,
            round_timeout: Duration::from_secs(config.discovery.round_timeout_secs),
        }
    }

    pub async fn get_token_price(&self, symbol: &str) -> f64 {
        self.price_result(symbol).await.price
    }

    pub async fn price_result(&self, symbol: &str) -> PriceResult {
        let symbol = symbol.trim().to_uppercase();

        if let Some(hit) = self.cache.get(&symbol) {
            return PriceResult::live(symbol, hit.price, hit.quote_count);
        }

        let quotes = self.fan_out(&symbol).await;
        if let Some(price) = aggregator::aggregate(&quotes) {
            let count = quotes.len();
            self.cache.insert(&symbol, quotes, price);
            return PriceResult::live(symbol, price, count);
        }

        self.fallback(symbol).await
    }

    /// One concurrent batch across the active sources. Each fetch carries its
    /// own timeout; the round's outer timeout is a backstop so a pile-up of
    /// slow sources cannot stall the caller. Fetches still pending when it
    /// fires are abandoned and count as failures.
    async fn fan_out(&self, symbol: &str) -> Vec<Quote> {
        let candidates = self.registry.list_active_by_priority(self.fanout_limit);
        if candidates.is_empty() {
            tracing::warn!("No active sources for {}", symbol);
            return Vec::new();
        }

        let round = stream::iter(candidates)
            .map(|entry| {
                let fetcher = &self.fetcher;
                async move { fetcher.fetch_quote(&entry, symbol).await }
            })
            .buffer_unordered(ROUND_CONCURRENCY)
            .filter_map(|quote| async move { quote })
            .collect::<Vec<Quote>>();

        match tokio::time::timeout(self.round_timeout, round).await {
            Ok(quotes) => quotes,
            Err(_) => {
                tracing::warn!("Fan-out for {} hit the round timeout", symbol);
                Vec::new()
            }
        }
    }

    /// The fallback ladder: stale cache, then backup endpoints, then the
    /// degraded default. Every rung is logged; the last one cannot fail.
    async fn fallback(&self, symbol: String) -> PriceResult {
        if let Some(hit) = self.cache.get_stale(&symbol) {
            tracing::warn!(
                "Serving stale price for {} ({}s old)",
                symbol,
                hit.age.as_secs()
            );
            let mut result = PriceResult::degraded(symbol, hit.price);
            result.quote_count = hit.quote_count;
            return result;
        }

        for backup in &self.backups {
            if let Some(price) = backup.fetch_price(&symbol).await {
                tracing::warn!("Price for {} served by backup {}", symbol, backup.name());
                return PriceResult::degraded(symbol, price);
            }
        }

        let price = symbols::degraded_default(&symbol);
        tracing::warn!(
            "All sources exhausted for {}, serving degraded default {}",
            symbol,
            price
        );
        PriceResult::degraded(symbol, price)
    }

    pub fn source_status(&self) -> Vec<SourceStatus> {
        self.registry.status()
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn cache(&self) -> &PriceCache {
        &self.cache
    }

    pub fn fetch_stats(&self) -> Arc<FetchStats> {
        self.fetcher.stats()
    }
}
