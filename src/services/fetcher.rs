use dashmap::DashMap;
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::aggregator;
use super::rate_limiter::RateLimiter;
use crate::models::Quote;
use crate::sources::{symbols, SourceEntry};

const CLIENT_IDENT: &str = concat!("price-discovery/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Default)]
pub struct FetchStats {
    pub attempted: AtomicU64,
    pub succeeded: AtomicU64,
    pub failed: AtomicU64,
    pub refused: AtomicU64,
}

/// Turns one (source, symbol) pair into zero-or-one quote. Every provider
/// quirk and every failure is absorbed here; nothing propagates past `None`.
pub struct QuoteFetcher {
    client: Client,
    limiter: Arc<RateLimiter>,
    stats: Arc<FetchStats>,
    /// (source, symbol) pairs the source's kind cannot express. Logged once,
    /// then skipped for the process lifetime.
    unmapped: DashMap<(String, String), ()>,
}

impl QuoteFetcher {
    pub fn new(limiter: Arc<RateLimiter>, request_timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(request_timeout)
                .user_agent(CLIENT_IDENT)
                .build()
                .unwrap(),
            limiter,
            stats: Arc::new(FetchStats::default()),
            unmapped: DashMap::new(),
        }
    }

    pub fn stats(&self) -> Arc<FetchStats> {
        self.stats.clone()
    }

    pub async fn fetch_quote(&self, entry: &SourceEntry, symbol: &str) -> Option<Quote> {
        let name = &entry.source.name;

        let key = (name.clone(), symbol.to_string());
        if self.unmapped.contains_key(&key) {
            return None;
        }
        let Some(mapped) = entry.source.kind.map_symbol(symbol) else {
            if self.unmapped.insert(key, ()).is_none() {
                tracing::warn!("{} has no mapping for {}, skipping permanently", name, symbol);
            }
            return None;
        };

        if !self.limiter.try_acquire(entry) {
            self.stats.refused.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        self.stats.attempted.fetch_add(1, Ordering::Relaxed);

        let url = entry.source.kind.build_url(&entry.source.endpoint_template, &mapped);

        let resp = match self.client.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::debug!("{} request for {} failed: {}", name, symbol, e);
                return self.fail(entry, false);
            }
        };

        if resp.status() == 429 {
            tracing::warn!("{} rate limited (429)", name);
            return self.fail(entry, true);
        }
        if !resp.status().is_success() {
            tracing::debug!("{} returned {} for {}", name, resp.status(), symbol);
            return self.fail(entry, false);
        }

        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!("{} body read for {} failed: {}", name, symbol, e);
                return self.fail(entry, false);
            }
        };

        let Some(price) = entry.source.kind.parse_price(&body, &mapped, symbol) else {
            tracing::debug!("{} returned an unparseable body for {}", name, symbol);
            return self.fail(entry, false);
        };
        if !symbols::is_sane_price(price) {
            tracing::debug!("{} quoted a rejected price {} for {}", name, price, symbol);
            return self.fail(entry, false);
        }

        self.limiter.record_success(entry);
        self.stats.succeeded.fetch_add(1, Ordering::Relaxed);

        let confidence = {
            let health = entry.health.lock();
            aggregator::confidence(
                health.priority,
                health.consecutive_failures,
                symbols::in_plausibility_band(symbol, price),
            )
        };

        Some(Quote::new(symbol.to_string(), price, name.clone(), confidence))
    }

    fn fail(&self, entry: &SourceEntry, rate_limited: bool) -> Option<Quote> {
        self.limiter.record_failure(entry, rate_limited);
        self.stats.failed.fetch_add(1, Ordering::Relaxed);
        None
    }
}
