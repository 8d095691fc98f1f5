use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::symbols;

/// Single-purpose endpoints queried only when the primary fan-out comes back
/// empty. They sit outside the registry: no rate-limit bookkeeping, no health
/// tracking, one defensive request each.
#[async_trait]
pub trait BackupSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch_price(&self, symbol: &str) -> Option<f64>;
}

pub struct CoinbaseSpot {
    client: Client,
}

impl CoinbaseSpot {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap(),
        }
    }
}

#[async_trait]
impl BackupSource for CoinbaseSpot {
    fn name(&self) -> &'static str {
        "coinbase-spot"
    }

    async fn fetch_price(&self, symbol: &str) -> Option<f64> {
        let url = format!(
            "https://api.coinbase.com/v2/prices/{}-USD/spot",
            symbol.to_uppercase()
        );

        let resp = self.client.get(&url).send().await.ok()?;
        if !resp.status().is_success() {
            return None;
        }

        let data: serde_json::Value = resp.json().await.ok()?;
        let price = data["data"]["amount"].as_str()?.parse::<f64>().ok()?;
        symbols::is_sane_price(price).then_some(price)
    }
}

pub struct CoinCapAssets {
    client: Client,
}

impl CoinCapAssets {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap(),
        }
    }
}

#[async_trait]
impl BackupSource for CoinCapAssets {
    fn name(&self) -> &'static str {
        "coincap"
    }

    async fn fetch_price(&self, symbol: &str) -> Option<f64> {
        // CoinCap asset ids line up with CoinGecko's for the majors
        let url = format!(
            "https://api.coincap.io/v2/assets/{}",
            symbols::coingecko_id(symbol)
        );

        let resp = self.client.get(&url).send().await.ok()?;
        if !resp.status().is_success() {
            return None;
        }

        let data: serde_json::Value = resp.json().await.ok()?;
        let price = data["data"]["priceUsd"].as_str()?.parse::<f64>().ok()?;
        symbols::is_sane_price(price).then_some(price)
    }
}
