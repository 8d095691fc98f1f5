use serde::Deserialize;

use super::symbols;

/// Provider family. Each kind has exactly one URL-building rule and one known
/// response shape; everything provider-specific lives behind this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// CoinGecko simple-price shape: `{"<coin-id>": {"usd": 60234.1}}`
    GenericAggregator,
    /// Binance v3 ticker shape: `{"symbol": "SOLUSDT", "price": "142.51"}`
    /// (Binance-compatible venues share the endpoint verbatim)
    ExchangeTicker,
    /// DexScreener pair-search shape: `{"pairs": [{"baseToken": ..., "priceUsd": "..."}]}`
    DexQuote,
    /// Pyth Hermes feed shape: `[{"price": {"price": "6023412345678", "expo": -8}}]`
    BlockchainRpc,
}

#[derive(Debug, Deserialize)]
struct ExchangeTickerResponse {
    #[allow(dead_code)]
    symbol: String,
    price: String,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::GenericAggregator => "generic-aggregator",
            SourceKind::ExchangeTicker => "exchange-ticker",
            SourceKind::DexQuote => "dex-quote",
            SourceKind::BlockchainRpc => "blockchain-rpc",
        }
    }

    /// Translate a canonical symbol into this provider family's identifier.
    /// `None` means the kind has no way to express the symbol at all.
    pub fn map_symbol(&self, symbol: &str) -> Option<String> {
        match self {
            SourceKind::GenericAggregator => Some(symbols::coingecko_id(symbol)),
            SourceKind::ExchangeTicker => Some(symbols::binance_pair(symbol)),
            SourceKind::DexQuote => Some(symbol.to_uppercase()),
            SourceKind::BlockchainRpc => symbols::pyth_feed_id(symbol),
        }
    }

    pub fn build_url(&self, template: &str, mapped: &str) -> String {
        template.replace("{symbol}", mapped)
    }

    /// Extract one numeric price from a response body. Anything unexpected
    /// collapses to `None`; callers treat that as a transient source failure.
    pub fn parse_price(&self, body: &str, mapped: &str, symbol: &str) -> Option<f64> {
        match self {
            SourceKind::GenericAggregator => {
                let data: serde_json::Value = serde_json::from_str(body).ok()?;
                data[mapped]["usd"].as_f64()
            }
            SourceKind::ExchangeTicker => {
                let ticker: ExchangeTickerResponse = serde_json::from_str(body).ok()?;
                ticker.price.parse::<f64>().ok()
            }
            SourceKind::DexQuote => {
                let data: serde_json::Value = serde_json::from_str(body).ok()?;
                let pairs = data["pairs"].as_array()?;
                for pair in pairs.iter().take(10) {
                    let base = pair["baseToken"]["symbol"].as_str().unwrap_or("");
                    if !base.eq_ignore_ascii_case(symbol) {
                        continue;
                    }
                    if let Some(price) = pair["priceUsd"]
                        .as_str()
                        .and_then(|s| s.parse::<f64>().ok())
                    {
                        if price > 0.0 {
                            return Some(price);
                        }
                    }
                }
                None
            }
            SourceKind::BlockchainRpc => {
                let data: serde_json::Value = serde_json::from_str(body).ok()?;
                let feed = data.as_array()?.first()?;
                let raw = feed["price"]["price"].as_str()?.parse::<f64>().ok()?;
                let expo = feed["price"]["expo"].as_i64()? as i32;
                Some(raw * 10f64.powi(expo))
            }
        }
    }
}
