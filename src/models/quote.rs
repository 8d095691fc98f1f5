use serde::{Deserialize, Serialize};

/// One source's price observation for one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub source: String,
    pub confidence: f64,
    pub timestamp: i64,
}

impl Quote {
    pub fn new(symbol: String, price: f64, source: String, confidence: f64) -> Self {
        Self {
            symbol,
            price,
            source,
            confidence,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Consensus price as served to consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceResult {
    pub symbol: String,
    pub price: f64,
    /// true when the price came from the fallback ladder rather than live quotes
    pub degraded: bool,
    pub quote_count: usize,
    pub timestamp: i64,
}

impl PriceResult {
    pub fn live(symbol: String, price: f64, quote_count: usize) -> Self {
        Self {
            symbol,
            price,
            degraded: false,
            quote_count,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn degraded(symbol: String, price: f64) -> Self {
        Self {
            symbol,
            price,
            degraded: true,
            quote_count: 0,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}
