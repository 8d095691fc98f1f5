use lazy_static::lazy_static;
use std::collections::HashMap;

/// Hard floor/ceiling for any price accepted from any source.
pub const MIN_PRICE: f64 = 1e-8;
pub const MAX_PRICE: f64 = 1e8;

lazy_static! {
    /// CoinGecko coin ids. Missing symbols fall back to the lowercased raw symbol.
    static ref COINGECKO_IDS: HashMap<&'static str, &'static str> = HashMap::from([
        ("BTC", "bitcoin"),
        ("ETH", "ethereum"),
        ("SOL", "solana"),
        ("BNB", "binancecoin"),
        ("XRP", "ripple"),
        ("ADA", "cardano"),
        ("DOGE", "dogecoin"),
        ("AVAX", "avalanche-2"),
        ("DOT", "polkadot"),
        ("MATIC", "matic-network"),
        ("LINK", "chainlink"),
        ("RAY", "raydium"),
        ("JUP", "jupiter-exchange-solana"),
        ("USDC", "usd-coin"),
        ("USDT", "tether"),
        ("DAI", "dai"),
    ]);

    /// Pyth price feed ids (hex). Unmapped symbols cannot be queried at all.
    static ref PYTH_FEED_IDS: HashMap<&'static str, &'static str> = HashMap::from([
        ("BTC", "e62df6c8b4a85fe1a67db44dc12de5db330f7ac66b72dc658afedf0f4a415b43"),
        ("ETH", "ff61491a931112ddf1bd8147cd1b641375f79f5825126d665480874634fd0ace"),
        ("SOL", "ef0d8b6fda2ceba41da15d4095d1da392a0d2f8ed0c6c7bc0f4cfac8c280b56d"),
        ("BNB", "2f95862b045670cd22bee3114c39763a4a08beeb663b145d283c31d7d1101c4f"),
        ("USDC", "eaa020c61cc479712813461ce153894a96a6c00b21ed0cfc2798d1f9a9e9c94a"),
        ("USDT", "2b89b9dc8fdf9f34709a5b106b472f0f39bb6ca9ce04b0fd7f2e971688e2e53b"),
    ]);

    /// Per-symbol plausibility bands. Quotes outside the band are down-weighted,
    /// never rejected (the band itself may be stale).
    static ref PLAUSIBILITY_BANDS: HashMap<&'static str, (f64, f64)> = HashMap::from([
        ("BTC", (10_000.0, 500_000.0)),
        ("ETH", (100.0, 50_000.0)),
        ("SOL", (1.0, 5_000.0)),
        ("BNB", (10.0, 10_000.0)),
        ("XRP", (0.01, 100.0)),
        ("DOGE", (0.001, 10.0)),
        ("USDC", (0.5, 2.0)),
        ("USDT", (0.5, 2.0)),
        ("DAI", (0.5, 2.0)),
    ]);

    /// Last-resort prices, served only when every live and cached tier is gone.
    /// Deliberately conservative; their job is to keep dependents finite.
    static ref DEGRADED_DEFAULTS: HashMap<&'static str, f64> = HashMap::from([
        ("BTC", 60_000.0),
        ("ETH", 3_000.0),
        ("SOL", 100.0),
        ("BNB", 500.0),
        ("XRP", 0.5),
        ("DOGE", 0.1),
        ("USDC", 1.0),
        ("USDT", 1.0),
        ("DAI", 1.0),
    ]);
}

pub fn coingecko_id(symbol: &str) -> String {
    COINGECKO_IDS
        .get(symbol.to_uppercase().as_str())
        .map(|id| id.to_string())
        .unwrap_or_else(|| symbol.to_lowercase())
}

pub fn binance_pair(symbol: &str) -> String {
    format!("{}USDT", symbol.to_uppercase())
}

pub fn pyth_feed_id(symbol: &str) -> Option<String> {
    PYTH_FEED_IDS
        .get(symbol.to_uppercase().as_str())
        .map(|id| id.to_string())
}

/// Whether a price is inside the symbol's plausibility band (or the generic
/// order-of-magnitude band when the symbol has none).
pub fn in_plausibility_band(symbol: &str, price: f64) -> bool {
    let (lo, hi) = PLAUSIBILITY_BANDS
        .get(symbol.to_uppercase().as_str())
        .copied()
        .unwrap_or((MIN_PRICE, MAX_PRICE));
    price >= lo && price <= hi
}

/// Degraded-mode default: known majors get a conservative constant, everything
/// else gets 1.0.
pub fn degraded_default(symbol: &str) -> f64 {
    DEGRADED_DEFAULTS
        .get(symbol.to_uppercase().as_str())
        .copied()
        .unwrap_or(1.0)
}

/// Sanity bound applied to every parsed price before it becomes a quote.
pub fn is_sane_price(price: f64) -> bool {
    price.is_finite() && price >= MIN_PRICE && price <= MAX_PRICE
}
