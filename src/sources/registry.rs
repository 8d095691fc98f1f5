use parking_lot::Mutex;
use std::sync::Arc;

use super::kind::SourceKind;
use crate::models::SourceStatus;

pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 5;

/// Static identity of one price provider. Never mutated after startup.
#[derive(Debug, Clone)]
pub struct PriceSource {
    pub name: String,
    pub endpoint_template: String,
    pub kind: SourceKind,
    pub rate_limit_per_minute: u32,
    pub initial_priority: u8,
}

/// Mutable health fields, one lock per source.
#[derive(Debug)]
pub struct SourceHealth {
    pub priority: u8,
    pub active: bool,
    pub consecutive_failures: u32,
    pub success_streak: u32,
}

pub struct SourceEntry {
    pub source: PriceSource,
    pub health: Mutex<SourceHealth>,
}

impl SourceEntry {
    pub fn new(source: PriceSource) -> Self {
        let priority = source.initial_priority.clamp(MIN_PRIORITY, MAX_PRIORITY);
        Self {
            source,
            health: Mutex::new(SourceHealth {
                priority,
                active: true,
                consecutive_failures: 0,
                success_streak: 0,
            }),
        }
    }
}

/// Holds every configured provider for the process lifetime. Sources are never
/// removed; only their health fields change.
pub struct SourceRegistry {
    entries: Vec<Arc<SourceEntry>>,
}

impl SourceRegistry {
    pub fn from_sources(sources: Vec<PriceSource>) -> Self {
        Self {
            entries: sources.into_iter().map(|s| Arc::new(SourceEntry::new(s))).collect(),
        }
    }

    /// The production source table. Free-tier budgets, deliberately low.
    pub fn builtin() -> Self {
        let sources = vec![
            PriceSource {
                name: "coingecko".to_string(),
                endpoint_template:
                    "https://api.coingecko.com/api/v3/simple/price?ids={symbol}&vs_currencies=usd"
                        .to_string(),
                kind: SourceKind::GenericAggregator,
                rate_limit_per_minute: 10,
                initial_priority: 5,
            },
            PriceSource {
                name: "binance".to_string(),
                endpoint_template: "https://api.binance.com/api/v3/ticker/price?symbol={symbol}"
                    .to_string(),
                kind: SourceKind::ExchangeTicker,
                rate_limit_per_minute: 60,
                initial_priority: 5,
            },
            PriceSource {
                name: "binance_us".to_string(),
                endpoint_template: "https://api.binance.us/api/v3/ticker/price?symbol={symbol}"
                    .to_string(),
                kind: SourceKind::ExchangeTicker,
                rate_limit_per_minute: 30,
                initial_priority: 3,
            },
            PriceSource {
                name: "mexc".to_string(),
                endpoint_template: "https://api.mexc.com/api/v3/ticker/price?symbol={symbol}"
                    .to_string(),
                kind: SourceKind::ExchangeTicker,
                rate_limit_per_minute: 60,
                initial_priority: 3,
            },
            PriceSource {
                name: "dexscreener".to_string(),
                endpoint_template: "https://api.dexscreener.com/latest/dex/search?q={symbol}"
                    .to_string(),
                kind: SourceKind::DexQuote,
                rate_limit_per_minute: 30,
                initial_priority: 4,
            },
            PriceSource {
                name: "pyth".to_string(),
                endpoint_template:
                    "https://hermes.pyth.network/api/latest_price_feeds?ids[]={symbol}".to_string(),
                kind: SourceKind::BlockchainRpc,
                rate_limit_per_minute: 30,
                initial_priority: 4,
            },
        ];
        Self::from_sources(sources)
    }

    /// Active sources for one fan-out round: priority descending, ties broken
    /// by the lowest recent failure count. Sorts over the live health fields
    /// so every health update is reflected on the next call.
    pub fn list_active_by_priority(&self, limit: usize) -> Vec<Arc<SourceEntry>> {
        let mut candidates: Vec<(u8, u32, Arc<SourceEntry>)> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let health = entry.health.lock();
                if health.active {
                    Some((health.priority, health.consecutive_failures, entry.clone()))
                } else {
                    None
                }
            })
            .collect();

        candidates.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        candidates.into_iter().take(limit).map(|(_, _, e)| e).collect()
    }

    pub fn entries(&self) -> &[Arc<SourceEntry>] {
        &self.entries
    }

    pub fn status(&self) -> Vec<SourceStatus> {
        self.entries
            .iter()
            .map(|entry| {
                let health = entry.health.lock();
                SourceStatus {
                    name: entry.source.name.clone(),
                    kind: entry.source.kind.as_str().to_string(),
                    priority: health.priority,
                    active: health.active,
                    consecutive_failures: health.consecutive_failures,
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
