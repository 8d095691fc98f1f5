use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::models::Quote;

pub struct CacheHit {
    pub price: f64,
    pub quote_count: usize,
    pub age: Duration,
}

struct CacheSlot {
    price: f64,
    quotes: Vec<Quote>,
    inserted_at: Instant,
}

/// Short-TTL consensus store, one entry per symbol. Entries past the TTL are
/// never served as fresh, but stay around (up to `max_keep`) for the
/// stale-serving fallback tier. Concurrent fan-outs for one symbol are fine:
/// inserts are last-writer-wins under the lock.
pub struct PriceCache {
    map: RwLock<HashMap<String, CacheSlot>>,
    ttl: Duration,
    max_keep: Duration,
    last_cleanup: RwLock<Instant>,
}

impl PriceCache {
    pub fn new(ttl: Duration, max_keep: Duration) -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
            ttl,
            max_keep: max_keep.max(ttl),
            last_cleanup: RwLock::new(Instant::now()),
        }
    }

    /// Fresh entries only; a hit means no network activity is needed.
    pub fn get(&self, symbol: &str) -> Option<CacheHit> {
        let map = self.map.read();
        let slot = map.get(symbol)?;
        let age = slot.inserted_at.elapsed();
        if age < self.ttl {
            Some(CacheHit {
                price: slot.price,
                quote_count: slot.quotes.len(),
                age,
            })
        } else {
            None
        }
    }

    /// Expired-but-recent entries, for degraded serving when a fan-out round
    /// comes back empty.
    pub fn get_stale(&self, symbol: &str) -> Option<CacheHit> {
        let map = self.map.read();
        let slot = map.get(symbol)?;
        let age = slot.inserted_at.elapsed();
        if age < self.max_keep {
            Some(CacheHit {
                price: slot.price,
                quote_count: slot.quotes.len(),
                age,
            })
        } else {
            None
        }
    }

    pub fn insert(&self, symbol: &str, quotes: Vec<Quote>, price: f64) {
        let mut map = self.map.write();
        map.insert(
            symbol.to_string(),
            CacheSlot {
                price,
                quotes,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Piggybacked sweep: drops entries past the staleness ceiling, at most
    /// once a minute.
    pub fn cleanup_if_needed(&self) {
        let mut last_cleanup = self.last_cleanup.write();
        if last_cleanup.elapsed() < Duration::from_secs(60) {
            return;
        }

        let mut map = self.map.write();
        let before = map.len();
        map.retain(|_, slot| slot.inserted_at.elapsed() < self.max_keep);

        let removed = before - map.len();
        if removed > 0 {
            tracing::info!("🧹 Cleaned {} expired price entries", removed);
        }

        *last_cleanup = Instant::now();
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    /// (symbol, price, age in seconds) for every retained entry.
    pub fn snapshot(&self) -> Vec<(String, f64, u64)> {
        let map = self.map.read();
        map.iter()
            .map(|(symbol, slot)| {
                (
                    symbol.clone(),
                    slot.price,
                    slot.inserted_at.elapsed().as_secs(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quotes_for(symbol: &str, price: f64) -> Vec<Quote> {
        vec![Quote::new(
            symbol.to_string(),
            price,
            "unit".to_string(),
            1.0,
        )]
    }

    #[test]
    fn fresh_entries_hit() {
        let cache = PriceCache::new(Duration::from_secs(30), Duration::from_secs(300));
        cache.insert("SOL", quotes_for("SOL", 142.5), 142.5);

        let hit = cache.get("SOL").unwrap();
        assert_eq!(hit.price, 142.5);
        assert_eq!(hit.quote_count, 1);
        assert!(cache.get("BTC").is_none());
    }

    #[test]
    fn expired_entries_miss_but_serve_stale() {
        let cache = PriceCache::new(Duration::from_millis(10), Duration::from_secs(300));
        cache.insert("SOL", quotes_for("SOL", 142.5), 142.5);

        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get("SOL").is_none());

        let stale = cache.get_stale("SOL").unwrap();
        assert_eq!(stale.price, 142.5);
        assert!(stale.age >= Duration::from_millis(10));
    }

    #[test]
    fn stale_serving_respects_the_ceiling() {
        let cache = PriceCache::new(Duration::from_millis(5), Duration::from_millis(30));
        cache.insert("SOL", quotes_for("SOL", 142.5), 142.5);

        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.get("SOL").is_none());
        assert!(cache.get_stale("SOL").is_none());
    }

    #[test]
    fn insert_overwrites() {
        let cache = PriceCache::new(Duration::from_secs(30), Duration::from_secs(300));
        cache.insert("SOL", quotes_for("SOL", 140.0), 140.0);
        cache.insert("SOL", quotes_for("SOL", 145.0), 145.0);

        assert_eq!(cache.get("SOL").unwrap().price, 145.0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn snapshot_lists_entries() {
        let cache = PriceCache::new(Duration::from_secs(30), Duration::from_secs(300));
        cache.insert("SOL", quotes_for("SOL", 142.5), 142.5);
        cache.insert("BTC", quotes_for("BTC", 60000.0), 60000.0);

        let mut snapshot = cache.snapshot();
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].0, "BTC");
        assert_eq!(snapshot[0].1, 60000.0);
    }
}
