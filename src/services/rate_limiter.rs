use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::config::LimiterConfig;
use crate::sources::registry::{SourceRegistry, MAX_PRIORITY, MIN_PRIORITY};
use crate::sources::SourceEntry;

const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
/// Promote priority one step after this many straight successes.
const PROMOTE_AFTER: u32 = 3;
/// Demote priority one step every this many straight failures.
const DEMOTE_EVERY: u32 = 2;
/// Cap on the backoff exponent so the shift never overflows.
const MAX_BACKOFF_EXP: u32 = 10;

#[derive(Debug)]
struct RateLimitState {
    request_count: u32,
    window_start: Instant,
    last_used: Option<Instant>,
    cooldown_until: Option<Instant>,
}

/// Per-source sliding-window limiter and circuit breaker. Refusal is the only
/// failure mode: nothing here blocks, queues, or errors. Callers that get
/// `false` move on to a different source.
pub struct RateLimiter {
    states: DashMap<String, RateLimitState>,
    window: Duration,
    base_cooldown: Duration,
    rate_limited_cooldown: Duration,
    max_cooldown: Duration,
    failure_threshold: u32,
}

impl RateLimiter {
    pub fn new(config: &LimiterConfig) -> Self {
        Self::with_window(config, DEFAULT_WINDOW)
    }

    pub fn with_window(config: &LimiterConfig, window: Duration) -> Self {
        Self {
            states: DashMap::new(),
            window,
            base_cooldown: Duration::from_secs(config.base_cooldown_secs),
            rate_limited_cooldown: Duration::from_secs(config.rate_limited_cooldown_secs),
            max_cooldown: Duration::from_secs(config.max_cooldown_secs),
            failure_threshold: config.failure_threshold,
        }
    }

    /// Claim one request slot. False while cooling down, when the window
    /// budget is spent, or before the minimum inter-request spacing
    /// (`window / rate_limit`) has elapsed.
    pub fn try_acquire(&self, entry: &SourceEntry) -> bool {
        let now = Instant::now();
        let limit = entry.source.rate_limit_per_minute.max(1);

        let mut state = self
            .states
            .entry(entry.source.name.clone())
            .or_insert_with(|| RateLimitState {
                request_count: 0,
                window_start: now,
                last_used: None,
                cooldown_until: None,
            });

        if let Some(until) = state.cooldown_until {
            if now < until {
                return false;
            }
        }

        if now.duration_since(state.window_start) >= self.window {
            state.request_count = 0;
            state.window_start = now;
        }

        if state.request_count >= limit {
            return false;
        }

        let min_interval = self.window / limit;
        if let Some(last) = state.last_used {
            if now.duration_since(last) < min_interval {
                return false;
            }
        }

        state.request_count += 1;
        state.last_used = Some(now);
        true
    }

    pub fn record_success(&self, entry: &SourceEntry) {
        let mut health = entry.health.lock();
        health.consecutive_failures = 0;
        health.success_streak += 1;
        if health.success_streak % PROMOTE_AFTER == 0 && health.priority < MAX_PRIORITY {
            health.priority += 1;
            tracing::debug!(
                "Source {} promoted to priority {}",
                entry.source.name,
                health.priority
            );
        }
    }

    /// Count a failure against the source: exponential capped cooldown
    /// (steeper base for HTTP 429), priority decay, and deactivation once the
    /// failure threshold is reached.
    pub fn record_failure(&self, entry: &SourceEntry, rate_limited: bool) {
        let failures = {
            let mut health = entry.health.lock();
            health.success_streak = 0;
            health.consecutive_failures += 1;
            if health.consecutive_failures % DEMOTE_EVERY == 0 && health.priority > MIN_PRIORITY {
                health.priority -= 1;
            }
            if health.consecutive_failures >= self.failure_threshold && health.active {
                health.active = false;
                tracing::warn!(
                    "Source {} deactivated after {} consecutive failures",
                    entry.source.name,
                    health.consecutive_failures
                );
            }
            health.consecutive_failures
        };

        let base = if rate_limited {
            self.rate_limited_cooldown
        } else {
            self.base_cooldown
        };
        let backoff = base * (1u32 << failures.min(MAX_BACKOFF_EXP));
        let cooldown = backoff.min(self.max_cooldown);

        let now = Instant::now();
        let mut state = self
            .states
            .entry(entry.source.name.clone())
            .or_insert_with(|| RateLimitState {
                request_count: 0,
                window_start: now,
                last_used: None,
                cooldown_until: None,
            });
        state.cooldown_until = Some(now + cooldown);
    }

    /// Background sweep: bring deactivated sources back once their cooldown
    /// has elapsed, with a clean failure count.
    pub fn reactivate_expired(&self, registry: &SourceRegistry) {
        let now = Instant::now();
        for entry in registry.entries() {
            let mut health = entry.health.lock();
            if health.active {
                continue;
            }
            let cooled = match self.states.get(&entry.source.name) {
                Some(state) => state
                    .cooldown_until
                    .map(|until| now >= until)
                    .unwrap_or(true),
                None => true,
            };
            if cooled {
                health.active = true;
                health.consecutive_failures = 0;
                tracing::info!("Source {} reactivated", entry.source.name);
            }
        }
    }

    /// Remaining cooldown for a source, if any. Diagnostic only.
    #[allow(dead_code)]
    pub fn cooldown_remaining(&self, name: &str) -> Option<Duration> {
        let state = self.states.get(name)?;
        let until = state.cooldown_until?;
        let now = Instant::now();
        if until > now {
            Some(until - now)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::kind::SourceKind;
    use crate::sources::registry::PriceSource;

    fn entry_with_limit(limit: u32) -> SourceEntry {
        SourceEntry::new(PriceSource {
            name: "test-source".to_string(),
            endpoint_template: "http://localhost/{symbol}".to_string(),
            kind: SourceKind::ExchangeTicker,
            rate_limit_per_minute: limit,
            initial_priority: 3,
        })
    }

    fn zero_cooldown_config() -> LimiterConfig {
        LimiterConfig {
            base_cooldown_secs: 0,
            rate_limited_cooldown_secs: 0,
            max_cooldown_secs: 0,
            failure_threshold: 3,
        }
    }

    #[test]
    fn burst_grants_at_most_the_window_budget() {
        let limiter = RateLimiter::new(&LimiterConfig::default());
        let entry = entry_with_limit(10);

        let granted = (0..15).filter(|_| limiter.try_acquire(&entry)).count();
        assert!(granted >= 1);
        assert!(granted <= 10);
    }

    #[test]
    fn enforces_minimum_inter_request_spacing() {
        let limiter =
            RateLimiter::with_window(&LimiterConfig::default(), Duration::from_millis(400));
        let entry = entry_with_limit(4); // spacing = 100ms

        assert!(limiter.try_acquire(&entry));
        assert!(!limiter.try_acquire(&entry));
        std::thread::sleep(Duration::from_millis(120));
        assert!(limiter.try_acquire(&entry));
    }

    #[test]
    fn window_resets_after_elapsing() {
        let limiter =
            RateLimiter::with_window(&LimiterConfig::default(), Duration::from_millis(100));
        let entry = entry_with_limit(1);

        assert!(limiter.try_acquire(&entry));
        assert!(!limiter.try_acquire(&entry));
        std::thread::sleep(Duration::from_millis(120));
        assert!(limiter.try_acquire(&entry));
    }

    #[test]
    fn refusal_does_not_touch_health() {
        let limiter = RateLimiter::new(&LimiterConfig::default());
        let entry = entry_with_limit(1);

        assert!(limiter.try_acquire(&entry));
        assert!(!limiter.try_acquire(&entry));
        let health = entry.health.lock();
        assert_eq!(health.consecutive_failures, 0);
        assert!(health.active);
    }

    #[test]
    fn backoff_grows_and_caps() {
        let config = LimiterConfig {
            base_cooldown_secs: 1,
            rate_limited_cooldown_secs: 2,
            max_cooldown_secs: 8,
            failure_threshold: 100, // keep the breaker out of this test
        };
        let limiter = RateLimiter::new(&config);
        let entry = entry_with_limit(60);

        let mut previous = Duration::ZERO;
        for _ in 0..6 {
            limiter.record_failure(&entry, false);
            let remaining = limiter.cooldown_remaining("test-source").unwrap();
            assert!(remaining + Duration::from_millis(50) >= previous);
            assert!(remaining <= Duration::from_secs(8));
            previous = remaining;
        }
        // fully grown: pinned at the cap
        assert!(previous > Duration::from_secs(7));
    }

    #[test]
    fn rate_limited_failures_cool_down_longer() {
        let config = LimiterConfig {
            base_cooldown_secs: 1,
            rate_limited_cooldown_secs: 10,
            max_cooldown_secs: 600,
            failure_threshold: 100,
        };
        let limiter = RateLimiter::new(&config);

        let generic = entry_with_limit(60);
        limiter.record_failure(&generic, false);
        let generic_cooldown = limiter.cooldown_remaining("test-source").unwrap();

        let limiter = RateLimiter::new(&config);
        let throttled = entry_with_limit(60);
        limiter.record_failure(&throttled, true);
        let throttled_cooldown = limiter.cooldown_remaining("test-source").unwrap();

        assert!(throttled_cooldown > generic_cooldown);
    }

    #[test]
    fn cooldown_blocks_acquisition() {
        let config = LimiterConfig {
            base_cooldown_secs: 60,
            ..LimiterConfig::default()
        };
        let limiter = RateLimiter::new(&config);
        let entry = entry_with_limit(60);

        assert!(limiter.try_acquire(&entry));
        limiter.record_failure(&entry, false);
        assert!(!limiter.try_acquire(&entry));
    }

    #[test]
    fn three_failures_deactivate_the_source() {
        let limiter = RateLimiter::new(&zero_cooldown_config());
        let entry = entry_with_limit(60);

        for _ in 0..3 {
            limiter.record_failure(&entry, true);
        }
        assert!(!entry.health.lock().active);
    }

    #[test]
    fn sweep_reactivates_after_cooldown() {
        let limiter = RateLimiter::new(&zero_cooldown_config());
        let registry = SourceRegistry::from_sources(vec![PriceSource {
            name: "test-source".to_string(),
            endpoint_template: "http://localhost/{symbol}".to_string(),
            kind: SourceKind::ExchangeTicker,
            rate_limit_per_minute: 60,
            initial_priority: 3,
        }]);
        let entry = &registry.entries()[0];

        for _ in 0..3 {
            limiter.record_failure(entry, false);
        }
        assert!(!entry.health.lock().active);
        assert!(registry.list_active_by_priority(10).is_empty());

        limiter.reactivate_expired(&registry);
        let health = entry.health.lock();
        assert!(health.active);
        assert_eq!(health.consecutive_failures, 0);
    }

    #[test]
    fn success_resets_failures_and_promotes_slowly() {
        let limiter = RateLimiter::new(&LimiterConfig::default());
        let entry = entry_with_limit(60);

        limiter.record_failure(&entry, false);
        limiter.record_success(&entry);
        assert_eq!(entry.health.lock().consecutive_failures, 0);
        assert_eq!(entry.health.lock().priority, 3);

        limiter.record_success(&entry);
        limiter.record_success(&entry);
        assert_eq!(entry.health.lock().priority, 4);
    }

    #[test]
    fn repeated_failures_demote_priority_to_the_floor() {
        let limiter = RateLimiter::new(&LimiterConfig {
            failure_threshold: 100,
            ..zero_cooldown_config()
        });
        let entry = entry_with_limit(60);

        for _ in 0..20 {
            limiter.record_failure(&entry, false);
        }
        assert_eq!(entry.health.lock().priority, MIN_PRIORITY);
    }
}
