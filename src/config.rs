use serde::Deserialize;
use std::fs;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub limiter: LimiterConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiscoveryConfig {
    #[serde(default = "default_fanout_limit")]
    pub fanout_limit: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_round_timeout")]
    pub round_timeout_secs: u64,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_max_stale")]
    pub max_stale_secs: u64,
    #[serde(default = "default_tracked_symbols")]
    pub tracked_symbols: Vec<String>,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimiterConfig {
    #[serde(default = "default_base_cooldown")]
    pub base_cooldown_secs: u64,
    #[serde(default = "default_rate_limited_cooldown")]
    pub rate_limited_cooldown_secs: u64,
    #[serde(default = "default_max_cooldown")]
    pub max_cooldown_secs: u64,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_fanout_limit() -> usize { 6 }
fn default_request_timeout() -> u64 { 5 }
fn default_round_timeout() -> u64 { 6 }
fn default_cache_ttl() -> u64 { 30 }
fn default_max_stale() -> u64 { 300 }
fn default_tracked_symbols() -> Vec<String> {
    ["BTC", "ETH", "SOL"].iter().map(|s| s.to_string()).collect()
}
fn default_refresh_interval() -> u64 { 60 }
fn default_base_cooldown() -> u64 { 5 }
fn default_rate_limited_cooldown() -> u64 { 30 }
fn default_max_cooldown() -> u64 { 600 }
fn default_failure_threshold() -> u32 { 3 }
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8090 }

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            fanout_limit: default_fanout_limit(),
            request_timeout_secs: default_request_timeout(),
            round_timeout_secs: default_round_timeout(),
            cache_ttl_secs: default_cache_ttl(),
            max_stale_secs: default_max_stale(),
            tracked_symbols: default_tracked_symbols(),
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            base_cooldown_secs: default_base_cooldown(),
            rate_limited_cooldown_secs: default_rate_limited_cooldown(),
            max_cooldown_secs: default_max_cooldown(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string("config.toml")?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let cfg = Config::default();
        assert!(cfg.discovery.fanout_limit > 0);
        assert!(cfg.discovery.round_timeout_secs >= cfg.discovery.request_timeout_secs);
        assert_eq!(cfg.limiter.failure_threshold, 3);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [discovery]
            cache_ttl_secs = 10

            [server]
            port = 9000
            "#,
        )
        .unwrap();
        assert_eq!(cfg.discovery.cache_ttl_secs, 10);
        assert_eq!(cfg.discovery.fanout_limit, 6);
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.limiter.max_cooldown_secs, 600);
    }
}
