use std::time::Duration;
use serde::{Deserialize, Serialize};

pub mod feeds;
pub mod views;
pub mod loader;

pub use feeds::{FeedConfig, FeedKind};
pub use loader::AppConfig;
pub use views::ViewsConfig;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub health_check_interval_ms: u64,
    pub shutdown_grace_ms: u64,
    /// Restarts allowed per background task before the process gives up.
    pub max_task_restarts: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "0.0.0.0".to_string(),
            port: 3000,
            health_check_interval_ms: 1_000,
            shutdown_grace_ms: 3_000,
            max_task_restarts: 10,
        }
    }
}

impl ServerConfig {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
    /// Used when `RUST_LOG` is not set.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            json: false,
            filter: "info,kimp_engine=debug".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub price_ttl_ms: u64,
    pub stats_ttl_ms: u64,
    /// How far past its TTL an entry is still served while its feed is failing.
    pub stale_window_ms: u64,
    /// Entries with no successful refresh for this long are swept.
    pub dead_after_ms: u64,
    pub sweep_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            price_ttl_ms: 2_000,  // 2s
            stats_ttl_ms: 30_000,  // 30s
            stale_window_ms: 60_000,  // 1 min
            dead_after_ms: 600_000,  // 10 min
            sweep_interval_ms: 30_000,
        }
    }
}

impl CacheConfig {
    pub fn price_ttl(&self) -> Duration {
        Duration::from_millis(self.price_ttl_ms)
    }

    pub fn stats_ttl(&self) -> Duration {
        Duration::from_millis(self.stats_ttl_ms)
    }

    pub fn stale_window(&self) -> Duration {
        Duration::from_millis(self.stale_window_ms)
    }

    pub fn dead_after(&self) -> Duration {
        Duration::from_millis(self.dead_after_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamConfig {
    pub tick_ms: u64,
    pub keep_alive_secs: u64,
    /// Upper bound on a single WebSocket write before the connection is dropped.
    pub write_timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            tick_ms: 200,
            keep_alive_secs: 15,
            write_timeout_ms: 2_000,
        }
    }
}

impl StreamConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_tokens: u32,
    pub refill_rate: u32,
    pub refill_interval_ms: u64,
    pub idle_ttl_ms: u64,
    pub sweep_interval_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            max_tokens: 10,
            refill_rate: 5,
            refill_interval_ms: 1_000,
            idle_ttl_ms: 60_000,
            sweep_interval_ms: 30_000,
        }
    }
}

impl RateLimitConfig {
    pub fn refill_interval(&self) -> Duration {
        Duration::from_millis(self.refill_interval_ms)
    }

    pub fn idle_ttl(&self) -> Duration {
        Duration::from_millis(self.idle_ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct FxConfig {
    pub url: String,
    pub refresh_interval_ms: u64,
    pub timeout_ms: u64,
    /// Oldest rate the calculator will still use.
    pub max_age_ms: u64,
    /// Seeds the cache at startup. Without it premiums stay null until the first fetch.
    pub initial_rate: Option<f64>,
}

impl Default for FxConfig {
    fn default() -> Self {
        FxConfig {
            url: "https://api.coingecko.com/api/v3/simple/price?ids=tether&vs_currencies=krw&include_last_updated_at=true".to_string(),
            refresh_interval_ms: 300_000,  // 5 min
            timeout_ms: 5_000,
            max_age_ms: 3_600_000,  // 1 hour
            initial_rate: None,
        }
    }
}

impl FxConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_millis(self.max_age_ms)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Consecutive failures before a feed is reported degraded.
    pub degraded_after: u32,
    pub warning_after_secs: u64,
    pub critical_after_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        HealthConfig {
            degraded_after: 5,
            warning_after_secs: 60,
            critical_after_secs: 300,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ReferenceConfig {
    /// JSON file of `[{symbol, name_ko, name_en, icon_url}]`.
    pub symbols_path: Option<String>,
}
