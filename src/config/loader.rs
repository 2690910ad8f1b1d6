use std::collections::HashSet;
use std::path::Path;
use crate::config::feeds::{default_feeds, FeedConfig};
use crate::config::views::ViewsConfig;
use crate::config::*;
use crate::error::{Error, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub cache: CacheConfig,
    pub stream: StreamConfig,
    pub rate_limit: RateLimitConfig,
    pub fx: FxConfig,
    pub health: HealthConfig,
    pub feeds: Vec<FeedConfig>,
    pub views: ViewsConfig,
    pub reference: ReferenceConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            cache: CacheConfig::default(),
            stream: StreamConfig::default(),
            rate_limit: RateLimitConfig::default(),
            fx: FxConfig::default(),
            health: HealthConfig::default(),
            feeds: default_feeds(),
            views: ViewsConfig::default(),
            reference: ReferenceConfig::default(),
        }
    }
}

impl AppConfig {
    /// Layers `config/default`, `config/{env}` and `KIMP_*` environment variables.
    pub fn load(env: &str) -> Result<Self> {
        Self::load_from("config", env)
    }

    pub fn load_from(dir: impl AsRef<Path>, env: &str) -> Result<Self> {
        let dir = dir.as_ref();
        let config = Config::builder()
            .add_source(File::from(dir.join("default")).required(false))
            .add_source(File::from(dir.join(env)).required(false))
            .add_source(
                Environment::with_prefix("KIMP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        let app: AppConfig = config.try_deserialize()
            .map_err(|e| Error::Config(e.to_string()))?;

        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for feed in &self.feeds {
            if !seen.insert((feed.exchange, feed.kind)) {
                return Err(Error::Config(format!("duplicate feed {}", feed.name())));
            }
            if feed.interval_ms == 0 || feed.timeout_ms == 0 {
                return Err(Error::Config(format!("feed {} needs a non-zero interval and timeout", feed.name())));
            }
            if feed.timeout_ms >= feed.interval_ms {
                return Err(Error::Config(format!(
                    "feed {} timeout ({}ms) must be shorter than its interval ({}ms)",
                    feed.name(), feed.timeout_ms, feed.interval_ms
                )));
            }
            if feed.max_connections == 0 {
                return Err(Error::Config(format!("feed {} needs at least one connection", feed.name())));
            }
        }

        if self.stream.tick_ms == 0 {
            return Err(Error::Config("stream.tick_ms must be non-zero".to_string()));
        }

        let limits = &self.rate_limit;
        if limits.refill_interval_ms == 0 || limits.max_tokens == 0 || limits.refill_rate == 0 {
            return Err(Error::Config("rate_limit needs non-zero max_tokens, refill_rate and refill_interval_ms".to_string()));
        }

        let cache = &self.cache;
        let widest = cache.price_ttl_ms.max(cache.stats_ttl_ms) + cache.stale_window_ms;
        if cache.dead_after_ms <= widest {
            return Err(Error::Config(format!(
                "cache.dead_after_ms ({}) must exceed every TTL plus the stale window ({})",
                cache.dead_after_ms, widest
            )));
        }
        if cache.sweep_interval_ms == 0 {
            return Err(Error::Config("cache.sweep_interval_ms must be non-zero".to_string()));
        }

        if self.fx.refresh_interval_ms == 0 || self.fx.timeout_ms >= self.fx.refresh_interval_ms {
            return Err(Error::Config("fx.timeout_ms must be shorter than a non-zero fx.refresh_interval_ms".to_string()));
        }
        if let Some(rate) = self.fx.initial_rate {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(Error::Config(format!("fx.initial_rate must be positive, got {}", rate)));
            }
        }

        Ok(())
    }
}
