use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::config::{CacheConfig, FeedKind};
use crate::types::Timestamp;

/// Staleness tolerance of a cached value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TtlClass {
    Price,
    Stats,
}

impl TtlClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            TtlClass::Price => "price",
            TtlClass::Stats => "stats",
        }
    }
}

impl From<FeedKind> for TtlClass {
    fn from(kind: FeedKind) -> Self {
        match kind {
            FeedKind::Prices => TtlClass::Price,
            FeedKind::Stats => TtlClass::Stats,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TtlPolicy {
    pub price_ttl: Duration,
    pub stats_ttl: Duration,
    pub stale_window: Duration,
}

impl TtlPolicy {
    pub fn from_config(config: &CacheConfig) -> Self {
        TtlPolicy {
            price_ttl: config.price_ttl(),
            stats_ttl: config.stats_ttl(),
            stale_window: config.stale_window(),
        }
    }

    pub fn ttl(&self, class: TtlClass) -> Duration {
        match class {
            TtlClass::Price => self.price_ttl,
            TtlClass::Stats => self.stats_ttl,
        }
    }

    /// Oldest write a reader still accepts: the TTL plus the serve-stale window.
    pub fn max_serve_age(&self, class: TtlClass) -> Duration {
        self.ttl(class) + self.stale_window
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        TtlPolicy::from_config(&CacheConfig::default())
    }
}

/// A cached value plus the bookkeeping needed for freshness checks.
#[derive(Clone, Debug)]
pub struct CacheEntry<T> {
    pub value: T,
    pub ttl_class: TtlClass,
    /// Upstream observation time, used to reject out-of-order writes.
    pub observed_at: Timestamp,
    /// Local time of the last accepted write, used for expiry.
    pub written_at: Timestamp,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, ttl_class: TtlClass, observed_at: Timestamp, written_at: Timestamp) -> Self {
        CacheEntry {
            value,
            ttl_class,
            observed_at,
            written_at,
        }
    }

    pub fn age(&self, now: Timestamp) -> Duration {
        now.saturating_since(self.written_at)
    }

    pub fn is_within(&self, now: Timestamp, max_age: Duration) -> bool {
        self.age(now) <= max_age
    }
}
