use std::sync::{Arc, RwLock};
use std::time::Duration;
use serde::Serialize;
use crate::cache::entry::{CacheEntry, TtlClass};
use crate::observability::metrics::FX_RATE;
use crate::types::{Clock, Timestamp};

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FxQuote {
    pub rate: f64,
    pub observed_at: Timestamp,
    pub written_at: Timestamp,
}

/// Single-slot cache for the USDT to KRW rate.
pub struct FxCache {
    slot: RwLock<Option<CacheEntry<f64>>>,
    clock: Arc<dyn Clock>,
}

impl FxCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        FxCache {
            slot: RwLock::new(None),
            clock,
        }
    }

    /// Seeds a configured rate. The seed carries no upstream observation
    /// time, so the first live rate always replaces it.
    pub fn with_rate(clock: Arc<dyn Clock>, rate: f64) -> Self {
        let cache = FxCache::new(clock);
        cache.set(rate, Timestamp::from_millis(0));
        cache
    }

    /// Stores a positive rate unless a later observation is already held.
    pub fn set(&self, rate: f64, observed_at: Timestamp) -> bool {
        if !rate.is_finite() || rate <= 0.0 {
            return false;
        }

        let now = self.clock.now();
        let mut slot = self.slot.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(current) = slot.as_ref() {
            if observed_at < current.observed_at {
                return false;
            }
        }

        *slot = Some(CacheEntry::new(rate, TtlClass::Stats, observed_at, now));
        FX_RATE.set(rate);
        true
    }

    /// The rate, if written within `max_age`.
    pub fn get(&self, max_age: Duration) -> Option<f64> {
        let now = self.clock.now();
        let slot = self.slot.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.as_ref()
            .filter(|entry| entry.is_within(now, max_age))
            .map(|entry| entry.value)
    }

    pub fn quote(&self) -> Option<FxQuote> {
        let slot = self.slot.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.as_ref().map(|entry| FxQuote {
            rate: entry.value,
            observed_at: entry.observed_at,
            written_at: entry.written_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ManualClock;

    #[test]
    fn test_empty_until_first_rate() {
        let clock = Arc::new(ManualClock::new(Timestamp::from_millis(0)));
        let fx = FxCache::new(clock);
        assert_eq!(fx.get(Duration::from_secs(60)), None);
        assert!(fx.quote().is_none());
    }

    #[test]
    fn test_rejects_invalid_and_older_rates() {
        let clock = Arc::new(ManualClock::new(Timestamp::from_millis(10_000)));
        let fx = FxCache::new(clock);
        assert!(fx.set(1_400.0, Timestamp::from_millis(5_000)));
        assert!(!fx.set(0.0, Timestamp::from_millis(6_000)));
        assert!(!fx.set(f64::NAN, Timestamp::from_millis(6_000)));
        assert!(!fx.set(1_300.0, Timestamp::from_millis(4_000)));
        assert_eq!(fx.get(Duration::from_secs(60)), Some(1_400.0));
    }

    #[test]
    fn test_rate_expires_after_max_age() {
        let clock = Arc::new(ManualClock::new(Timestamp::from_millis(0)));
        let fx = FxCache::with_rate(clock.clone(), 1_380.0);
        clock.advance(Duration::from_secs(3_600));
        assert_eq!(fx.get(Duration::from_secs(3_600)), Some(1_380.0));
        clock.advance(Duration::from_millis(1));
        assert_eq!(fx.get(Duration::from_secs(3_600)), None);
    }

    #[test]
    fn test_seeded_rate_yields_to_any_live_observation() {
        let clock = Arc::new(ManualClock::new(Timestamp::from_millis(1_700_000_000_000)));
        let fx = FxCache::with_rate(clock, 1_400.0);
        assert!(fx.set(1_385.5, Timestamp::from_millis(1_699_999_970_000)));
        assert_eq!(fx.get(Duration::from_secs(60)), Some(1_385.5));
    }
}
