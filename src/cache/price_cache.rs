use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use crate::cache::entry::{CacheEntry, TtlClass};
use crate::observability::metrics::{CACHE_ENTRIES, CACHE_STALE_WRITES, CACHE_SWEPT};
use crate::types::{Clock, ExchangeId, Quote, Ticker, TickerKey, Timestamp};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    Replaced,
    /// An observation at least as new was already cached; nothing changed.
    Stale,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PutSummary {
    pub inserted: usize,
    pub replaced: usize,
    pub stale: usize,
}

impl PutSummary {
    pub fn accepted(&self) -> usize {
        self.inserted + self.replaced
    }
}

/// Latest normalized ticker per `(exchange, base, quote)`.
///
/// Shards are locked per key, so pollers writing different exchanges and
/// calculators reading never contend on a single lock. An entry is replaced
/// wholesale on each accepted write; readers always get a cloned, complete
/// ticker.
pub struct PriceCache {
    name: &'static str,
    ttl_class: TtlClass,
    entries: DashMap<TickerKey, CacheEntry<Ticker>>,
    clock: Arc<dyn Clock>,
}

impl PriceCache {
    pub fn new(name: &'static str, ttl_class: TtlClass, clock: Arc<dyn Clock>) -> Self {
        PriceCache {
            name,
            ttl_class,
            entries: DashMap::new(),
            clock,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ttl_class(&self) -> TtlClass {
        self.ttl_class
    }

    /// Stores `ticker` unless the cached entry was observed later.
    /// Equal observation times overwrite, so a venue that repeats its
    /// timestamp still refreshes the write time.
    pub fn put(&self, ticker: Ticker) -> PutOutcome {
        let now = self.clock.now();
        let observed_at = ticker.observed_at;

        let outcome = match self.entries.entry(ticker.key()) {
            Entry::Occupied(mut occupied) => {
                if observed_at < occupied.get().observed_at {
                    CACHE_STALE_WRITES.inc();
                    return PutOutcome::Stale;
                }
                occupied.insert(CacheEntry::new(ticker, self.ttl_class, observed_at, now));
                PutOutcome::Replaced
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry::new(ticker, self.ttl_class, observed_at, now));
                PutOutcome::Inserted
            }
        };

        if outcome == PutOutcome::Inserted {
            CACHE_ENTRIES.with_label_values(&[self.name]).inc();
        }
        outcome
    }

    pub fn put_batch(&self, tickers: impl IntoIterator<Item = Ticker>) -> PutSummary {
        let mut summary = PutSummary::default();
        for ticker in tickers {
            match self.put(ticker) {
                PutOutcome::Inserted => summary.inserted += 1,
                PutOutcome::Replaced => summary.replaced += 1,
                PutOutcome::Stale => summary.stale += 1,
            }
        }
        summary
    }

    /// Returns the ticker only if it was written within `max_age`.
    pub fn get(&self, key: &TickerKey, max_age: Duration) -> Option<Ticker> {
        let now = self.clock.now();
        self.entries
            .get(key)
            .filter(|entry| entry.is_within(now, max_age))
            .map(|entry| entry.value.clone())
    }

    pub fn lookup(&self, exchange: ExchangeId, base: &str, quote: Quote, max_age: Duration) -> Option<Ticker> {
        self.get(&TickerKey::new(exchange, base, quote), max_age)
    }

    /// Write time of the cached entry, regardless of age.
    pub fn written_at(&self, key: &TickerKey) -> Option<Timestamp> {
        self.entries.get(key).map(|entry| entry.written_at)
    }

    /// Base symbols cached for one market, sorted.
    pub fn symbols(&self, exchange: ExchangeId, quote: Quote) -> BTreeSet<String> {
        self.entries
            .iter()
            .filter(|entry| entry.key().exchange == exchange && entry.key().quote == quote)
            .map(|entry| entry.key().base.clone())
            .collect()
    }

    /// All tickers of one market written within `max_age`, sorted by base symbol.
    pub fn market(&self, exchange: ExchangeId, quote: Quote, max_age: Duration) -> Vec<Ticker> {
        let now = self.clock.now();
        let mut tickers: Vec<Ticker> = self
            .entries
            .iter()
            .filter(|entry| entry.key().exchange == exchange && entry.key().quote == quote)
            .filter(|entry| entry.is_within(now, max_age))
            .map(|entry| entry.value.clone())
            .collect();
        tickers.sort_by(|a, b| a.base_symbol.cmp(&b.base_symbol));
        tickers
    }

    /// Removes entries with no accepted write for longer than `dead_after`.
    pub fn sweep(&self, dead_after: Duration) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_within(now, dead_after));
        let removed = before.saturating_sub(self.entries.len());

        if removed > 0 {
            CACHE_SWEPT.inc_by(removed as u64);
            tracing::debug!(cache = self.name, removed, "Swept dead cache entries");
        }
        CACHE_ENTRIES.with_label_values(&[self.name]).set(self.entries.len() as i64);
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
