use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use serde::Serialize;
use crate::cache::{FxCache, PriceCache, TtlClass, TtlPolicy};
use crate::premium::{average_premium, premium_pct};
use crate::reference::ReferenceDirectory;
use crate::types::{ExchangeId, MarketSelector, Quote, Ticker, Timestamp};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumRow {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub korean_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub english_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    /// Domestic price in KRW. `None` when the domestic market does not list the symbol.
    pub korean_price: Option<f64>,
    /// Foreign price in the foreign market's own quote.
    pub global_price: Option<f64>,
    pub global_price_krw: Option<f64>,
    pub premium: Option<f64>,
    pub volume_24h_krw: Option<f64>,
    pub change_24h: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumSnapshot {
    pub domestic_exchange: MarketSelector,
    pub foreign_exchange: MarketSelector,
    pub rows: Vec<PremiumRow>,
    pub fx_rate: Option<f64>,
    pub average_premium: Option<f64>,
    /// Newest observation among the tickers behind this snapshot.
    pub updated_at: Option<String>,
    pub total_coins: usize,
    pub listed_coins: usize,
}

/// Read-side view over the caches for one computation.
///
/// Foreign prices fall back from the price feed to the same exchange's stats
/// feed; nothing ever falls back across exchanges. Every ticker read moves
/// `newest` forward so the result can be stamped with data time.
pub(crate) struct PriceReader<'a> {
    calculator: &'a PremiumCalculator,
    fx_rate: Option<f64>,
    newest: Option<Timestamp>,
}

impl<'a> PriceReader<'a> {
    pub(crate) fn fx_rate(&self) -> Option<f64> {
        self.fx_rate
    }

    pub(crate) fn updated_at(&self) -> Option<String> {
        self.newest.map(|ts| ts.to_rfc3339())
    }

    pub(crate) fn ticker(&mut self, exchange: ExchangeId, base: &str, quote: Quote) -> Option<Ticker> {
        let calc = self.calculator;
        let ticker = calc
            .prices
            .lookup(exchange, base, quote, calc.policy.max_serve_age(TtlClass::Price))
            .or_else(|| calc.stats.lookup(exchange, base, quote, calc.policy.max_serve_age(TtlClass::Stats)))?;

        if self.newest.is_none_or(|newest| ticker.observed_at > newest) {
            self.newest = Some(ticker.observed_at);
        }
        Some(ticker)
    }

    /// Multiplier taking a price quoted in `quote` on `exchange` to KRW.
    pub(crate) fn krw_factor(&mut self, exchange: ExchangeId, quote: Quote) -> Option<f64> {
        match quote {
            Quote::Krw => Some(1.0),
            Quote::Usdt => self.fx_rate,
            Quote::Btc => {
                if let Some(btc) = self.ticker(exchange, "BTC", Quote::Krw) {
                    return Some(btc.price);
                }
                let fx_rate = self.fx_rate?;
                self.ticker(exchange, "BTC", Quote::Usdt).map(|btc| btc.price * fx_rate)
            }
        }
    }

    /// Price of `base` on `market`, in KRW.
    pub(crate) fn price_krw(&mut self, market: MarketSelector, base: &str) -> Option<f64> {
        let ticker = self.ticker(market.exchange, base, market.quote)?;
        let factor = self.krw_factor(market.exchange, market.quote)?;
        Some(ticker.price * factor)
    }
}

/// Derives premium views from the shared caches. Holds no state of its own.
pub struct PremiumCalculator {
    prices: Arc<PriceCache>,
    stats: Arc<PriceCache>,
    fx: Arc<FxCache>,
    reference: Arc<ReferenceDirectory>,
    policy: TtlPolicy,
    fx_max_age: Duration,
}

impl PremiumCalculator {
    pub fn new(
        prices: Arc<PriceCache>,
        stats: Arc<PriceCache>,
        fx: Arc<FxCache>,
        reference: Arc<ReferenceDirectory>,
        policy: TtlPolicy,
        fx_max_age: Duration,
    ) -> Self {
        PremiumCalculator {
            prices,
            stats,
            fx,
            reference,
            policy,
            fx_max_age,
        }
    }

    pub fn fx_rate(&self) -> Option<f64> {
        self.fx.get(self.fx_max_age)
    }

    pub fn reference(&self) -> &ReferenceDirectory {
        &self.reference
    }

    pub(crate) fn reader(&self) -> PriceReader<'_> {
        PriceReader {
            calculator: self,
            fx_rate: self.fx_rate(),
            newest: None,
        }
    }

    /// Fresh stats tickers for one market, sorted by symbol.
    pub fn stats_market(&self, exchange: ExchangeId, quote: Quote) -> Vec<Ticker> {
        self.stats
            .market(exchange, quote, self.policy.max_serve_age(TtlClass::Stats))
    }

    /// A row with reference names and no prices, for symbols no market lists.
    pub(crate) fn empty_row(&self, symbol: &str) -> PremiumRow {
        let info = self.reference.get(symbol);
        PremiumRow {
            symbol: symbol.to_string(),
            korean_name: info.and_then(|i| i.name_ko.clone()),
            english_name: info.and_then(|i| i.name_en.clone()),
            icon_url: info.and_then(|i| i.icon_url.clone()),
            korean_price: None,
            global_price: None,
            global_price_krw: None,
            premium: None,
            volume_24h_krw: None,
            change_24h: None,
        }
    }

    fn symbols(&self, market: MarketSelector) -> BTreeSet<String> {
        let mut symbols = self.prices.symbols(market.exchange, market.quote);
        symbols.extend(self.stats.symbols(market.exchange, market.quote));
        symbols
    }

    pub fn snapshot(&self, domestic: MarketSelector, foreign: MarketSelector) -> PremiumSnapshot {
        let mut reader = self.reader();
        let domestic_factor = reader.krw_factor(domestic.exchange, domestic.quote);
        let foreign_factor = reader.krw_factor(foreign.exchange, foreign.quote);

        let mut symbols = self.symbols(domestic);
        symbols.extend(self.symbols(foreign));

        let mut rows = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let domestic_ticker = reader.ticker(domestic.exchange, &symbol, domestic.quote);
            let foreign_ticker = reader.ticker(foreign.exchange, &symbol, foreign.quote);
            if domestic_ticker.is_none() && foreign_ticker.is_none() {
                continue;
            }

            let korean_price = domestic_ticker
                .as_ref()
                .zip(domestic_factor)
                .map(|(t, factor)| t.price * factor);
            let global_price = foreign_ticker.as_ref().map(|t| t.price);
            let global_price_krw = global_price.zip(foreign_factor).map(|(p, factor)| p * factor);
            let premium = korean_price
                .zip(global_price_krw)
                .and_then(|(korean, global)| premium_pct(korean, global));
            let volume_24h_krw = domestic_ticker
                .as_ref()
                .and_then(|t| t.volume_24h)
                .zip(domestic_factor)
                .map(|(volume, factor)| volume * factor);
            let change_24h = domestic_ticker.as_ref().and_then(|t| t.change_rate_24h);

            rows.push(PremiumRow {
                korean_price,
                global_price,
                global_price_krw,
                premium,
                volume_24h_krw,
                change_24h,
                ..self.empty_row(&symbol)
            });
        }

        sort_rows(&mut rows);

        let average_premium = average_premium(rows.iter().filter_map(|r| r.premium));
        let listed_coins = rows.iter().filter(|r| r.global_price.is_some()).count();

        PremiumSnapshot {
            domestic_exchange: domestic,
            foreign_exchange: foreign,
            total_coins: rows.len(),
            listed_coins,
            rows,
            fx_rate: reader.fx_rate(),
            average_premium,
            updated_at: reader.updated_at(),
        }
    }
}

/// Premium descending, rows without a premium last, ties by symbol.
fn sort_rows(rows: &mut [PremiumRow]) {
    rows.sort_by(|a, b| match (a.premium, b.premium) {
        (Some(pa), Some(pb)) => pb.total_cmp(&pa).then_with(|| a.symbol.cmp(&b.symbol)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.symbol.cmp(&b.symbol),
    });
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::config::CacheConfig;
    use crate::types::{Clock, ManualClock};

    pub(crate) struct Fixture {
        pub clock: Arc<ManualClock>,
        pub prices: Arc<PriceCache>,
        pub stats: Arc<PriceCache>,
        pub fx: Arc<FxCache>,
    }

    impl Fixture {
        pub fn new(fx_rate: Option<f64>) -> Self {
            let clock = Arc::new(ManualClock::new(Timestamp::from_millis(1_700_000_000_000)));
            let fx = match fx_rate {
                Some(rate) => FxCache::with_rate(clock.clone(), rate),
                None => FxCache::new(clock.clone()),
            };
            Fixture {
                prices: Arc::new(PriceCache::new("prices", TtlClass::Price, clock.clone())),
                stats: Arc::new(PriceCache::new("stats", TtlClass::Stats, clock.clone())),
                fx: Arc::new(fx),
                clock,
            }
        }

        pub fn price(&self, exchange: ExchangeId, base: &str, quote: Quote, price: f64) -> Ticker {
            let ticker = Ticker::new(exchange, base, quote, price, self.clock.now())
                .expect("valid test ticker");
            self.prices.put(ticker.clone());
            ticker
        }

        pub fn put(&self, ticker: Ticker) {
            self.prices.put(ticker);
        }

        pub fn calculator(&self, reference: ReferenceDirectory) -> PremiumCalculator {
            PremiumCalculator::new(
                self.prices.clone(),
                self.stats.clone(),
                self.fx.clone(),
                Arc::new(reference),
                TtlPolicy::from_config(&CacheConfig::default()),
                Duration::from_secs(3_600),
            )
        }
    }
}
