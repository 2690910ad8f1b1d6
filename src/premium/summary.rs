use std::str::FromStr;
use serde::Serialize;
use crate::config::ViewsConfig;
use crate::error::{Error, Result};
use crate::premium::calculator::{PremiumCalculator, PremiumRow, PremiumSnapshot};
use crate::premium::{average_premium, is_outlier, round2};
use crate::types::{ExchangeId, MarketSelector, Quote};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SymbolValue {
    pub symbol: String,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangePremiumSummary {
    pub exchange: ExchangeId,
    pub market: MarketSelector,
    pub average_premium: Option<f64>,
    pub max_premium: Option<SymbolValue>,
    pub min_premium: Option<SymbolValue>,
    pub coin_count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mover {
    pub symbol: String,
    pub change_24h: f64,
    pub premium: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSummary {
    pub domestic_exchange: MarketSelector,
    pub foreign_exchange: MarketSelector,
    pub average_premium: Option<f64>,
    pub max_premium: Option<SymbolValue>,
    pub min_premium: Option<SymbolValue>,
    pub domestic_volume_krw: f64,
    pub fx_rate: Option<f64>,
    pub top_gainers: Vec<Mover>,
    pub top_losers: Vec<Mover>,
    pub updated_at: Option<String>,
}

/// Ordering of the trending view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendingSort {
    /// Domestic 24h traded value, largest first.
    #[default]
    Volume,
    /// Positive 24h change, largest first.
    Gainers,
    /// Negative 24h change, largest drop first.
    Losers,
}

impl FromStr for TrendingSort {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "volume" => Ok(TrendingSort::Volume),
            "gainers" => Ok(TrendingSort::Gainers),
            "losers" => Ok(TrendingSort::Losers),
            other => Err(Error::InvalidQuery(format!("sort must be volume, gainers or losers, got {:?}", other))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingCoin {
    pub rank: usize,
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub korean_name: Option<String>,
    pub korean_price: f64,
    pub global_price: Option<f64>,
    pub premium: Option<f64>,
    pub change_24h: Option<f64>,
    pub volume_24h_krw: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingView {
    pub sort: TrendingSort,
    pub domestic_exchange: MarketSelector,
    pub coins: Vec<TrendingCoin>,
    pub total: usize,
    pub fx_rate: Option<f64>,
    pub updated_at: Option<String>,
}

/// Upper bound on `limit` for the trending view.
pub const TRENDING_MAX_LIMIT: usize = 200;

/// Rows with a premium inside the outlier limit, as `(symbol, premium)`.
fn eligible(snapshot: &PremiumSnapshot) -> Vec<(&str, f64)> {
    snapshot
        .rows
        .iter()
        .filter_map(|row| row.premium.map(|p| (row.symbol.as_str(), p)))
        .filter(|(_, p)| !is_outlier(*p))
        .collect()
}

fn extreme(premiums: &[(&str, f64)], pick_max: bool) -> Option<SymbolValue> {
    premiums
        .iter()
        .copied()
        .reduce(|best, candidate| {
            let better = if pick_max { candidate.1 > best.1 } else { candidate.1 < best.1 };
            if better { candidate } else { best }
        })
        .map(|(symbol, value)| SymbolValue {
            symbol: symbol.to_string(),
            value: round2(value),
        })
}

impl PremiumCalculator {
    /// One entry per domestic exchange's KRW market against the reference foreign market.
    pub fn exchange_summaries(&self, views: &ViewsConfig) -> Vec<ExchangePremiumSummary> {
        ExchangeId::DOMESTIC
            .iter()
            .map(|exchange| {
                let market = MarketSelector::new(*exchange, Quote::Krw);
                let snapshot = self.snapshot(market, views.reference_foreign);
                let premiums = eligible(&snapshot);

                ExchangePremiumSummary {
                    exchange: *exchange,
                    market,
                    average_premium: average_premium(premiums.iter().map(|(_, p)| *p)).map(round2),
                    max_premium: extreme(&premiums, true),
                    min_premium: extreme(&premiums, false),
                    coin_count: premiums.len(),
                }
            })
            .collect()
    }

    pub fn market_summary(&self, views: &ViewsConfig) -> MarketSummary {
        let snapshot = self.snapshot(views.default_domestic, views.reference_foreign);
        let premiums = eligible(&snapshot);

        let domestic_volume_krw = snapshot.rows.iter().filter_map(|r| r.volume_24h_krw).sum::<f64>();

        let mut movers: Vec<Mover> = snapshot
            .rows
            .iter()
            .filter_map(|row| {
                row.change_24h.map(|change| Mover {
                    symbol: row.symbol.clone(),
                    change_24h: change,
                    premium: row.premium.map(round2),
                })
            })
            .collect();
        movers.sort_by(|a, b| b.change_24h.total_cmp(&a.change_24h).then_with(|| a.symbol.cmp(&b.symbol)));

        let top_gainers = movers.iter().take(views.movers_count).cloned().collect();
        let top_losers = movers.iter().rev().take(views.movers_count).cloned().collect();

        MarketSummary {
            domestic_exchange: snapshot.domestic_exchange,
            foreign_exchange: snapshot.foreign_exchange,
            average_premium: snapshot.average_premium.map(round2),
            max_premium: extreme(&premiums, true),
            min_premium: extreme(&premiums, false),
            domestic_volume_krw: domestic_volume_krw.round(),
            fx_rate: snapshot.fx_rate,
            top_gainers,
            top_losers,
            updated_at: snapshot.updated_at,
        }
    }

    /// Symbols listed on the default domestic market, ranked by `sort`.
    /// Rows without the sort key are left out.
    pub fn trending(&self, views: &ViewsConfig, sort: TrendingSort, limit: usize) -> TrendingView {
        let snapshot = self.snapshot(views.default_domestic, views.reference_foreign);

        let mut rows: Vec<_> = snapshot
            .rows
            .into_iter()
            .filter(|row| row.korean_price.is_some())
            .filter(|row| match sort {
                TrendingSort::Volume => row.volume_24h_krw.is_some(),
                TrendingSort::Gainers => row.change_24h.is_some_and(|c| c > 0.0),
                TrendingSort::Losers => row.change_24h.is_some_and(|c| c < 0.0),
            })
            .collect();

        let key = |row: &PremiumRow| match sort {
            TrendingSort::Volume => row.volume_24h_krw.unwrap_or_default(),
            TrendingSort::Gainers => row.change_24h.unwrap_or_default(),
            TrendingSort::Losers => -row.change_24h.unwrap_or_default(),
        };
        rows.sort_by(|a, b| key(b).total_cmp(&key(a)).then_with(|| a.symbol.cmp(&b.symbol)));

        let coins: Vec<TrendingCoin> = rows
            .into_iter()
            .take(limit.clamp(1, TRENDING_MAX_LIMIT))
            .enumerate()
            .map(|(index, row)| TrendingCoin {
                rank: index + 1,
                korean_price: row.korean_price.unwrap_or_default(),
                global_price: row.global_price,
                premium: row.premium.map(round2),
                change_24h: row.change_24h,
                volume_24h_krw: row.volume_24h_krw.map(f64::round),
                korean_name: row.korean_name,
                symbol: row.symbol,
            })
            .collect();

        TrendingView {
            sort,
            domestic_exchange: snapshot.domestic_exchange,
            total: coins.len(),
            coins,
            fx_rate: snapshot.fx_rate,
            updated_at: snapshot.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ViewsConfig;
    use crate::premium::calculator::testing::Fixture;
    use crate::reference::ReferenceDirectory;
    use crate::types::{Clock, ExchangeId, Quote, Ticker};
    use super::TrendingSort;

    fn seed(fixture: &Fixture, exchange: ExchangeId, symbol: &str, krw: f64, change: f64, volume: f64) {
        let ticker = Ticker::new(exchange, symbol, Quote::Krw, krw, fixture.clock.now())
            .unwrap()
            .with_change_rate(Some(change))
            .with_volume(Some(volume));
        fixture.put(ticker);
    }

    #[test]
    fn test_exchange_summaries_exclude_outliers() {
        let fixture = Fixture::new(Some(1_000.0));
        for symbol in ["AAA", "BBB", "CCC"] {
            fixture.price(ExchangeId::Binance, symbol, Quote::Usdt, 1.0);
        }
        seed(&fixture, ExchangeId::Upbit, "AAA", 1_010.0, 0.0, 0.0);
        seed(&fixture, ExchangeId::Upbit, "BBB", 1_030.0, 0.0, 0.0);
        seed(&fixture, ExchangeId::Upbit, "CCC", 3_000.0, 0.0, 0.0);
        seed(&fixture, ExchangeId::Bithumb, "AAA", 990.0, 0.0, 0.0);

        let summaries = fixture
            .calculator(ReferenceDirectory::empty())
            .exchange_summaries(&ViewsConfig::default());
        assert_eq!(summaries.len(), 3);

        let upbit = &summaries[0];
        assert_eq!(upbit.exchange, ExchangeId::Upbit);
        assert_eq!(upbit.coin_count, 2);
        assert_eq!(upbit.average_premium, Some(2.0));
        assert_eq!(upbit.max_premium.as_ref().unwrap().symbol, "BBB");
        assert_eq!(upbit.min_premium.as_ref().unwrap().symbol, "AAA");

        let bithumb = &summaries[1];
        assert_eq!(bithumb.coin_count, 1);
        assert_eq!(bithumb.average_premium, Some(-1.0));

        let coinone = &summaries[2];
        assert_eq!(coinone.coin_count, 0);
        assert_eq!(coinone.average_premium, None);
        assert!(coinone.max_premium.is_none());
    }

    #[test]
    fn test_market_summary_movers_and_volume() {
        let fixture = Fixture::new(Some(1_000.0));
        let changes = [("AAA", 5.0), ("BBB", -3.0), ("CCC", 1.0), ("DDD", 12.0), ("EEE", -8.0)];
        for (symbol, change) in changes {
            seed(&fixture, ExchangeId::Upbit, symbol, 1_000.0, change, 1_000_000.0);
            fixture.price(ExchangeId::Binance, symbol, Quote::Usdt, 1.0);
        }

        let summary = fixture
            .calculator(ReferenceDirectory::empty())
            .market_summary(&ViewsConfig::default());

        let gainers: Vec<_> = summary.top_gainers.iter().map(|m| m.symbol.as_str()).collect();
        let losers: Vec<_> = summary.top_losers.iter().map(|m| m.symbol.as_str()).collect();
        assert_eq!(gainers, vec!["DDD", "AAA", "CCC"]);
        assert_eq!(losers, vec!["EEE", "BBB", "CCC"]);
        assert_eq!(summary.domestic_volume_krw, 5_000_000.0);
        assert_eq!(summary.fx_rate, Some(1_000.0));
        assert_eq!(summary.average_premium, Some(0.0));
    }

    #[test]
    fn test_trending_sorts_and_limits() {
        let fixture = Fixture::new(Some(1_000.0));
        let rows = [("AAA", 5.0, 300.0), ("BBB", -3.0, 900.0), ("CCC", 1.0, 100.0), ("DDD", -8.0, 500.0)];
        for (symbol, change, volume) in rows {
            seed(&fixture, ExchangeId::Upbit, symbol, 1_000.0, change, volume);
        }
        fixture.price(ExchangeId::Binance, "ZZZ", Quote::Usdt, 1.0);

        let calculator = fixture.calculator(ReferenceDirectory::empty());
        let views = ViewsConfig::default();
        let symbols = |sort, limit| -> Vec<String> {
            calculator
                .trending(&views, sort, limit)
                .coins
                .into_iter()
                .map(|c| c.symbol)
                .collect()
        };

        assert_eq!(symbols(TrendingSort::Volume, 50), vec!["BBB", "DDD", "AAA", "CCC"]);
        assert_eq!(symbols(TrendingSort::Volume, 2), vec!["BBB", "DDD"]);
        assert_eq!(symbols(TrendingSort::Gainers, 50), vec!["AAA", "CCC"]);
        assert_eq!(symbols(TrendingSort::Losers, 50), vec!["DDD", "BBB"]);

        let view = calculator.trending(&views, TrendingSort::Losers, 0);
        assert_eq!(view.total, 1);
        assert_eq!(view.coins[0].rank, 1);
        assert_eq!(view.coins[0].symbol, "DDD");
    }

    #[test]
    fn test_trending_sort_parsing() {
        assert_eq!("Gainers".parse::<TrendingSort>().unwrap(), TrendingSort::Gainers);
        assert!("marketcap".parse::<TrendingSort>().is_err());
    }
}
