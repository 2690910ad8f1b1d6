use serde::Deserialize;
use serde_json::Value;
use crate::price_infra::connectors::{binance, bithumb, coinone, global, upbit};
use crate::price_infra::payload::RawPayload;
use crate::types::{ExchangeId, Quote, Ticker, Timestamp};

/// Result of normalizing one payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Normalized {
    pub tickers: Vec<Ticker>,
    /// Records that were malformed: no symbol, or no usable positive price.
    pub dropped: usize,
    /// Well-formed records for markets this engine does not track.
    pub skipped: usize,
}

/// Optional numeric fields of a record, already parsed.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Fields {
    pub price: Option<f64>,
    pub volume_24h: Option<f64>,
    pub change_rate_24h: Option<f64>,
    pub high_24h: Option<f64>,
    pub low_24h: Option<f64>,
}

impl Normalized {
    pub(crate) fn drop_record(&mut self) {
        self.dropped += 1;
    }

    pub(crate) fn skip_record(&mut self) {
        self.skipped += 1;
    }

    /// Pushes a ticker for a split `(base, quote)`; `None` means an untracked quote.
    pub(crate) fn push(
        &mut self,
        exchange: ExchangeId,
        pair: Option<(String, Quote)>,
        fields: Fields,
        observed_at: Timestamp,
    ) {
        let Some((base, quote)) = pair else {
            self.skip_record();
            return;
        };

        let Some(price) = fields.price else {
            self.drop_record();
            return;
        };

        match Ticker::new(exchange, &base, quote, price, observed_at) {
            Some(ticker) => self.tickers.push(
                ticker
                    .with_volume(fields.volume_24h)
                    .with_change_rate(fields.change_rate_24h)
                    .with_range(fields.high_24h, fields.low_24h),
            ),
            None => self.drop_record(),
        }
    }
}

/// One array element that may or may not match the expected record shape.
/// A malformed element drops that record instead of failing the batch.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum Lenient<T> {
    Record(T),
    Malformed(Value),
}

/// Converts one exchange payload into canonical tickers.
///
/// Pure: `fallback_observed_at` (the poll's request time) is used for any
/// record whose payload carries no exchange timestamp.
pub fn normalize(exchange: ExchangeId, payload: &RawPayload, fallback_observed_at: Timestamp) -> Normalized {
    let mut out = Normalized::default();

    match payload {
        RawPayload::Upbit(records) => upbit::normalize(exchange, records, fallback_observed_at, &mut out),
        RawPayload::Bithumb(response) => bithumb::normalize(exchange, response, fallback_observed_at, &mut out),
        RawPayload::Coinone(response) => coinone::normalize(exchange, response, fallback_observed_at, &mut out),
        RawPayload::BinancePrices(records) => binance::normalize_prices(exchange, records, fallback_observed_at, &mut out),
        RawPayload::BinanceStats(records) => binance::normalize_stats(exchange, records, fallback_observed_at, &mut out),
        RawPayload::Okx(response) => global::normalize_okx(exchange, response, fallback_observed_at, &mut out),
        RawPayload::Bybit(response) => global::normalize_bybit(exchange, response, fallback_observed_at, &mut out),
        RawPayload::Bitget(response) => global::normalize_bitget(exchange, response, fallback_observed_at, &mut out),
        RawPayload::Gate(records) => global::normalize_gate(exchange, records, fallback_observed_at, &mut out),
        RawPayload::Htx(response) => global::normalize_htx(exchange, response, fallback_observed_at, &mut out),
    }

    out
}

pub(crate) fn fraction_to_percent(fraction: Option<f64>) -> Option<f64> {
    fraction.map(|f| f * 100.0)
}

/// Percent change of `last` against a reference such as the 24h open.
pub(crate) fn change_from(last: Option<f64>, reference: Option<f64>) -> Option<f64> {
    match (last, reference) {
        (Some(last), Some(reference)) if reference > 0.0 => Some((last - reference) / reference * 100.0),
        _ => None,
    }
}

pub(crate) fn observed_at(exchange_millis: Option<u64>, fallback: Timestamp) -> Timestamp {
    exchange_millis
        .filter(|millis| *millis > 0)
        .map(Timestamp::from_millis)
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedKind;
    use proptest::prelude::*;
    use serde_json::json;

    const FALLBACK: Timestamp = Timestamp::from_millis(1_700_000_000_000);

    fn run(exchange: ExchangeId, kind: FeedKind, body: Value) -> Normalized {
        let payload = RawPayload::parse(exchange, kind, body.to_string().as_bytes()).unwrap();
        normalize(exchange, &payload, FALLBACK)
    }

    #[test]
    fn test_upbit_market_codes_and_percent_change() {
        let out = run(ExchangeId::Upbit, FeedKind::Prices, json!([
            {"market": "KRW-BTC", "trade_price": 101000000.0, "acc_trade_price_24h": 1.5e11,
             "signed_change_rate": 0.0123, "high_price": 102000000.0, "low_price": 99000000.0,
             "timestamp": 1700000000123u64},
            {"market": "BTC-ETH", "trade_price": "0.052"},
            {"market": "KRW-XRP", "trade_price": 0},
            {"market": "USD-BTC", "trade_price": 1.0},
        ]));

        assert_eq!(out.tickers.len(), 2);
        assert_eq!(out.dropped, 1);
        assert_eq!(out.skipped, 1);

        let btc = &out.tickers[0];
        assert_eq!((btc.base_symbol.as_str(), btc.quote), ("BTC", Quote::Krw));
        assert!((btc.change_rate_24h.unwrap() - 1.23).abs() < 1e-9);
        assert_eq!(btc.observed_at, Timestamp::from_millis(1_700_000_000_123));

        let eth = &out.tickers[1];
        assert_eq!((eth.base_symbol.as_str(), eth.quote), ("ETH", Quote::Btc));
        assert_eq!(eth.volume_24h, None);
        assert_eq!(eth.observed_at, FALLBACK);
    }

    #[test]
    fn test_bithumb_object_keyed_by_coin() {
        let out = run(ExchangeId::Bithumb, FeedKind::Prices, json!({
            "status": "0000",
            "data": {
                "BTC": {"closing_price": "100900000", "acc_trade_value_24H": "123456789.5",
                        "fluctate_rate_24H": "-0.51", "max_price": "101000000", "min_price": "99000000"},
                "DOGE": {"closing_price": "not-a-number"},
                "date": "1700000000999"
            }
        }));

        assert_eq!(out.tickers.len(), 1);
        assert_eq!(out.dropped, 1);
        let btc = &out.tickers[0];
        assert_eq!(btc.price, 100_900_000.0);
        assert_eq!(btc.change_rate_24h, Some(-0.51));
        assert_eq!(btc.observed_at, Timestamp::from_millis(1_700_000_000_999));
    }

    #[test]
    fn test_coinone_change_from_yesterday() {
        let out = run(ExchangeId::Coinone, FeedKind::Prices, json!({
            "result": "success",
            "tickers": [
                {"target_currency": "btc", "quote_currency": "krw", "last": "110", "yesterday_last": "100",
                 "quote_volume": "5000", "high": "111", "low": "95", "timestamp": 1700000000500u64},
                {"target_currency": "eth", "quote_currency": "krw"}
            ]
        }));

        assert_eq!(out.tickers.len(), 1);
        assert_eq!(out.dropped, 1);
        assert!((out.tickers[0].change_rate_24h.unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(out.tickers[0].volume_24h, Some(5_000.0));
    }

    #[test]
    fn test_binance_concatenated_symbols() {
        let out = run(ExchangeId::Binance, FeedKind::Prices, json!([
            {"symbol": "BTCUSDT", "price": "72000.00"},
            {"symbol": "ETHBTC", "price": "0.05"},
            {"symbol": "BTCEUR", "price": "66000"},
            {"price": "1"},
        ]));

        assert_eq!(out.tickers.len(), 2);
        assert_eq!(out.skipped, 1);
        assert_eq!(out.dropped, 1);
        assert_eq!(out.tickers[0].observed_at, FALLBACK);
    }

    #[test]
    fn test_binance_stats_feed() {
        let out = run(ExchangeId::Binance, FeedKind::Stats, json!([
            {"symbol": "SOLUSDT", "lastPrice": "150", "quoteVolume": "1000000", "priceChangePercent": "-3.2",
             "highPrice": "160", "lowPrice": "140", "closeTime": 1700000000001u64}
        ]));

        let sol = &out.tickers[0];
        assert_eq!(sol.change_rate_24h, Some(-3.2));
        assert_eq!(sol.high_24h, Some(160.0));
        assert_eq!(sol.low_24h, Some(140.0));
        assert_eq!(sol.observed_at, Timestamp::from_millis(1_700_000_000_001));
    }

    #[test]
    fn test_okx_and_bybit_and_bitget() {
        let okx = run(ExchangeId::Okx, FeedKind::Prices, json!({
            "code": "0",
            "data": [{"instId": "BTC-USDT", "last": "72000", "open24h": "70000", "volCcy24h": "1000", "ts": "1700000000002"}]
        }));
        assert!((okx.tickers[0].change_rate_24h.unwrap() - 2.857142857).abs() < 1e-6);
        assert_eq!(okx.tickers[0].observed_at, Timestamp::from_millis(1_700_000_000_002));

        let bybit = run(ExchangeId::Bybit, FeedKind::Prices, json!({
            "retCode": 0,
            "result": {"list": [{"symbol": "ETHUSDT", "lastPrice": "3000", "price24hPcnt": "0.015", "turnover24h": "9"}]},
            "time": 1700000000003u64
        }));
        assert!((bybit.tickers[0].change_rate_24h.unwrap() - 1.5).abs() < 1e-9);
        assert_eq!(bybit.tickers[0].observed_at, Timestamp::from_millis(1_700_000_000_003));

        let bitget = run(ExchangeId::Bitget, FeedKind::Prices, json!({
            "code": "00000",
            "data": [{"symbol": "XRPUSDT", "lastPr": "0.6", "change24h": "-0.02", "quoteVolume": "77"}]
        }));
        assert!((bitget.tickers[0].change_rate_24h.unwrap() + 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_gate_and_htx() {
        let gate = run(ExchangeId::Gate, FeedKind::Prices, json!([
            {"currency_pair": "DOGE_USDT", "last": "0.08", "change_percentage": "4.1", "quote_volume": "12"},
            {"currency_pair": "DOGE_ETH", "last": "0.00003"}
        ]));
        assert_eq!(gate.tickers.len(), 1);
        assert_eq!(gate.skipped, 1);
        assert_eq!(gate.tickers[0].change_rate_24h, Some(4.1));

        let htx = run(ExchangeId::Htx, FeedKind::Prices, json!({
            "status": "ok",
            "ts": 1700000000004u64,
            "data": [{"symbol": "adausdt", "close": 0.5, "open": 0.4, "vol": 1000.0}]
        }));
        assert_eq!(htx.tickers[0].base_symbol, "ADA");
        assert!((htx.tickers[0].change_rate_24h.unwrap() - 25.0).abs() < 1e-9);
        assert_eq!(htx.tickers[0].observed_at, Timestamp::from_millis(1_700_000_000_004));
    }

    #[test]
    fn test_malformed_array_element_drops_only_that_record() {
        let out = run(ExchangeId::Mexc, FeedKind::Prices, json!([
            "garbage",
            {"symbol": "PEPEUSDT", "price": "0.0000012"}
        ]));
        assert_eq!(out.tickers.len(), 1);
        assert_eq!(out.dropped, 1);
    }

    proptest! {
        #[test]
        fn prop_never_emits_non_positive_price(prices in prop::collection::vec(
            prop_oneof![
                any::<f64>().prop_map(|p| json!(p.to_string())),
                any::<i64>().prop_map(|p| json!(p)),
                "[a-z0-9.-]{0,8}".prop_map(|s| json!(s)),
                Just(Value::Null),
            ],
            0..30,
        )) {
            let records: Vec<Value> = prices
                .into_iter()
                .map(|price| json!({"symbol": "BTCUSDT", "price": price}))
                .collect();
            let payload = RawPayload::parse(ExchangeId::Binance, FeedKind::Prices, Value::Array(records).to_string().as_bytes()).unwrap();
            let out = normalize(ExchangeId::Binance, &payload, FALLBACK);
            for ticker in &out.tickers {
                prop_assert!(ticker.price > 0.0 && ticker.price.is_finite());
            }
        }
    }
}
