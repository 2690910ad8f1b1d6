use serde::Deserialize;
use serde_json::Value;
use crate::price_infra::normalizer::{observed_at, Fields, Lenient, Normalized};
use crate::types::{ExchangeId, Quote, Timestamp};
use crate::utils::parsing::{opt_f64, opt_string, opt_u64};

/// `/api/v3/ticker/price` (spot, MEXC) and `/fapi/v1/ticker/price` (futures, adds `time`).
#[derive(Clone, Debug, Deserialize)]
pub struct BinancePrice {
    symbol: Option<Value>,
    price: Option<Value>,
    time: Option<Value>,
}

/// `/api/v3/ticker/24hr`
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceStats {
    symbol: Option<Value>,
    last_price: Option<Value>,
    quote_volume: Option<Value>,
    /// Already percent.
    price_change_percent: Option<Value>,
    high_price: Option<Value>,
    low_price: Option<Value>,
    close_time: Option<Value>,
}

pub(crate) fn normalize_prices(
    exchange: ExchangeId,
    records: &[Lenient<BinancePrice>],
    fallback: Timestamp,
    out: &mut Normalized,
) {
    for record in records {
        let Lenient::Record(ticker) = record else {
            out.drop_record();
            continue;
        };
        let Some(symbol) = opt_string(&ticker.symbol) else {
            out.drop_record();
            continue;
        };

        let fields = Fields {
            price: opt_f64(&ticker.price),
            ..Fields::default()
        };

        out.push(
            exchange,
            Quote::split_concatenated(&symbol),
            fields,
            observed_at(opt_u64(&ticker.time), fallback),
        );
    }
}

pub(crate) fn normalize_stats(
    exchange: ExchangeId,
    records: &[Lenient<BinanceStats>],
    fallback: Timestamp,
    out: &mut Normalized,
) {
    for record in records {
        let Lenient::Record(ticker) = record else {
            out.drop_record();
            continue;
        };
        let Some(symbol) = opt_string(&ticker.symbol) else {
            out.drop_record();
            continue;
        };

        let fields = Fields {
            price: opt_f64(&ticker.last_price),
            volume_24h: opt_f64(&ticker.quote_volume),
            change_rate_24h: opt_f64(&ticker.price_change_percent),
            high_24h: opt_f64(&ticker.high_price),
            low_24h: opt_f64(&ticker.low_price),
        };

        out.push(
            exchange,
            Quote::split_concatenated(&symbol),
            fields,
            observed_at(opt_u64(&ticker.close_time), fallback),
        );
    }
}
