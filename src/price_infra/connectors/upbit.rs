use serde::Deserialize;
use serde_json::Value;
use crate::price_infra::normalizer::{fraction_to_percent, observed_at, Fields, Lenient, Normalized};
use crate::types::{ExchangeId, Quote, Timestamp};
use crate::utils::parsing::{opt_f64, opt_string, opt_u64};

/// Element of `/v1/ticker/all`. `market` is quote-first, e.g. `KRW-BTC`.
#[derive(Clone, Debug, Deserialize)]
pub struct UpbitTicker {
    market: Option<Value>,
    trade_price: Option<Value>,
    acc_trade_price_24h: Option<Value>,
    /// Fraction, not percent.
    signed_change_rate: Option<Value>,
    high_price: Option<Value>,
    low_price: Option<Value>,
    timestamp: Option<Value>,
}

pub(crate) fn normalize(
    exchange: ExchangeId,
    records: &[Lenient<UpbitTicker>],
    fallback: Timestamp,
    out: &mut Normalized,
) {
    for record in records {
        let Lenient::Record(ticker) = record else {
            out.drop_record();
            continue;
        };
        let Some(market) = opt_string(&ticker.market) else {
            out.drop_record();
            continue;
        };

        let fields = Fields {
            price: opt_f64(&ticker.trade_price),
            volume_24h: opt_f64(&ticker.acc_trade_price_24h),
            change_rate_24h: fraction_to_percent(opt_f64(&ticker.signed_change_rate)),
            high_24h: opt_f64(&ticker.high_price),
            low_24h: opt_f64(&ticker.low_price),
        };

        out.push(
            exchange,
            Quote::split_delimited(&market, '-', true),
            fields,
            observed_at(opt_u64(&ticker.timestamp), fallback),
        );
    }
}
