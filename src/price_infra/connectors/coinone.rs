use serde::Deserialize;
use serde_json::Value;
use crate::error::Result;
use crate::price_infra::normalizer::{change_from, observed_at, Fields, Lenient, Normalized};
use crate::price_infra::payload::expect_code;
use crate::types::{ExchangeId, Quote, Timestamp};
use crate::utils::parsing::{opt_f64, opt_string, opt_u64};

/// `/public/v2/ticker_new/KRW`
#[derive(Clone, Debug, Deserialize)]
pub struct CoinoneResponse {
    result: Option<Value>,
    #[serde(default)]
    tickers: Vec<Lenient<CoinoneTicker>>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CoinoneTicker {
    target_currency: Option<Value>,
    quote_currency: Option<Value>,
    last: Option<Value>,
    quote_volume: Option<Value>,
    yesterday_last: Option<Value>,
    high: Option<Value>,
    low: Option<Value>,
    timestamp: Option<Value>,
}

impl CoinoneResponse {
    pub(crate) fn check(&self, exchange: ExchangeId) -> Result<()> {
        expect_code(exchange, opt_string(&self.result), "success")
    }
}

pub(crate) fn normalize(
    exchange: ExchangeId,
    response: &CoinoneResponse,
    fallback: Timestamp,
    out: &mut Normalized,
) {
    for record in &response.tickers {
        let Lenient::Record(ticker) = record else {
            out.drop_record();
            continue;
        };
        let Some(base) = opt_string(&ticker.target_currency) else {
            out.drop_record();
            continue;
        };
        let quote = match opt_string(&ticker.quote_currency) {
            Some(code) => code.parse::<Quote>().ok(),
            None => Some(Quote::Krw),
        };

        let last = opt_f64(&ticker.last);
        let fields = Fields {
            price: last,
            volume_24h: opt_f64(&ticker.quote_volume),
            change_rate_24h: change_from(last, opt_f64(&ticker.yesterday_last)),
            high_24h: opt_f64(&ticker.high),
            low_24h: opt_f64(&ticker.low),
        };

        out.push(
            exchange,
            quote.map(|quote| (base.to_ascii_uppercase(), quote)),
            fields,
            observed_at(opt_u64(&ticker.timestamp), fallback),
        );
    }
}
