use serde::Deserialize;
use serde_json::{Map, Value};
use crate::error::Result;
use crate::price_infra::normalizer::{observed_at, Fields, Normalized};
use crate::price_infra::payload::expect_code;
use crate::types::{ExchangeId, Quote, Timestamp};
use crate::utils::parsing::{opt_f64, opt_string, value_to_u64};

/// `/public/ticker/ALL_KRW`: `data` maps each coin to its ticker, plus a `date` entry.
#[derive(Clone, Debug, Deserialize)]
pub struct BithumbResponse {
    status: Option<Value>,
    #[serde(default)]
    data: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
struct BithumbTicker {
    closing_price: Option<Value>,
    #[serde(rename = "acc_trade_value_24H")]
    acc_trade_value_24h: Option<Value>,
    /// Already percent.
    #[serde(rename = "fluctate_rate_24H")]
    fluctate_rate_24h: Option<Value>,
    max_price: Option<Value>,
    min_price: Option<Value>,
}

impl BithumbResponse {
    pub(crate) fn check(&self, exchange: ExchangeId) -> Result<()> {
        expect_code(exchange, opt_string(&self.status), "0000")
    }
}

pub(crate) fn normalize(
    exchange: ExchangeId,
    response: &BithumbResponse,
    fallback: Timestamp,
    out: &mut Normalized,
) {
    let stamp = observed_at(response.data.get("date").and_then(value_to_u64), fallback);

    for (coin, value) in &response.data {
        if !value.is_object() {
            // `date` and any other scalar bookkeeping entries.
            continue;
        }
        let Ok(ticker) = serde_json::from_value::<BithumbTicker>(value.clone()) else {
            out.drop_record();
            continue;
        };

        let fields = Fields {
            price: opt_f64(&ticker.closing_price),
            volume_24h: opt_f64(&ticker.acc_trade_value_24h),
            change_rate_24h: opt_f64(&ticker.fluctate_rate_24h),
            high_24h: opt_f64(&ticker.max_price),
            low_24h: opt_f64(&ticker.min_price),
        };

        out.push(exchange, Some((coin.to_ascii_uppercase(), Quote::Krw)), fields, stamp);
    }
}
