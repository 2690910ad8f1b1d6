use serde::Deserialize;
use serde_json::Value;
use crate::error::{Error, Result};
use crate::price_infra::normalizer::{change_from, fraction_to_percent, observed_at, Fields, Lenient, Normalized};
use crate::price_infra::payload::expect_code;
use crate::types::{ExchangeId, Quote, Timestamp};
use crate::utils::parsing::{opt_f64, opt_string, opt_u64};

// OKX: /api/v5/market/tickers?instType=SPOT

#[derive(Clone, Debug, Deserialize)]
pub struct OkxResponse {
    code: Option<Value>,
    #[serde(default)]
    data: Vec<Lenient<OkxTicker>>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxTicker {
    inst_id: Option<Value>,
    last: Option<Value>,
    /// Quote-currency volume for spot instruments.
    vol_ccy24h: Option<Value>,
    open24h: Option<Value>,
    high24h: Option<Value>,
    low24h: Option<Value>,
    ts: Option<Value>,
}

impl OkxResponse {
    pub(crate) fn check(&self, exchange: ExchangeId) -> Result<()> {
        expect_code(exchange, opt_string(&self.code), "0")
    }
}

pub(crate) fn normalize_okx(exchange: ExchangeId, response: &OkxResponse, fallback: Timestamp, out: &mut Normalized) {
    for record in &response.data {
        let Lenient::Record(ticker) = record else {
            out.drop_record();
            continue;
        };
        let Some(inst_id) = opt_string(&ticker.inst_id) else {
            out.drop_record();
            continue;
        };

        let last = opt_f64(&ticker.last);
        let fields = Fields {
            price: last,
            volume_24h: opt_f64(&ticker.vol_ccy24h),
            change_rate_24h: change_from(last, opt_f64(&ticker.open24h)),
            high_24h: opt_f64(&ticker.high24h),
            low_24h: opt_f64(&ticker.low24h),
        };

        out.push(
            exchange,
            Quote::split_delimited(&inst_id, '-', false),
            fields,
            observed_at(opt_u64(&ticker.ts), fallback),
        );
    }
}

// Bybit: /v5/market/tickers?category=spot

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitResponse {
    ret_code: Option<Value>,
    result: Option<BybitResult>,
    time: Option<Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BybitResult {
    #[serde(default)]
    list: Vec<Lenient<BybitTicker>>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitTicker {
    symbol: Option<Value>,
    last_price: Option<Value>,
    turnover24h: Option<Value>,
    /// Fraction, not percent.
    price24h_pcnt: Option<Value>,
    high_price24h: Option<Value>,
    low_price24h: Option<Value>,
}

impl BybitResponse {
    pub(crate) fn check(&self, exchange: ExchangeId) -> Result<()> {
        expect_code(exchange, opt_string(&self.ret_code), "0")?;
        if self.result.is_none() {
            return Err(Error::UnexpectedShape {
                exchange,
                details: "missing result".to_string(),
            });
        }
        Ok(())
    }
}

pub(crate) fn normalize_bybit(exchange: ExchangeId, response: &BybitResponse, fallback: Timestamp, out: &mut Normalized) {
    let Some(result) = &response.result else {
        return;
    };
    let stamp = observed_at(opt_u64(&response.time), fallback);

    for record in &result.list {
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
            volume_24h: opt_f64(&ticker.turnover24h),
            change_rate_24h: fraction_to_percent(opt_f64(&ticker.price24h_pcnt)),
            high_24h: opt_f64(&ticker.high_price24h),
            low_24h: opt_f64(&ticker.low_price24h),
        };

        out.push(exchange, Quote::split_concatenated(&symbol), fields, stamp);
    }
}

// Bitget: /api/v2/spot/market/tickers

#[derive(Clone, Debug, Deserialize)]
pub struct BitgetResponse {
    code: Option<Value>,
    #[serde(default)]
    data: Vec<Lenient<BitgetTicker>>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitgetTicker {
    symbol: Option<Value>,
    last_pr: Option<Value>,
    quote_volume: Option<Value>,
    /// Fraction, not percent.
    change24h: Option<Value>,
    high24h: Option<Value>,
    low24h: Option<Value>,
    ts: Option<Value>,
}

impl BitgetResponse {
    pub(crate) fn check(&self, exchange: ExchangeId) -> Result<()> {
        expect_code(exchange, opt_string(&self.code), "00000")
    }
}

pub(crate) fn normalize_bitget(exchange: ExchangeId, response: &BitgetResponse, fallback: Timestamp, out: &mut Normalized) {
    for record in &response.data {
        let Lenient::Record(ticker) = record else {
            out.drop_record();
            continue;
        };
        let Some(symbol) = opt_string(&ticker.symbol) else {
            out.drop_record();
            continue;
        };

        let fields = Fields {
            price: opt_f64(&ticker.last_pr),
            volume_24h: opt_f64(&ticker.quote_volume),
            change_rate_24h: fraction_to_percent(opt_f64(&ticker.change24h)),
            high_24h: opt_f64(&ticker.high24h),
            low_24h: opt_f64(&ticker.low24h),
        };

        out.push(
            exchange,
            Quote::split_concatenated(&symbol),
            fields,
            observed_at(opt_u64(&ticker.ts), fallback),
        );
    }
}

// Gate: /api/v4/spot/tickers (no timestamp in the body)

#[derive(Clone, Debug, Deserialize)]
pub struct GateTicker {
    currency_pair: Option<Value>,
    last: Option<Value>,
    quote_volume: Option<Value>,
    /// Already percent.
    change_percentage: Option<Value>,
    high_24h: Option<Value>,
    low_24h: Option<Value>,
}

pub(crate) fn normalize_gate(exchange: ExchangeId, records: &[Lenient<GateTicker>], fallback: Timestamp, out: &mut Normalized) {
    for record in records {
        let Lenient::Record(ticker) = record else {
            out.drop_record();
            continue;
        };
        let Some(pair) = opt_string(&ticker.currency_pair) else {
            out.drop_record();
            continue;
        };

        let fields = Fields {
            price: opt_f64(&ticker.last),
            volume_24h: opt_f64(&ticker.quote_volume),
            change_rate_24h: opt_f64(&ticker.change_percentage),
            high_24h: opt_f64(&ticker.high_24h),
            low_24h: opt_f64(&ticker.low_24h),
        };

        out.push(exchange, Quote::split_delimited(&pair, '_', false), fields, fallback);
    }
}

// HTX: /market/tickers

#[derive(Clone, Debug, Deserialize)]
pub struct HtxResponse {
    status: Option<Value>,
    ts: Option<Value>,
    #[serde(default)]
    data: Vec<Lenient<HtxTicker>>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct HtxTicker {
    symbol: Option<Value>,
    close: Option<Value>,
    /// Quote-currency volume.
    vol: Option<Value>,
    open: Option<Value>,
    high: Option<Value>,
    low: Option<Value>,
}

impl HtxResponse {
    pub(crate) fn check(&self, exchange: ExchangeId) -> Result<()> {
        expect_code(exchange, opt_string(&self.status), "ok")
    }
}

pub(crate) fn normalize_htx(exchange: ExchangeId, response: &HtxResponse, fallback: Timestamp, out: &mut Normalized) {
    let stamp = observed_at(opt_u64(&response.ts), fallback);

    for record in &response.data {
        let Lenient::Record(ticker) = record else {
            out.drop_record();
            continue;
        };
        let Some(symbol) = opt_string(&ticker.symbol) else {
            out.drop_record();
            continue;
        };

        let close = opt_f64(&ticker.close);
        let fields = Fields {
            price: close,
            volume_24h: opt_f64(&ticker.vol),
            change_rate_24h: change_from(close, opt_f64(&ticker.open)),
            high_24h: opt_f64(&ticker.high),
            low_24h: opt_f64(&ticker.low),
        };

        out.push(exchange, Quote::split_concatenated(&symbol), fields, stamp);
    }
}
