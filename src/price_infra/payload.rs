use serde::de::DeserializeOwned;
use crate::config::FeedKind;
use crate::error::{Error, Result};
use crate::price_infra::connectors::binance::{BinancePrice, BinanceStats};
use crate::price_infra::connectors::bithumb::BithumbResponse;
use crate::price_infra::connectors::coinone::CoinoneResponse;
use crate::price_infra::connectors::global::{BitgetResponse, BybitResponse, GateTicker, HtxResponse, OkxResponse};
use crate::price_infra::connectors::upbit::UpbitTicker;
use crate::price_infra::normalizer::Lenient;
use crate::types::ExchangeId;

/// Raw upstream body, one variant per distinct exchange shape.
#[derive(Clone, Debug)]
pub enum RawPayload {
    Upbit(Vec<Lenient<UpbitTicker>>),
    Bithumb(BithumbResponse),
    Coinone(CoinoneResponse),
    /// `[{symbol, price}]`, served by Binance spot and futures and by MEXC.
    BinancePrices(Vec<Lenient<BinancePrice>>),
    /// `/ticker/24hr` rows.
    BinanceStats(Vec<Lenient<BinanceStats>>),
    Okx(OkxResponse),
    Bybit(BybitResponse),
    Bitget(BitgetResponse),
    Gate(Vec<Lenient<GateTicker>>),
    Htx(HtxResponse),
}

impl RawPayload {
    /// Decodes a 2xx body into the shape `(exchange, kind)` serves.
    ///
    /// A body of the wrong top-level shape, or one carrying a venue-level
    /// rejection code, is an error for the whole poll.
    pub fn parse(exchange: ExchangeId, kind: FeedKind, body: &[u8]) -> Result<Self> {
        let payload = match (exchange, kind) {
            (ExchangeId::Upbit, _) => RawPayload::Upbit(decode(exchange, body)?),
            (ExchangeId::Bithumb, _) => {
                let response: BithumbResponse = decode(exchange, body)?;
                response.check(exchange)?;
                RawPayload::Bithumb(response)
            }
            (ExchangeId::Coinone, _) => {
                let response: CoinoneResponse = decode(exchange, body)?;
                response.check(exchange)?;
                RawPayload::Coinone(response)
            }
            (ExchangeId::Binance | ExchangeId::BinanceFutures | ExchangeId::Mexc, FeedKind::Prices) => {
                RawPayload::BinancePrices(decode(exchange, body)?)
            }
            (ExchangeId::Binance | ExchangeId::BinanceFutures | ExchangeId::Mexc, FeedKind::Stats) => {
                RawPayload::BinanceStats(decode(exchange, body)?)
            }
            (ExchangeId::Okx, _) => {
                let response: OkxResponse = decode(exchange, body)?;
                response.check(exchange)?;
                RawPayload::Okx(response)
            }
            (ExchangeId::Bybit, _) => {
                let response: BybitResponse = decode(exchange, body)?;
                response.check(exchange)?;
                RawPayload::Bybit(response)
            }
            (ExchangeId::Bitget, _) => {
                let response: BitgetResponse = decode(exchange, body)?;
                response.check(exchange)?;
                RawPayload::Bitget(response)
            }
            (ExchangeId::Gate, _) => RawPayload::Gate(decode(exchange, body)?),
            (ExchangeId::Htx, _) => {
                let response: HtxResponse = decode(exchange, body)?;
                response.check(exchange)?;
                RawPayload::Htx(response)
            }
        };

        Ok(payload)
    }
}

fn decode<T: DeserializeOwned>(exchange: ExchangeId, body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| Error::UnexpectedShape {
        exchange,
        details: e.to_string(),
    })
}

/// Shared venue-status check: `Ok` when `actual` matches `expected`.
pub(crate) fn expect_code(exchange: ExchangeId, actual: Option<String>, expected: &str) -> Result<()> {
    match actual {
        Some(code) if code == expected => Ok(()),
        Some(code) => Err(Error::UpstreamRejected { exchange, code }),
        None => Err(Error::UnexpectedShape {
            exchange,
            details: "missing status field".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_object_instead_of_array_is_a_shape_failure() {
        let body = br#"{"code":-1121,"msg":"Invalid symbol."}"#;
        let err = RawPayload::parse(ExchangeId::Binance, FeedKind::Prices, body).unwrap_err();
        assert!(matches!(err, Error::UnexpectedShape { exchange: ExchangeId::Binance, .. }));
    }

    #[test]
    fn test_venue_rejections() {
        let bithumb = RawPayload::parse(ExchangeId::Bithumb, FeedKind::Prices, br#"{"status":"5600","message":"busy"}"#);
        assert!(matches!(bithumb, Err(Error::UpstreamRejected { code, .. }) if code == "5600"));

        let okx = RawPayload::parse(ExchangeId::Okx, FeedKind::Prices, br#"{"code":"50011","msg":"rate limit","data":[]}"#);
        assert!(matches!(okx, Err(Error::UpstreamRejected { .. })));

        let bybit = RawPayload::parse(ExchangeId::Bybit, FeedKind::Prices, br#"{"retCode":10006,"retMsg":"too many"}"#);
        assert!(matches!(bybit, Err(Error::UpstreamRejected { code, .. }) if code == "10006"));

        let coinone = RawPayload::parse(ExchangeId::Coinone, FeedKind::Prices, br#"{"result":"error","error_code":"4"}"#);
        assert!(matches!(coinone, Err(Error::UpstreamRejected { .. })));

        let htx = RawPayload::parse(ExchangeId::Htx, FeedKind::Prices, br#"{"status":"error","err-code":"bad-request"}"#);
        assert!(matches!(htx, Err(Error::UpstreamRejected { .. })));
    }

    #[test]
    fn test_accepted_code_without_body_is_a_shape_failure() {
        for body in [&br#"{"retCode":0}"#[..], br#"{"retCode":0,"result":null}"#] {
            let err = RawPayload::parse(ExchangeId::Bybit, FeedKind::Prices, body).unwrap_err();
            assert!(matches!(err, Error::UnexpectedShape { exchange: ExchangeId::Bybit, .. }));
        }
    }

    #[test]
    fn test_not_json_is_a_shape_failure() {
        let err = RawPayload::parse(ExchangeId::Gate, FeedKind::Prices, b"<html>502</html>").unwrap_err();
        assert!(matches!(err, Error::UnexpectedShape { .. }));
    }
}
