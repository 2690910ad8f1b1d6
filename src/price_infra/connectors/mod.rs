pub mod binance;
pub mod bithumb;
pub mod coinone;
pub mod global;
pub mod upbit;

use async_trait::async_trait;
use reqwest::Client;
use crate::config::{FeedConfig, FeedKind};
use crate::error::{Error, Result};
use crate::price_infra::payload::RawPayload;
use crate::types::ExchangeId;

/// One upstream ticker endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TickerSource: Send + Sync {
    fn exchange(&self) -> ExchangeId;
    fn kind(&self) -> FeedKind;
    async fn fetch(&self) -> Result<RawPayload>;
}

/// REST source with its own connection pool, so no feed can starve another.
pub struct HttpTickerSource {
    exchange: ExchangeId,
    kind: FeedKind,
    url: String,
    client: Client,
}

impl HttpTickerSource {
    pub fn new(feed: &FeedConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(feed.timeout())
            .connect_timeout(feed.timeout())
            .pool_max_idle_per_host(feed.max_connections)
            .user_agent(crate::USER_AGENT)
            .build()
            .map_err(|e| Error::Http {
                exchange: feed.exchange,
                message: e.to_string(),
            })?;

        Ok(HttpTickerSource {
            exchange: feed.exchange,
            kind: feed.kind,
            url: feed.url.clone(),
            client,
        })
    }

    fn map_error(&self, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::Timeout(self.exchange)
        } else {
            Error::Http {
                exchange: self.exchange,
                message: error.to_string(),
            }
        }
    }
}

#[async_trait]
impl TickerSource for HttpTickerSource {
    fn exchange(&self) -> ExchangeId {
        self.exchange
    }

    fn kind(&self) -> FeedKind {
        self.kind
    }

    async fn fetch(&self) -> Result<RawPayload> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::UpstreamStatus {
                exchange: self.exchange,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| self.map_error(e))?;
        RawPayload::parse(self.exchange, self.kind, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn feed(server: &MockServer, exchange: ExchangeId, route: &str, timeout_ms: u64) -> FeedConfig {
        FeedConfig::new(exchange, FeedKind::Prices, &format!("{}{}", server.uri(), route), 5_000, timeout_ms)
    }

    #[tokio::test]
    async fn test_fetch_parses_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ticker/price"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"symbol": "BTCUSDT", "price": "72000"}
            ])))
            .mount(&server)
            .await;

        let source = HttpTickerSource::new(&feed(&server, ExchangeId::Binance, "/api/v3/ticker/price", 1_000)).unwrap();
        let payload = source.fetch().await.unwrap();
        assert!(matches!(payload, RawPayload::BinancePrices(records) if records.len() == 1));
    }

    #[tokio::test]
    async fn test_non_2xx_is_upstream_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = HttpTickerSource::new(&feed(&server, ExchangeId::Okx, "/tickers", 1_000)).unwrap();
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, Error::UpstreamStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)).set_body_string("[]"))
            .mount(&server)
            .await;

        let source = HttpTickerSource::new(&feed(&server, ExchangeId::Gate, "/tickers", 50)).unwrap();
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, Error::Timeout(ExchangeId::Gate)));
    }
}
