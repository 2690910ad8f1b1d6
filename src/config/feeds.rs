use std::fmt;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::types::ExchangeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    /// Last price, refreshed every few seconds.
    Prices,
    /// 24h high/low/volume/change.
    Stats,
}

impl FeedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedKind::Prices => "prices",
            FeedKind::Stats => "stats",
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FeedConfig {
    pub exchange: ExchangeId,
    pub kind: FeedKind,
    pub url: String,
    pub interval_ms: u64,
    pub timeout_ms: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_max_connections() -> usize {
    2
}

fn default_enabled() -> bool {
    true
}

impl FeedConfig {
    pub fn new(exchange: ExchangeId, kind: FeedKind, url: &str, interval_ms: u64, timeout_ms: u64) -> Self {
        FeedConfig {
            exchange,
            kind,
            url: url.to_string(),
            interval_ms,
            timeout_ms,
            max_connections: default_max_connections(),
            enabled: true,
        }
    }

    pub fn name(&self) -> String {
        format!("{}:{}", self.exchange, self.kind)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

pub fn default_feeds() -> Vec<FeedConfig> {
    use ExchangeId::*;
    use FeedKind::*;

    vec![
        // Domestic
        FeedConfig::new(Upbit, Prices, "https://api.upbit.com/v1/ticker/all?quote_currencies=KRW,BTC,USDT", 3_000, 2_000),
        FeedConfig::new(Bithumb, Prices, "https://api.bithumb.com/public/ticker/ALL_KRW", 3_000, 2_000),
        FeedConfig::new(Coinone, Prices, "https://api.coinone.co.kr/public/v2/ticker_new/KRW", 3_000, 2_000),
        // Foreign
        FeedConfig::new(Binance, Prices, "https://api.binance.com/api/v3/ticker/price", 5_000, 4_000),
        FeedConfig::new(Binance, Stats, "https://api.binance.com/api/v3/ticker/24hr", 30_000, 10_000),
        FeedConfig::new(BinanceFutures, Prices, "https://fapi.binance.com/fapi/v1/ticker/price", 5_000, 4_000),
        FeedConfig::new(Okx, Prices, "https://www.okx.com/api/v5/market/tickers?instType=SPOT", 5_000, 4_000),
        FeedConfig::new(Bybit, Prices, "https://api.bybit.com/v5/market/tickers?category=spot", 5_000, 4_000),
        FeedConfig::new(Bitget, Prices, "https://api.bitget.com/api/v2/spot/market/tickers", 5_000, 4_000),
        FeedConfig::new(Gate, Prices, "https://api.gateio.ws/api/v4/spot/tickers", 5_000, 4_000),
        FeedConfig::new(Htx, Prices, "https://api.huobi.pro/market/tickers", 5_000, 4_000),
        FeedConfig::new(Mexc, Prices, "https://api.mexc.com/api/v3/ticker/price", 5_000, 4_000),
    ]
}
