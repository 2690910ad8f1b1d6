use serde::{Deserialize, Serialize};
use std::fmt;
use crate::types::exchange::{ExchangeId, Quote};
use crate::types::timestamp::Timestamp;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TickerKey {
    pub exchange: ExchangeId,
    pub base: String,
    pub quote: Quote,
}

impl TickerKey {
    pub fn new(exchange: ExchangeId, base: impl Into<String>, quote: Quote) -> Self {
        TickerKey {
            exchange,
            base: base.into().to_ascii_uppercase(),
            quote,
        }
    }
}

impl fmt::Display for TickerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.exchange, self.base, self.quote)
    }
}

/// One exchange's latest observation for one trading pair.
///
/// Optional fields are absent when the upstream payload did not carry them;
/// they are never defaulted to zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker {
    pub exchange: ExchangeId,
    pub base_symbol: String,
    pub quote: Quote,
    pub price: f64,
    /// 24h traded value, in the quote currency.
    pub volume_24h: Option<f64>,
    /// 24h change, in percent.
    pub change_rate_24h: Option<f64>,
    pub high_24h: Option<f64>,
    pub low_24h: Option<f64>,
    pub observed_at: Timestamp,
}

impl Ticker {
    /// Returns `None` unless `price` is finite and strictly positive.
    pub fn new(
        exchange: ExchangeId,
        base_symbol: &str,
        quote: Quote,
        price: f64,
        observed_at: Timestamp,
    ) -> Option<Self> {
        let base_symbol = base_symbol.trim().to_ascii_uppercase();
        if !price.is_finite() || price <= 0.0 || base_symbol.is_empty() {
            return None;
        }

        Some(Ticker {
            exchange,
            base_symbol,
            quote,
            price,
            volume_24h: None,
            change_rate_24h: None,
            high_24h: None,
            low_24h: None,
            observed_at,
        })
    }

    pub fn with_volume(mut self, volume_24h: Option<f64>) -> Self {
        self.volume_24h = volume_24h.filter(|v| v.is_finite() && *v >= 0.0);
        self
    }

    pub fn with_change_rate(mut self, change_rate_24h: Option<f64>) -> Self {
        self.change_rate_24h = change_rate_24h.filter(|c| c.is_finite());
        self
    }

    pub fn with_range(mut self, high_24h: Option<f64>, low_24h: Option<f64>) -> Self {
        self.high_24h = high_24h.filter(|h| h.is_finite() && *h > 0.0);
        self.low_24h = low_24h.filter(|l| l.is_finite() && *l > 0.0);
        self
    }

    pub fn key(&self) -> TickerKey {
        TickerKey {
            exchange: self.exchange,
            base: self.base_symbol.clone(),
            quote: self.quote,
        }
    }
}
