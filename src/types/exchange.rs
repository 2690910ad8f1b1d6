use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExchangeId {
    // Domestic (KRW-settling)
    Upbit,
    Bithumb,
    Coinone,
    // Foreign (USDT-settling)
    Binance,
    BinanceFutures,
    Okx,
    Bybit,
    Bitget,
    Gate,
    Htx,
    Mexc,
}

impl ExchangeId {
    pub const ALL: [ExchangeId; 11] = [
        ExchangeId::Upbit,
        ExchangeId::Bithumb,
        ExchangeId::Coinone,
        ExchangeId::Binance,
        ExchangeId::BinanceFutures,
        ExchangeId::Okx,
        ExchangeId::Bybit,
        ExchangeId::Bitget,
        ExchangeId::Gate,
        ExchangeId::Htx,
        ExchangeId::Mexc,
    ];

    pub const DOMESTIC: [ExchangeId; 3] = [
        ExchangeId::Upbit,
        ExchangeId::Bithumb,
        ExchangeId::Coinone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeId::Upbit => "UPBIT",
            ExchangeId::Bithumb => "BITHUMB",
            ExchangeId::Coinone => "COINONE",
            ExchangeId::Binance => "BINANCE",
            ExchangeId::BinanceFutures => "BINANCE_FUTURES",
            ExchangeId::Okx => "OKX",
            ExchangeId::Bybit => "BYBIT",
            ExchangeId::Bitget => "BITGET",
            ExchangeId::Gate => "GATE",
            ExchangeId::Htx => "HTX",
            ExchangeId::Mexc => "MEXC",
        }
    }

    pub fn is_domestic(&self) -> bool {
        Self::DOMESTIC.contains(self)
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == upper)
            .ok_or_else(|| Error::UnknownExchange(s.to_string()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Quote {
    Krw,
    Usdt,
    Btc,
}

impl Quote {
    /// Suffix match order for concatenated symbols such as `BTCUSDT`.
    const SUFFIXES: [Quote; 3] = [Quote::Usdt, Quote::Krw, Quote::Btc];

    pub fn as_str(&self) -> &'static str {
        match self {
            Quote::Krw => "KRW",
            Quote::Usdt => "USDT",
            Quote::Btc => "BTC",
        }
    }

    /// Splits a concatenated pair (`ETHBTC`, `btcusdt`) into base and quote.
    pub fn split_concatenated(symbol: &str) -> Option<(String, Quote)> {
        let upper = symbol.trim().to_ascii_uppercase();
        Self::SUFFIXES.iter().find_map(|quote| {
            upper
                .strip_suffix(quote.as_str())
                .filter(|base| !base.is_empty())
                .map(|base| (base.to_string(), *quote))
        })
    }

    /// Splits a delimited pair. `quote_first` covers `KRW-BTC` style market codes.
    pub fn split_delimited(symbol: &str, delimiter: char, quote_first: bool) -> Option<(String, Quote)> {
        let (left, right) = symbol.trim().split_once(delimiter)?;
        let (base, quote) = if quote_first { (right, left) } else { (left, right) };
        let quote = quote.parse::<Quote>().ok()?;
        if base.is_empty() {
            return None;
        }
        Some((base.to_ascii_uppercase(), quote))
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quote {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "KRW" => Ok(Quote::Krw),
            "USDT" => Ok(Quote::Usdt),
            "BTC" => Ok(Quote::Btc),
            _ => Err(Error::InvalidSelector(format!("unsupported quote currency: {}", s))),
        }
    }
}

/// An `EXCHANGE_QUOTE` token such as `UPBIT_KRW` or `BINANCE_FUTURES_USDT`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarketSelector {
    pub exchange: ExchangeId,
    pub quote: Quote,
}

impl MarketSelector {
    pub fn new(exchange: ExchangeId, quote: Quote) -> Self {
        MarketSelector { exchange, quote }
    }
}

impl fmt::Display for MarketSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.exchange, self.quote)
    }
}

impl FromStr for MarketSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (exchange, quote) = s
            .trim()
            .rsplit_once('_')
            .ok_or_else(|| Error::InvalidSelector(s.to_string()))?;

        let exchange = exchange
            .parse::<ExchangeId>()
            .map_err(|_| Error::InvalidSelector(s.to_string()))?;
        let quote = quote
            .parse::<Quote>()
            .map_err(|_| Error::InvalidSelector(s.to_string()))?;

        Ok(MarketSelector { exchange, quote })
    }
}

impl Serialize for MarketSelector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MarketSelector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
