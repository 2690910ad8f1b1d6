use serde::{Deserialize, Serialize};
use crate::types::{ExchangeId, MarketSelector, Quote};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ViewsConfig {
    pub default_domestic: MarketSelector,
    pub default_foreign: MarketSelector,
    /// Foreign market every aggregate view (heatmap, summaries) compares against.
    pub reference_foreign: MarketSelector,
    pub heatmap_domestic: Vec<MarketSelector>,
    pub heatmap_foreign: Vec<MarketSelector>,
    pub heatmap_symbols: Vec<String>,
    /// Fixed symbol list of the majors view, in display order.
    pub majors: Vec<String>,
    /// Exchange whose stats feed backs the volatility view.
    pub volatility_source: ExchangeId,
    pub movers_count: usize,
    pub volatile_count: usize,
    pub trending_limit: usize,
}

impl Default for ViewsConfig {
    fn default() -> Self {
        let usdt = |exchange| MarketSelector::new(exchange, Quote::Usdt);
        let krw = |exchange| MarketSelector::new(exchange, Quote::Krw);

        ViewsConfig {
            default_domestic: krw(ExchangeId::Upbit),
            default_foreign: usdt(ExchangeId::Binance),
            reference_foreign: usdt(ExchangeId::Binance),
            heatmap_domestic: ExchangeId::DOMESTIC.iter().copied().map(krw).collect(),
            heatmap_foreign: vec![
                usdt(ExchangeId::Binance),
                usdt(ExchangeId::BinanceFutures),
                usdt(ExchangeId::Okx),
                usdt(ExchangeId::Bybit),
                usdt(ExchangeId::Bitget),
                usdt(ExchangeId::Gate),
                usdt(ExchangeId::Htx),
                usdt(ExchangeId::Mexc),
            ],
            heatmap_symbols: ["BTC", "ETH", "XRP", "SOL", "DOGE", "ADA", "AVAX", "LINK", "DOT", "TRX"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            majors: ["BTC", "ETH", "BNB", "SOL", "XRP", "DOGE", "ADA", "AVAX", "DOT", "LINK"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            volatility_source: ExchangeId::Binance,
            movers_count: 3,
            volatile_count: 5,
            trending_limit: 50,
        }
    }
}
