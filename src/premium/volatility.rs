use serde::Serialize;
use crate::config::ViewsConfig;
use crate::premium::calculator::PremiumCalculator;
use crate::premium::round2;
use crate::types::{Quote, Ticker};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityLevel {
    Low,
    Medium,
    High,
    Extreme,
}

impl VolatilityLevel {
    pub fn from_index(index: u32) -> Self {
        match index {
            0..25 => VolatilityLevel::Low,
            25..50 => VolatilityLevel::Medium,
            50..75 => VolatilityLevel::High,
            _ => VolatilityLevel::Extreme,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolatileSymbol {
    pub symbol: String,
    pub volatility: f64,
    pub change_24h: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolatilityReport {
    pub index: u32,
    pub level: VolatilityLevel,
    pub avg_change_24h: f64,
    pub avg_volatility: f64,
    pub sample_size: usize,
    pub top_volatile: Vec<VolatileSymbol>,
    pub updated_at: Option<String>,
}

impl VolatilityReport {
    /// Reported while no stats ticker carries a 24h range.
    pub fn neutral() -> Self {
        VolatilityReport {
            index: 50,
            level: VolatilityLevel::Medium,
            avg_change_24h: 0.0,
            avg_volatility: 0.0,
            sample_size: 0,
            top_volatile: Vec::new(),
            updated_at: None,
        }
    }

    pub fn from_tickers(tickers: &[Ticker], top: usize) -> Self {
        let mut samples: Vec<VolatileSymbol> = tickers
            .iter()
            .filter_map(|t| {
                let (high, low) = (t.high_24h?, t.low_24h?);
                Some(VolatileSymbol {
                    symbol: t.base_symbol.clone(),
                    volatility: (high - low) / low * 100.0,
                    change_24h: t.change_rate_24h.unwrap_or(0.0),
                })
            })
            .collect();

        if samples.is_empty() {
            return VolatilityReport::neutral();
        }

        let count = samples.len() as f64;
        let avg_volatility = samples.iter().map(|s| s.volatility).sum::<f64>() / count;
        let avg_change = samples.iter().map(|s| s.change_24h.abs()).sum::<f64>() / count;
        let index = (avg_volatility * 5.0 + avg_change * 3.0).round().clamp(0.0, 100.0) as u32;

        samples.sort_by(|a, b| b.volatility.total_cmp(&a.volatility).then_with(|| a.symbol.cmp(&b.symbol)));
        let sample_size = samples.len();
        let top_volatile = samples
            .into_iter()
            .take(top)
            .map(|s| VolatileSymbol {
                volatility: round2(s.volatility),
                change_24h: round2(s.change_24h),
                symbol: s.symbol,
            })
            .collect();

        VolatilityReport {
            index,
            level: VolatilityLevel::from_index(index),
            avg_change_24h: round2(avg_change),
            avg_volatility: round2(avg_volatility),
            sample_size,
            top_volatile,
            updated_at: tickers.iter().map(|t| t.observed_at).max().map(|ts| ts.to_rfc3339()),
        }
    }
}

impl PremiumCalculator {
    pub fn volatility(&self, views: &ViewsConfig) -> VolatilityReport {
        let tickers = self.stats_market(views.volatility_source, Quote::Usdt);
        VolatilityReport::from_tickers(&tickers, views.volatile_count)
    }
}
