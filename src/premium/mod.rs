pub mod calculator;
pub mod heatmap;
pub mod majors;
pub mod summary;
pub mod volatility;

pub use calculator::{PremiumCalculator, PremiumRow, PremiumSnapshot};
pub use heatmap::{Heatmap, HeatmapRow};
pub use majors::MajorsView;
pub use summary::{ExchangePremiumSummary, MarketSummary, Mover, SymbolValue, TrendingCoin, TrendingSort, TrendingView};
pub use volatility::{VolatileSymbol, VolatilityLevel, VolatilityReport};

/// Premiums at or beyond this magnitude (percent) are data anomalies: shown per
/// row, never averaged.
pub const OUTLIER_LIMIT: f64 = 100.0;

/// `(domestic - foreign) / foreign * 100`, both sides already in the same currency.
pub fn premium_pct(domestic: f64, foreign: f64) -> Option<f64> {
    if !(foreign > 0.0) || !domestic.is_finite() {
        return None;
    }
    let premium = (domestic - foreign) / foreign * 100.0;
    premium.is_finite().then_some(premium)
}

pub fn is_outlier(premium: f64) -> bool {
    premium.abs() >= OUTLIER_LIMIT
}

/// Mean of the premiums below [`OUTLIER_LIMIT`]. `None` when nothing qualifies.
pub fn average_premium(premiums: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = premiums
        .into_iter()
        .filter(|p| !is_outlier(*p))
        .fold((0.0, 0usize), |(sum, count), p| (sum + p, count + 1));

    (count > 0).then(|| sum / count as f64)
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_premium_reference_case() {
        let premium = premium_pct(101_000_000.0, 72_000.0 * 1_400.0).unwrap();
        assert!((premium - 0.2976).abs() < 0.01);
    }

    #[test]
    fn test_premium_requires_positive_foreign_price() {
        assert_eq!(premium_pct(100.0, 0.0), None);
        assert_eq!(premium_pct(100.0, -1.0), None);
        assert_eq!(premium_pct(100.0, f64::NAN), None);
    }

    #[test]
    fn test_average_excludes_outliers() {
        assert_eq!(average_premium([1.0, 3.0, 150.0]), Some(2.0));
        assert_eq!(average_premium([1.0, -100.0]), Some(1.0));
        assert_eq!(average_premium([250.0]), None);
        assert_eq!(average_premium([]), None);
    }
}
