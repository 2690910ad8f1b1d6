use std::collections::HashMap;
use serde::Serialize;
use crate::config::ViewsConfig;
use crate::premium::calculator::{PremiumCalculator, PremiumRow};
use crate::types::MarketSelector;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MajorsView {
    pub domestic_exchange: MarketSelector,
    pub foreign_exchange: MarketSelector,
    /// One row per configured major, in configured order. Gaps are `null`.
    pub coins: Vec<PremiumRow>,
    pub fx_rate: Option<f64>,
    pub updated_at: Option<String>,
}

impl PremiumCalculator {
    pub fn majors(&self, views: &ViewsConfig) -> MajorsView {
        let snapshot = self.snapshot(views.default_domestic, views.reference_foreign);
        let mut rows: HashMap<String, PremiumRow> = snapshot
            .rows
            .into_iter()
            .map(|row| (row.symbol.clone(), row))
            .collect();

        let coins = views
            .majors
            .iter()
            .map(|symbol| rows.remove(symbol).unwrap_or_else(|| self.empty_row(symbol)))
            .collect();

        MajorsView {
            domestic_exchange: snapshot.domestic_exchange,
            foreign_exchange: snapshot.foreign_exchange,
            coins,
            fx_rate: snapshot.fx_rate,
            updated_at: snapshot.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ViewsConfig;
    use crate::premium::calculator::testing::Fixture;
    use crate::reference::{ReferenceDirectory, SymbolInfo};
    use crate::types::{ExchangeId, Quote};

    #[test]
    fn test_majors_keep_configured_order_and_null_gaps() {
        let fixture = Fixture::new(Some(1_000.0));
        fixture.price(ExchangeId::Upbit, "ETH", Quote::Krw, 3_030_000.0);
        fixture.price(ExchangeId::Binance, "ETH", Quote::Usdt, 3_000.0);
        fixture.price(ExchangeId::Binance, "SOL", Quote::Usdt, 150.0);
        fixture.price(ExchangeId::Upbit, "PEPE", Quote::Krw, 0.01);

        let views = ViewsConfig {
            majors: vec!["BTC".to_string(), "ETH".to_string(), "SOL".to_string()],
            ..ViewsConfig::default()
        };
        let reference = ReferenceDirectory::from_entries([SymbolInfo {
            symbol: "BTC".to_string(),
            name_ko: Some("비트코인".to_string()),
            name_en: Some("Bitcoin".to_string()),
            icon_url: None,
        }]);
        let majors = fixture.calculator(reference).majors(&views);

        let symbols: Vec<_> = majors.coins.iter().map(|c| c.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTC", "ETH", "SOL"]);

        let btc = &majors.coins[0];
        assert_eq!(btc.english_name.as_deref(), Some("Bitcoin"));
        assert!(btc.korean_price.is_none() && btc.global_price.is_none() && btc.premium.is_none());

        assert!((majors.coins[1].premium.unwrap() - 1.0).abs() < 1e-9);

        let sol = &majors.coins[2];
        assert_eq!(sol.korean_price, None);
        assert_eq!(sol.global_price_krw, Some(150_000.0));
        assert_eq!(majors.fx_rate, Some(1_000.0));
    }
}
