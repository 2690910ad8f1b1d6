use serde::Serialize;
use crate::config::ViewsConfig;
use crate::premium::calculator::{PremiumCalculator, PriceReader};
use crate::premium::{premium_pct, round2};
use crate::types::MarketSelector;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapRow {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub korean_name: Option<String>,
    /// One cell per entry of [`Heatmap::columns`], in the same order.
    pub cells: Vec<Option<f64>>,
}

/// Symbols × exchanges. Domestic columns hold the kimchi premium against the
/// reference market; foreign columns hold their spread against it.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Heatmap {
    pub reference: MarketSelector,
    pub columns: Vec<MarketSelector>,
    pub rows: Vec<HeatmapRow>,
    pub fx_rate: Option<f64>,
    pub updated_at: Option<String>,
}

impl PremiumCalculator {
    pub fn heatmap(&self, views: &ViewsConfig) -> Heatmap {
        let reference = views.reference_foreign;
        let columns: Vec<MarketSelector> = views
            .heatmap_domestic
            .iter()
            .chain(views.heatmap_foreign.iter())
            .copied()
            .collect();

        let mut reader = self.reader();
        let rows = views
            .heatmap_symbols
            .iter()
            .map(|symbol| {
                let symbol = symbol.trim().to_ascii_uppercase();
                let cells = columns
                    .iter()
                    .map(|column| cell(&mut reader, *column, reference, &symbol))
                    .collect();
                HeatmapRow {
                    korean_name: self.reference().get(&symbol).and_then(|i| i.name_ko.clone()),
                    symbol,
                    cells,
                }
            })
            .collect();

        Heatmap {
            reference,
            columns,
            rows,
            fx_rate: reader.fx_rate(),
            updated_at: reader.updated_at(),
        }
    }
}

fn cell(reader: &mut PriceReader<'_>, column: MarketSelector, reference: MarketSelector, symbol: &str) -> Option<f64> {
    let reference_ticker = reader.ticker(reference.exchange, symbol, reference.quote)?;
    if column == reference {
        return Some(0.0);
    }

    // Same quote compares directly and needs no FX.
    let value = if column.quote == reference.quote {
        let price = reader.ticker(column.exchange, symbol, column.quote)?.price;
        premium_pct(price, reference_ticker.price)
    } else {
        let price = reader.price_krw(column, symbol)?;
        let reference_krw = reader.price_krw(reference, symbol)?;
        premium_pct(price, reference_krw)
    };
    value.map(round2)
}
