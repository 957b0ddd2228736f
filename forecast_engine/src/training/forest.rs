use indexmap::IndexMap;
use market_data::Symbol;
use tracing::debug;

use super::{TrainError, Trained, Trainer};
use crate::{
    config::ForecastConfig,
    evaluation::{HoldoutScore, split_index},
    indicators::IndicatorRow,
    models::forest::{ForestParams, RandomForest},
    registry::{ArtifactKind, ModelFamily, ModelRegistry, StoredArtifact},
};

/// Groups technical rows by stock, keeping first-seen symbol order.
pub fn group_by_symbol(rows: Vec<IndicatorRow>) -> IndexMap<Symbol, Vec<IndicatorRow>> {
    let mut grouped: IndexMap<Symbol, Vec<IndicatorRow>> = IndexMap::new();
    for row in rows {
        grouped.entry(row.stock.clone()).or_default().push(row);
    }
    grouped
}

/// Feature rows paired with the following row's close.
pub fn next_close_samples(rows: &[IndicatorRow]) -> (Vec<Vec<f64>>, Vec<f64>) {
    rows.windows(2)
        .map(|w| (w[0].features().to_vec(), w[1].close))
        .unzip()
}

/// Regresses next-day close on the technical features of one symbol.
#[derive(Debug, Clone)]
pub struct ForestTrainer {
    pub min_rows: usize,
    pub train_ratio: f64,
    pub params: ForestParams,
}

impl ForestTrainer {
    pub fn from_config(config: &ForecastConfig) -> Self {
        let cfg = &config.training.forest;
        Self {
            min_rows: cfg.min_rows,
            train_ratio: cfg.train_ratio,
            params: cfg.params(),
        }
    }
}

impl Trainer for ForestTrainer {
    type Input = [IndicatorRow];

    fn family(&self) -> ModelFamily {
        ModelFamily::Forest
    }

    fn train(
        &self,
        registry: &ModelRegistry,
        symbol: &Symbol,
        rows: &[IndicatorRow],
    ) -> Result<Trained, TrainError> {
        if rows.len() < self.min_rows {
            return Err(TrainError::InsufficientData {
                required: self.min_rows,
                actual: rows.len(),
            });
        }

        let (x, y) = next_close_samples(rows);
        let split = split_index(x.len(), self.train_ratio);
        let forest = RandomForest::fit(&x[..split], &y[..split], &self.params)?;
        let predicted = forest.predict_many(&x[split..])?;
        let holdout = HoldoutScore::compute(&y[split..], &predicted);
        debug!(%symbol, train = split, test = x.len() - split, rmse = holdout.map(|h| h.rmse), "forest fitted");

        let path = registry.store(
            &StoredArtifact::new(symbol.clone(), ArtifactKind::ForestModel, forest).with_holdout(holdout),
        )?;
        Ok(Trained { path, holdout })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(stock: &str, day: u32, close: f64) -> IndicatorRow {
        IndicatorRow {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
            stock: Symbol::new(stock),
            sma_20: close,
            sma_50: close,
            returns: 0.0,
            volatility_20: 0.0,
            rsi_14: 50.0,
        }
    }

    #[test]
    fn targets_are_next_day_closes() {
        let rows = [row("A.NS", 1, 10.0), row("A.NS", 2, 11.0), row("A.NS", 3, 12.0)];
        let (x, y) = next_close_samples(&rows);
        assert_eq!(y, vec![11.0, 12.0]);
        assert_eq!(x[0], vec![10.0, 10.0, 50.0, 0.0, 0.0]);
    }

    #[test]
    fn grouping_keeps_first_seen_order() {
        let grouped = group_by_symbol(vec![
            row("B.NS", 1, 1.0),
            row("A.NS", 1, 1.0),
            row("B.NS", 2, 2.0),
        ]);
        let keys: Vec<_> = grouped.keys().map(Symbol::as_str).collect();
        assert_eq!(keys, ["B.NS", "A.NS"]);
        assert_eq!(grouped[&Symbol::new("B.NS")].len(), 2);
    }
}
