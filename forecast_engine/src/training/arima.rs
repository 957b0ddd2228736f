use market_data::{PriceSeries, Symbol};
use tracing::debug;

use super::{TrainError, Trained, Trainer};
use crate::{
    config::ForecastConfig,
    evaluation::{HoldoutScore, split_index},
    models::arima::{ArimaModel, ArimaParams, select_differencing},
    registry::{ArtifactKind, ModelFamily, ModelRegistry, StoredArtifact},
};

/// Chooses `d` by repeated ADF tests on the business-day series, fits on the
/// chronological training prefix and scores the forecast over the holdout.
#[derive(Debug, Clone)]
pub struct ArimaTrainer {
    pub min_history: usize,
    pub train_ratio: f64,
    pub params: ArimaParams,
}

impl ArimaTrainer {
    pub fn from_config(config: &ForecastConfig) -> Self {
        let cfg = &config.training.arima;
        Self {
            min_history: cfg.min_history,
            train_ratio: cfg.train_ratio,
            params: cfg.params(),
        }
    }
}

impl Trainer for ArimaTrainer {
    type Input = PriceSeries;

    fn family(&self) -> ModelFamily {
        ModelFamily::Arima
    }

    fn train(
        &self,
        registry: &ModelRegistry,
        symbol: &Symbol,
        series: &PriceSeries,
    ) -> Result<Trained, TrainError> {
        let closes = series.to_business_day_frequency().closes();
        if closes.len() < self.min_history {
            return Err(TrainError::InsufficientData {
                required: self.min_history,
                actual: closes.len(),
            });
        }

        let d = select_differencing(&closes, self.params.max_d);
        let split = split_index(closes.len(), self.train_ratio);
        let (train, test) = closes.split_at(split);
        let model = ArimaModel::fit(train, self.params.p, d)?;
        let holdout = HoldoutScore::compute(test, &model.forecast(test.len()));
        debug!(%symbol, order = ?model.order(), rmse = holdout.map(|h| h.rmse), "arima fitted");

        let path = registry.store(
            &StoredArtifact::new(symbol.clone(), ArtifactKind::ArimaModel, model).with_holdout(holdout),
        )?;
        Ok(Trained { path, holdout })
    }
}
