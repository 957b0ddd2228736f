use market_data::{PriceSeries, Symbol};

use super::{TrainError, Trained, Trainer};
use crate::{
    config::ForecastConfig,
    models::trend::{TrendModel, TrendParams},
    registry::{ArtifactKind, ModelFamily, ModelRegistry, StoredArtifact},
};

/// Fits the trend + seasonality model on the full close history.
#[derive(Debug, Clone)]
pub struct TrendTrainer {
    pub min_history: usize,
    pub params: TrendParams,
}

impl TrendTrainer {
    pub fn from_config(config: &ForecastConfig) -> Self {
        Self {
            min_history: config.training.trend.min_history,
            params: config.training.trend.params(),
        }
    }
}

impl Trainer for TrendTrainer {
    type Input = PriceSeries;

    fn family(&self) -> ModelFamily {
        ModelFamily::Trend
    }

    fn train(
        &self,
        registry: &ModelRegistry,
        symbol: &Symbol,
        series: &PriceSeries,
    ) -> Result<Trained, TrainError> {
        if series.len() < self.min_history {
            return Err(TrainError::InsufficientData {
                required: self.min_history,
                actual: series.len(),
            });
        }
        let model = TrendModel::fit(&series.dates(), &series.closes(), &self.params)?;
        let path = registry.store(&StoredArtifact::new(
            symbol.clone(),
            ArtifactKind::TrendModel,
            model,
        ))?;
        Ok(Trained {
            path,
            holdout: None,
        })
    }
}
