use market_data::{PriceSeries, Symbol};
use tracing::debug;

use super::{TrainError, Trained, Trainer};
use crate::{
    config::ForecastConfig,
    models::{lstm::{LstmNetwork, LstmParams}, scaler::MinMaxScaler},
    registry::{ArtifactKind, ModelFamily, ModelRegistry, StoredArtifact},
};

/// Fits the min-max scaler and the recurrent network on every close.
#[derive(Debug, Clone)]
pub struct SequenceTrainer {
    pub lookback: usize,
    pub min_history: usize,
    pub params: LstmParams,
}

impl SequenceTrainer {
    pub fn from_config(config: &ForecastConfig) -> Self {
        Self {
            lookback: config.short_horizon.lookback,
            min_history: config.training.sequence.min_history,
            params: config.training.sequence.params(),
        }
    }
}

impl Trainer for SequenceTrainer {
    type Input = PriceSeries;

    fn family(&self) -> ModelFamily {
        ModelFamily::Sequence
    }

    fn train(
        &self,
        registry: &ModelRegistry,
        symbol: &Symbol,
        series: &PriceSeries,
    ) -> Result<Trained, TrainError> {
        let required = self.min_history.max(self.lookback + 1);
        if series.len() < required {
            return Err(TrainError::InsufficientData {
                required,
                actual: series.len(),
            });
        }

        let closes = series.closes();
        let scaler = MinMaxScaler::fit(&closes)?;
        let (network, report) = LstmNetwork::fit(&scaler.transform_all(&closes), self.lookback, &self.params)?;
        debug!(
            %symbol,
            samples = report.samples,
            final_loss = report.epoch_losses.last().copied(),
            "sequence model fitted"
        );

        // scaler first; the model's presence marks the pair as trained
        registry.store(&StoredArtifact::new(
            symbol.clone(),
            ArtifactKind::SequenceScaler,
            scaler,
        ))?;
        let path = registry.store(&StoredArtifact::new(
            symbol.clone(),
            ArtifactKind::SequenceModel,
            network,
        ))?;
        Ok(Trained {
            path,
            holdout: None,
        })
    }
}
