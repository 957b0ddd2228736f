//! Short-horizon path: a recurrent sequence model rolled forward one
//! business day at a time.

use market_data::{PriceSeries, calendar};
use tracing::{debug, instrument};

use super::ForecastPoint;
use crate::{
    error::ForecastError,
    models::{ModelError, SequenceModel, lstm::LstmNetwork, scaler::MinMaxScaler},
    registry::{ArtifactKind, ModelRegistry},
};

/// Predicts `steps` values after `window`, feeding each prediction back in
/// as the newest input. Works in whatever space the model was trained in.
///
/// `window` must hold at least `model.lookback()` values; only the trailing
/// `lookback` are used.
pub fn autoregressive_rollout<M: SequenceModel + ?Sized>(
    model: &M,
    window: &[f64],
    steps: usize,
) -> Result<Vec<f64>, ModelError> {
    let lookback = model.lookback();
    if window.len() < lookback {
        return Err(ModelError::InsufficientData {
            required: lookback,
            actual: window.len(),
        });
    }
    let mut buf: Vec<f64> = window[window.len() - lookback..].to_vec();
    buf.reserve(steps);
    let mut out = Vec::with_capacity(steps);
    for _ in 0..steps {
        let next = model.predict_next(&buf[buf.len() - lookback..])?;
        buf.push(next);
        out.push(next);
    }
    Ok(out)
}

/// Forecasts the next `horizon_days` business-day closes of `series`.
///
/// Artifacts are resolved before history is checked, so an untrained symbol
/// reports [`ForecastError::ArtifactNotFound`] regardless of its history.
#[instrument(skip_all, fields(symbol = %series.symbol(), horizon_days = horizon_days))]
pub fn predict_short(
    registry: &ModelRegistry,
    series: &PriceSeries,
    horizon_days: usize,
) -> Result<Vec<ForecastPoint>, ForecastError> {
    let symbol = series.symbol();
    if horizon_days == 0 {
        return Err(ForecastError::InvalidRange(
            "short horizon must be at least 1 day".into(),
        ));
    }

    let model = registry
        .load::<LstmNetwork>(symbol, ArtifactKind::SequenceModel)?
        .model;
    model
        .validate()
        .map_err(|e| ForecastError::upstream(symbol, e))?;
    let scaler = registry
        .load::<MinMaxScaler>(symbol, ArtifactKind::SequenceScaler)?
        .model;

    let lookback = model.lookback();
    if series.len() < lookback {
        return Err(ForecastError::InsufficientHistory {
            symbol: symbol.clone(),
            required: lookback,
            available: series.len(),
        });
    }
    let last_date = series
        .last_date()
        .ok_or_else(|| ForecastError::InsufficientHistory {
            symbol: symbol.clone(),
            required: lookback,
            available: 0,
        })?;

    let closes = series.closes();
    let window = scaler.transform_all(&closes[closes.len() - lookback..]);
    let scaled = autoregressive_rollout(&model, &window, horizon_days)
        .map_err(|e| ForecastError::upstream(symbol, e))?;
    let prices = scaler.inverse_all(&scaled);

    let dates = calendar::business_days_after(last_date, horizon_days);
    debug!(from = %last_date, steps = prices.len(), "short-horizon rollout done");
    Ok(dates
        .into_iter()
        .zip(prices)
        .map(|(date, price)| ForecastPoint::point(date, price))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Predicts the window mean plus one; easy to roll out by hand.
    struct MeanPlusOne(usize);

    impl SequenceModel for MeanPlusOne {
        fn lookback(&self) -> usize {
            self.0
        }

        fn predict_next(&self, window: &[f64]) -> Result<f64, ModelError> {
            if window.len() != self.0 {
                return Err(ModelError::ShapeMismatch {
                    expected: self.0,
                    actual: window.len(),
                });
            }
            Ok(window.iter().sum::<f64>() / window.len() as f64 + 1.0)
        }
    }

    #[test]
    fn rollout_feeds_predictions_back() {
        let out = autoregressive_rollout(&MeanPlusOne(2), &[9.0, 0.0, 2.0], 3).unwrap();
        // windows: [0,2] -> 2, [2,2] -> 3, [2,3] -> 3.5
        assert_eq!(out, vec![2.0, 3.0, 3.5]);
    }

    #[test]
    fn rollout_rejects_short_window() {
        let err = autoregressive_rollout(&MeanPlusOne(5), &[1.0, 2.0], 1).unwrap_err();
        assert_eq!(
            err,
            ModelError::InsufficientData {
                required: 5,
                actual: 2
            }
        );
    }

    #[test]
    fn zero_steps_is_empty() {
        assert!(autoregressive_rollout(&MeanPlusOne(1), &[1.0], 0).unwrap().is_empty());
    }
}
