//! Model families and the narrow contracts the forecasters use them through.
//!
//! | family            | module     | used by                         |
//! |-------------------|------------|---------------------------------|
//! | recurrent (LSTM)  | [`lstm`]   | short-horizon forecaster        |
//! | trend+seasonality | [`trend`]  | long-horizon forecaster         |
//! | AR(p) with d      | [`arima`]  | training + holdout comparison   |
//! | random forest     | [`forest`] | training + holdout comparison   |

use chrono::NaiveDate;
use thiserror::Error;

pub mod arima;
pub mod forest;
pub mod linalg;
pub mod lstm;
pub mod scaler;
pub mod trend;

/// Errors raised while fitting or evaluating a model.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    /// Too few observations to fit.
    #[error("insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// Input contains NaN/infinite values or has inconsistent shape.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A hyperparameter is out of range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// A prediction input does not match what the model was trained on.
    #[error("input shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// The fit diverged or a linear system was singular.
    #[error("numerical failure: {0}")]
    Numerical(String),
}

/// A one-step-ahead model over a fixed window of scaled values.
pub trait SequenceModel {
    /// Number of trailing values consumed per prediction.
    fn lookback(&self) -> usize;

    /// Predicts the value immediately following `window`.
    ///
    /// `window.len()` must equal [`SequenceModel::lookback`].
    fn predict_next(&self, window: &[f64]) -> Result<f64, ModelError>;
}

/// One row of a trend-model prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub yhat: f64,
    pub lower: f64,
    pub upper: f64,
}

/// A fitted trend/seasonality model that extrapolates over a date frame.
pub trait TrendForecaster {
    /// The training dates followed by `periods` business days after the last one.
    fn future_frame(&self, periods: usize) -> Vec<NaiveDate>;

    /// Point forecast and interval for every date in `dates`.
    fn predict(&self, dates: &[NaiveDate]) -> Result<Vec<TrendPoint>, ModelError>;

    /// Last date seen during training.
    fn last_training_date(&self) -> NaiveDate;
}

pub(crate) fn ensure_finite(values: &[f64], what: &str) -> Result<(), ModelError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(i) => Err(ModelError::InvalidData(format!(
            "{what} contains a non-finite value at index {i}"
        ))),
        None => Ok(()),
    }
}
