//! Failure taxonomy shared by every forecasting component.

use std::path::PathBuf;

use market_data::Symbol;
use thiserror::Error;

use crate::registry::{ArtifactKind, RegistryError};

/// Boxed cause carried by [`ForecastError::UpstreamModelFailure`].
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Typed failures raised by indicators, forecasters and the registry.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// No trained artifact of `kind` exists for `symbol`.
    #[error("no trained {kind} for {symbol} (expected at {})", path.display())]
    ArtifactNotFound {
        symbol: Symbol,
        kind: ArtifactKind,
        path: PathBuf,
    },

    /// Fewer data points than the model's minimum window.
    #[error("insufficient history for {symbol}: need {required} points, have {available}")]
    InsufficientHistory {
        symbol: Symbol,
        required: usize,
        available: usize,
    },

    /// Caller-supplied horizon or date range is out of bounds, or a range
    /// filter matched nothing.
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// A model failed to load, fit or predict.
    #[error("model failure for {symbol}: {source}")]
    UpstreamModelFailure {
        symbol: Symbol,
        #[source]
        source: BoxedCause,
    },
}

impl ForecastError {
    /// Wraps any model-side error as [`ForecastError::UpstreamModelFailure`].
    pub fn upstream(symbol: &Symbol, source: impl Into<BoxedCause>) -> Self {
        Self::UpstreamModelFailure {
            symbol: symbol.clone(),
            source: source.into(),
        }
    }
}

impl From<RegistryError> for ForecastError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound { symbol, kind, path } => {
                Self::ArtifactNotFound { symbol, kind, path }
            }
            other => {
                let symbol = other.symbol().clone();
                Self::UpstreamModelFailure {
                    symbol,
                    source: Box::new(other),
                }
            }
        }
    }
}

/// The single user-facing failure returned by the orchestrator.
///
/// The typed cause stays attached so callers can still tell an untrained
/// symbol from a bad horizon.
#[derive(Debug, Error)]
#[error("prediction failed for {symbol}: {cause}")]
pub struct PredictionFailed {
    pub symbol: Symbol,
    #[source]
    pub cause: ForecastError,
}

impl PredictionFailed {
    pub fn cause(&self) -> &ForecastError {
        &self.cause
    }
}
