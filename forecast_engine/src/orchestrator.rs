//! Request validation, dispatch and result normalization.

use std::fmt;

use market_data::{PriceSeries, PriceTable, Symbol};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{
    config::{ForecastConfig, LongHorizonCfg, ShortHorizonCfg},
    error::{ForecastError, PredictionFailed},
    forecaster::{ForecastPoint, predict_long, predict_short},
    registry::ModelRegistry,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastMode {
    /// Horizon in business days.
    Short,
    /// Horizon in years.
    Long,
}

impl fmt::Display for ForecastMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ForecastMode::Short => "short",
            ForecastMode::Long => "long",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastRequest {
    pub symbol: Symbol,
    pub mode: ForecastMode,
    /// Days for [`ForecastMode::Short`], years for [`ForecastMode::Long`].
    pub horizon: u32,
}

impl ForecastRequest {
    pub fn short(symbol: impl Into<Symbol>, days: u32) -> Self {
        Self {
            symbol: symbol.into(),
            mode: ForecastMode::Short,
            horizon: days,
        }
    }

    pub fn long(symbol: impl Into<Symbol>, years: u32) -> Self {
        Self {
            symbol: symbol.into(),
            mode: ForecastMode::Long,
            horizon: years,
        }
    }
}

/// The uniform response of both forecasting paths.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResult {
    pub symbol: Symbol,
    pub mode: ForecastMode,
    pub points: Vec<ForecastPoint>,
}

/// Routes forecast requests to the short- or long-horizon path.
///
/// Holds no mutable state; two calls with the same request against the same
/// artifacts and history return identical results.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    registry: ModelRegistry,
    history: PriceTable,
    short: ShortHorizonCfg,
    long: LongHorizonCfg,
}

impl Orchestrator {
    pub fn new(registry: ModelRegistry, history: PriceTable, config: &ForecastConfig) -> Self {
        Self {
            registry,
            history,
            short: config.short_horizon.clone(),
            long: config.long_horizon.clone(),
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn history(&self) -> &PriceTable {
        &self.history
    }

    /// Validates, dispatches once and wraps any failure as [`PredictionFailed`].
    pub fn forecast(&self, request: &ForecastRequest) -> Result<ForecastResult, PredictionFailed> {
        match self.run(request) {
            Ok(points) => {
                info!(
                    symbol = %request.symbol,
                    mode = %request.mode,
                    horizon = request.horizon,
                    rows = points.len(),
                    "forecast produced"
                );
                Ok(ForecastResult {
                    symbol: request.symbol.clone(),
                    mode: request.mode,
                    points,
                })
            }
            Err(cause) => {
                error!(
                    symbol = %request.symbol,
                    mode = %request.mode,
                    horizon = request.horizon,
                    error = %cause,
                    "prediction failed"
                );
                Err(PredictionFailed {
                    symbol: request.symbol.clone(),
                    cause,
                })
            }
        }
    }

    /// Checks the horizon against the configured bounds for its mode.
    pub fn validate(&self, request: &ForecastRequest) -> Result<(), ForecastError> {
        let (min, max, unit) = match request.mode {
            ForecastMode::Short => (self.short.min_days, self.short.max_days, "days"),
            ForecastMode::Long => (self.long.min_years, self.long.max_years, "years"),
        };
        if request.horizon < min || request.horizon > max {
            return Err(ForecastError::InvalidRange(format!(
                "{} horizon must be between {min} and {max} {unit}, got {}",
                request.mode, request.horizon
            )));
        }
        Ok(())
    }

    fn run(&self, request: &ForecastRequest) -> Result<Vec<ForecastPoint>, ForecastError> {
        self.validate(request)?;
        let horizon = request.horizon as usize;
        match request.mode {
            ForecastMode::Short => match self.history.get(&request.symbol) {
                Some(series) => predict_short(&self.registry, series, horizon),
                None => {
                    let empty = PriceSeries::empty(request.symbol.clone());
                    predict_short(&self.registry, &empty, horizon)
                }
            },
            ForecastMode::Long => predict_long(
                &self.registry,
                &request.symbol,
                horizon,
                self.long.expose_bounds,
            ),
        }
    }
}
