//! Per-symbol forecasting for NIFTY-50 equities.
//!
//! Offline, [`indicators`] turns cleaned price history into a technical-feature
//! table and [`training`] fits one model per symbol and family into the
//! [`registry`]. At request time the [`orchestrator`] validates a
//! [`ForecastRequest`](orchestrator::ForecastRequest), routes it to the
//! [`forecaster::short`] (recurrent sequence model, autoregressive rollout) or
//! [`forecaster::long`] (trend + seasonality) path and returns one uniform
//! [`ForecastResult`](orchestrator::ForecastResult).

pub mod analysis;
pub mod comparison;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod forecaster;
pub mod indicators;
pub mod models;
pub mod orchestrator;
pub mod registry;
pub mod training;

pub use error::ForecastError;
