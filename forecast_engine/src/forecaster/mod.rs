//! The two forecasting paths.
//!
//! Both return [`ForecastPoint`]s dated strictly after the data they were
//! fed. The short path never carries bounds; the long path carries the trend
//! model's interval when asked to.

use chrono::NaiveDate;
use serde::Serialize;

pub mod long;
pub mod short;

pub use long::predict_long;
pub use short::{autoregressive_rollout, predict_short};

/// One forecast row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<f64>,
}

impl ForecastPoint {
    pub fn point(date: NaiveDate, predicted_price: f64) -> Self {
        Self {
            date,
            predicted_price,
            lower_bound: None,
            upper_bound: None,
        }
    }

    pub fn bounded(date: NaiveDate, predicted_price: f64, lower: f64, upper: f64) -> Self {
        Self {
            date,
            predicted_price,
            lower_bound: Some(lower),
            upper_bound: Some(upper),
        }
    }
}
