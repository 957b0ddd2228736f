//! Min-max feature scaler stored next to the sequence model.

use serde::{Deserialize, Serialize};

use super::{ModelError, ensure_finite};

/// Maps values linearly onto `[0, 1]` using the min and max seen at fit time.
///
/// Values outside the fitted range map outside `[0, 1]`; the forecaster relies
/// on that to extrapolate past the historical high.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    min: f64,
    max: f64,
}

impl MinMaxScaler {
    pub fn fit(data: &[f64]) -> Result<Self, ModelError> {
        if data.is_empty() {
            return Err(ModelError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }
        ensure_finite(data, "scaler input")?;
        let min = data.iter().copied().fold(f64::INFINITY, f64::min);
        let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Ok(Self { min, max })
    }

    /// A zero-width range scales by 1 so constant data maps to 0.
    fn range(&self) -> f64 {
        let r = self.max - self.min;
        if r.abs() < 1e-12 { 1.0 } else { r }
    }

    pub fn transform(&self, x: f64) -> f64 {
        (x - self.min) / self.range()
    }

    pub fn inverse(&self, x: f64) -> f64 {
        x * self.range() + self.min
    }

    pub fn transform_all(&self, data: &[f64]) -> Vec<f64> {
        data.iter().map(|&x| self.transform(x)).collect()
    }

    pub fn inverse_all(&self, data: &[f64]) -> Vec<f64> {
        data.iter().map(|&x| self.inverse(x)).collect()
    }
}
