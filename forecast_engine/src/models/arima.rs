//! ARIMA(p, d, 0): autoregression on the d-times differenced series.
//!
//! `d` is chosen with augmented Dickey-Fuller tests: difference until the
//! unit-root hypothesis is rejected at the 5% level, the series drops below
//! [`MIN_ADF_POINTS`], or `max_d` is reached. Coefficients are conditional
//! least squares; an intercept is estimated only when `d == 0`.

use serde::{Deserialize, Serialize};

use super::{
    ModelError, ensure_finite,
    linalg::{dot, least_squares},
};

/// Below this many points the ADF test is skipped and the series is treated
/// as stationary.
pub const MIN_ADF_POINTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArimaParams {
    pub p: usize,
    pub max_d: usize,
}

impl Default for ArimaParams {
    fn default() -> Self {
        Self { p: 5, max_d: 2 }
    }
}

/// Serialized as the `arima_model` artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArimaModel {
    p: usize,
    d: usize,
    intercept: f64,
    ar: Vec<f64>,
    sigma: f64,
    /// Last `p` values of the differenced series.
    recent: Vec<f64>,
    /// Last value of the series differenced `k` times, for `k` in `0..d`.
    level_tails: Vec<f64>,
}

pub fn difference(data: &[f64]) -> Vec<f64> {
    data.windows(2).map(|w| w[1] - w[0]).collect()
}

/// ADF t-statistic with an intercept and `lags` lagged differences
/// (Schwert's rule `⌊12·(n/100)^¼⌋` when `None`).
///
/// `None` when the regression is degenerate (too few rows, or a perfect fit).
pub fn adf_statistic(series: &[f64], lags: Option<usize>) -> Option<f64> {
    let n = series.len();
    let dy = difference(series);
    let mut k = lags.unwrap_or_else(|| (12.0 * (n as f64 / 100.0).powf(0.25)).floor() as usize);
    // keep enough rows for a meaningful regression
    while k > 0 && dy.len().saturating_sub(k) < 2 * (k + 2) + 1 {
        k -= 1;
    }

    let mut design = Vec::new();
    let mut target = Vec::new();
    for t in k..dy.len() {
        let mut row = Vec::with_capacity(k + 2);
        row.push(1.0);
        row.push(series[t]);
        row.extend((1..=k).map(|i| dy[t - i]));
        design.push(row);
        target.push(dy[t]);
    }
    let cols = k + 2;
    if design.len() <= cols + 1 {
        return None;
    }

    let fit = least_squares(&design, &target).ok()?;
    let s2 = fit.rss() / (design.len() - cols) as f64;
    let se = (s2 * fit.inverse_diagonal[1]).sqrt();
    if !(se.is_finite() && se > 1e-12) {
        return None;
    }
    Some(fit.coefficients[1] / se)
}

/// MacKinnon 5% critical value for the constant-only ADF regression.
pub fn adf_critical_value_5pct(n: usize) -> f64 {
    let n = n as f64;
    -2.86154 - 2.8903 / n - 4.234 / (n * n)
}

pub fn is_stationary(series: &[f64]) -> bool {
    if series.len() < MIN_ADF_POINTS {
        return true;
    }
    match adf_statistic(series, None) {
        Some(stat) => stat < adf_critical_value_5pct(series.len()),
        None => true,
    }
}

/// Number of differences needed before [`is_stationary`] holds, capped at `max_d`.
pub fn select_differencing(series: &[f64], max_d: usize) -> usize {
    let mut current = series.to_vec();
    let mut d = 0;
    while d < max_d && current.len() >= MIN_ADF_POINTS && !is_stationary(&current) {
        current = difference(&current);
        d += 1;
    }
    d
}

impl ArimaModel {
    pub fn fit(series: &[f64], p: usize, d: usize) -> Result<Self, ModelError> {
        ensure_finite(series, "arima input")?;
        let required = d + 2 * p + 3;
        if series.len() < required {
            return Err(ModelError::InsufficientData {
                required,
                actual: series.len(),
            });
        }

        let mut level_tails = Vec::with_capacity(d);
        let mut x = series.to_vec();
        for _ in 0..d {
            level_tails.push(x[x.len() - 1]);
            x = difference(&x);
        }

        let with_intercept = d == 0;
        let mut design = Vec::with_capacity(x.len() - p);
        let mut target = Vec::with_capacity(x.len() - p);
        for t in p..x.len() {
            let mut row = Vec::with_capacity(p + 1);
            if with_intercept {
                row.push(1.0);
            }
            row.extend((1..=p).map(|i| x[t - i]));
            design.push(row);
            target.push(x[t]);
        }

        let (intercept, ar, sigma) = if design.first().is_some_and(|r| !r.is_empty()) {
            let fit = least_squares(&design, &target)?;
            let sigma = (fit.rss() / design.len() as f64).sqrt();
            let (c, phi) = if with_intercept {
                (fit.coefficients[0], fit.coefficients[1..].to_vec())
            } else {
                (0.0, fit.coefficients)
            };
            (c, phi, sigma)
        } else {
            // ARIMA(0, d, 0) with d > 0: a pure random walk of order d
            let ss: f64 = target.iter().map(|v| v * v).sum();
            (0.0, Vec::new(), (ss / target.len().max(1) as f64).sqrt())
        };

        Ok(Self {
            p,
            d,
            intercept,
            ar,
            sigma,
            recent: x[x.len() - p..].to_vec(),
            level_tails,
        })
    }

    /// `(p, d, q)`
    pub fn order(&self) -> (usize, usize, usize) {
        (self.p, self.d, 0)
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Forecasts `steps` values past the end of the training series.
    pub fn forecast(&self, steps: usize) -> Vec<f64> {
        let mut history = self.recent.clone();
        let mut diffs = Vec::with_capacity(steps);
        for _ in 0..steps {
            let lagged: Vec<f64> = history.iter().rev().take(self.p).copied().collect();
            let next = self.intercept + dot(&self.ar, &lagged);
            history.push(next);
            diffs.push(next);
        }

        let mut out = diffs;
        for &tail in self.level_tails.iter().rev() {
            let mut acc = tail;
            out = out
                .into_iter()
                .map(|v| {
                    acc += v;
                    acc
                })
                .collect();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn noise(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| rng.random_range(-1.0..1.0)).collect()
    }

    #[test]
    fn white_noise_needs_no_differencing() {
        assert_eq!(select_differencing(&noise(400, 11), 2), 0);
    }

    #[test]
    fn trending_series_is_differenced_once() {
        let y: Vec<f64> = noise(400, 5)
            .into_iter()
            .enumerate()
            .map(|(i, e)| 100.0 + 0.5 * i as f64 + e)
            .collect();
        assert_eq!(select_differencing(&y, 2), 1);
    }

    #[test]
    fn short_series_is_left_alone() {
        assert!(is_stationary(&[1.0, 5.0, 2.0]));
        assert_eq!(select_differencing(&[1.0, 2.0, 3.0, 4.0], 2), 0);
    }

    #[test]
    fn integrated_forecast_continues_a_line() {
        let y: Vec<f64> = (0..100).map(|i| 10.0 + 2.0 * i as f64).collect();
        let model = ArimaModel::fit(&y, 2, 1).unwrap();
        let f = model.forecast(3);
        for (got, want) in f.iter().zip([210.0, 212.0, 214.0]) {
            assert!((got - want).abs() < 1e-3, "{got} vs {want}");
        }
        assert_eq!(model.order(), (2, 1, 0));
    }

    #[test]
    fn ar1_coefficient_is_recovered() {
        let e = noise(2000, 3);
        let mut y = vec![0.0];
        for i in 1..e.len() {
            y.push(0.6 * y[i - 1] + e[i]);
        }
        let model = ArimaModel::fit(&y, 1, 0).unwrap();
        assert!((model.ar[0] - 0.6).abs() < 0.05, "phi = {}", model.ar[0]);
        let f = model.forecast(50);
        // mean-reverting towards the intercept
        assert!(f[49].abs() < 0.5);
    }

    #[test]
    fn too_short_is_rejected() {
        assert_eq!(
            ArimaModel::fit(&[1.0, 2.0, 3.0], 5, 0).unwrap_err(),
            ModelError::InsufficientData { required: 13, actual: 3 }
        );
    }
}
