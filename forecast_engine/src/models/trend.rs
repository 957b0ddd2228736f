//! Piecewise-linear trend with yearly Fourier seasonality.
//!
//! `y(t) = trend(t) · (1 + s(t))` in multiplicative mode, `trend(t) + s(t)` in
//! additive mode, where
//! - `trend(t) = m + k·t + Σⱼ δⱼ·(t − sⱼ)₊` with changepoints `sⱼ` spread over
//!   the first `changepoint_range` of history,
//! - `s(t) = Σₙ aₙ sin(2πn·d/365.25) + bₙ cos(2πn·d/365.25)` on the day number `d`.
//!
//! Fitting is MAP estimation under Gaussian priors on `δ` and on the Fourier
//! coefficients, i.e. penalized least squares; multiplicative mode alternates
//! between the trend and the seasonal factor. Intervals combine the residual
//! noise with the variance of changepoints that may occur after the history
//! ends, at the historical rate and magnitude.

use std::f64::consts::PI;

use chrono::{Datelike, NaiveDate};
use market_data::calendar;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    ModelError, TrendForecaster, TrendPoint, ensure_finite,
    linalg::{dot, least_squares, penalized_least_squares},
};

const YEAR_DAYS: f64 = 365.25;
const MULTIPLICATIVE_ROUNDS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonalityMode {
    Additive,
    #[default]
    Multiplicative,
}

/// Hyperparameters for [`TrendModel::fit`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendParams {
    pub n_changepoints: usize,
    pub changepoint_range: f64,
    pub changepoint_prior_scale: f64,
    pub seasonality_prior_scale: f64,
    pub yearly_order: usize,
    pub mode: SeasonalityMode,
    pub interval_width: f64,
}

impl Default for TrendParams {
    fn default() -> Self {
        Self {
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            yearly_order: 10,
            mode: SeasonalityMode::Multiplicative,
            interval_width: 0.8,
        }
    }
}

impl TrendParams {
    fn validate(&self) -> Result<(), ModelError> {
        let check = |ok: bool, name: &'static str, reason: &str| {
            if ok {
                Ok(())
            } else {
                Err(ModelError::InvalidParameter {
                    name,
                    reason: reason.to_string(),
                })
            }
        };
        check(
            self.changepoint_range > 0.0 && self.changepoint_range <= 1.0,
            "changepoint_range",
            "must be in (0, 1]",
        )?;
        check(self.changepoint_prior_scale > 0.0, "changepoint_prior_scale", "must be positive")?;
        check(self.seasonality_prior_scale > 0.0, "seasonality_prior_scale", "must be positive")?;
        check(
            self.interval_width > 0.0 && self.interval_width < 1.0,
            "interval_width",
            "must be in (0, 1)",
        )
    }
}

/// Fitted state. Serialized as the `trend_model` artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendModel {
    mode: SeasonalityMode,
    history: Vec<NaiveDate>,
    t0: f64,
    span: f64,
    y_scale: f64,
    changepoints: Vec<f64>,
    /// `[m, k, δ₁ … δ_K]`
    trend_coef: Vec<f64>,
    yearly_order: usize,
    seasonal_coef: Vec<f64>,
    sigma: f64,
    delta_scale: f64,
    interval_width: f64,
}

fn day_number(d: NaiveDate) -> f64 {
    f64::from(d.num_days_from_ce())
}

fn fourier_row(day: f64, order: usize) -> Vec<f64> {
    let mut row = Vec::with_capacity(2 * order);
    for n in 1..=order {
        let a = 2.0 * PI * n as f64 * day / YEAR_DAYS;
        row.push(a.sin());
        row.push(a.cos());
    }
    row
}

fn trend_row(t: f64, changepoints: &[f64]) -> Vec<f64> {
    let mut row = Vec::with_capacity(2 + changepoints.len());
    row.push(1.0);
    row.push(t);
    row.extend(changepoints.iter().map(|&s| (t - s).max(0.0)));
    row
}

/// Two-sided normal quantile for common interval widths.
fn z_score(width: f64) -> f64 {
    match width {
        x if x >= 0.99 => 2.576,
        x if x >= 0.95 => 1.960,
        x if x >= 0.90 => 1.645,
        x if x >= 0.80 => 1.282,
        x if x >= 0.70 => 1.036,
        x if x >= 0.60 => 0.842,
        x if x >= 0.50 => 0.674,
        _ => 0.253,
    }
}

impl TrendModel {
    pub fn fit(dates: &[NaiveDate], y: &[f64], params: &TrendParams) -> Result<Self, ModelError> {
        params.validate()?;
        if dates.len() != y.len() {
            return Err(ModelError::ShapeMismatch {
                expected: dates.len(),
                actual: y.len(),
            });
        }
        let n = y.len();
        if n < 3 {
            return Err(ModelError::InsufficientData {
                required: 3,
                actual: n,
            });
        }
        ensure_finite(y, "trend target")?;
        if dates.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ModelError::InvalidData(
                "dates must be strictly increasing".into(),
            ));
        }

        let t0 = day_number(dates[0]);
        let span = day_number(dates[n - 1]) - t0;
        let y_scale = y.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
        if y_scale == 0.0 {
            return Err(ModelError::InvalidData("target is identically zero".into()));
        }
        let t: Vec<f64> = dates.iter().map(|d| (day_number(*d) - t0) / span).collect();
        let ys: Vec<f64> = y.iter().map(|v| v / y_scale).collect();

        let hist = ((n as f64) * params.changepoint_range).floor() as usize;
        let k = params.n_changepoints.min(hist.saturating_sub(1));
        let changepoints: Vec<f64> = (1..=k)
            .map(|j| {
                let idx = (j as f64 * (hist - 1) as f64 / k as f64).round() as usize;
                t[idx]
            })
            .collect();

        // noise scale from a plain line, used to turn prior scales into penalties
        let line: Vec<Vec<f64>> = t.iter().map(|&ti| vec![1.0, ti]).collect();
        let line_fit = least_squares(&line, &ys)?;
        let noise_var = (line_fit.rss() / (n - 2).max(1) as f64).max(1e-12);

        let trend_design: Vec<Vec<f64>> = t.iter().map(|&ti| trend_row(ti, &changepoints)).collect();
        let season_design: Vec<Vec<f64>> = dates
            .iter()
            .map(|d| fourier_row(day_number(*d), params.yearly_order))
            .collect();
        let trend_pen: Vec<f64> = [1e-9, 1e-9]
            .into_iter()
            .chain(std::iter::repeat_n(
                noise_var / params.changepoint_prior_scale.powi(2),
                changepoints.len(),
            ))
            .collect();
        let season_pen = |var: f64| vec![var / params.seasonality_prior_scale.powi(2); 2 * params.yearly_order];

        let (trend_coef, seasonal_coef) = match params.mode {
            SeasonalityMode::Additive => {
                let design: Vec<Vec<f64>> = trend_design
                    .iter()
                    .zip(&season_design)
                    .map(|(a, b)| a.iter().chain(b).copied().collect())
                    .collect();
                let penalties: Vec<f64> = trend_pen.iter().copied().chain(season_pen(noise_var)).collect();
                let fit = penalized_least_squares(&design, &ys, &penalties)?;
                let (tc, sc) = fit.coefficients.split_at(trend_pen.len());
                (tc.to_vec(), sc.to_vec())
            }
            SeasonalityMode::Multiplicative => {
                let mut trend_coef = penalized_least_squares(&trend_design, &ys, &trend_pen)?.coefficients;
                let mut seasonal_coef = vec![0.0; 2 * params.yearly_order];
                for _ in 0..MULTIPLICATIVE_ROUNDS {
                    let (rows, rel): (Vec<Vec<f64>>, Vec<f64>) = trend_design
                        .iter()
                        .zip(&season_design)
                        .zip(&ys)
                        .filter_map(|((tr, sr), &yv)| {
                            let level = dot(tr, &trend_coef);
                            (level.abs() > 1e-9).then(|| (sr.clone(), yv / level - 1.0))
                        })
                        .unzip();
                    if rows.len() > seasonal_coef.len() && !seasonal_coef.is_empty() {
                        let rel_var = rel.iter().map(|r| r * r).sum::<f64>() / rel.len() as f64;
                        seasonal_coef =
                            penalized_least_squares(&rows, &rel, &season_pen(rel_var.max(1e-12)))?.coefficients;
                    }
                    let deseasoned: Vec<f64> = season_design
                        .iter()
                        .zip(&ys)
                        .map(|(sr, &yv)| yv / (1.0 + dot(sr, &seasonal_coef)).max(1e-6))
                        .collect();
                    trend_coef = penalized_least_squares(&trend_design, &deseasoned, &trend_pen)?.coefficients;
                }
                (trend_coef, seasonal_coef)
            }
        };

        let delta_scale = if changepoints.is_empty() {
            0.0
        } else {
            trend_coef[2..].iter().map(|d| d.abs()).sum::<f64>() / changepoints.len() as f64
        };

        let mut model = Self {
            mode: params.mode,
            history: dates.to_vec(),
            t0,
            span,
            y_scale,
            changepoints,
            trend_coef,
            yearly_order: params.yearly_order,
            seasonal_coef,
            sigma: 0.0,
            delta_scale,
            interval_width: params.interval_width,
        };

        let resid_ss: f64 = t
            .iter()
            .zip(dates)
            .zip(&ys)
            .map(|((&ti, d), &yv)| (yv - model.scaled_mean(ti, day_number(*d))).powi(2))
            .sum();
        model.sigma = (resid_ss / (n - 1) as f64).sqrt();
        if !model.sigma.is_finite() {
            return Err(ModelError::Numerical("trend fit produced non-finite residuals".into()));
        }

        debug!(
            rows = n,
            changepoints = model.changepoints.len(),
            sigma = model.sigma * y_scale,
            "fitted trend model"
        );
        Ok(model)
    }

    fn scaled_parts(&self, t: f64, day: f64) -> (f64, f64) {
        let trend = dot(&trend_row(t, &self.changepoints), &self.trend_coef);
        let seasonal = dot(&fourier_row(day, self.yearly_order), &self.seasonal_coef);
        (trend, seasonal)
    }

    fn scaled_mean(&self, t: f64, day: f64) -> f64 {
        let (trend, seasonal) = self.scaled_parts(t, day);
        match self.mode {
            SeasonalityMode::Additive => trend + seasonal,
            SeasonalityMode::Multiplicative => trend * (1.0 + seasonal),
        }
    }

    pub fn mode(&self) -> SeasonalityMode {
        self.mode
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Checks that the coefficient vectors match the fitted structure and
    /// that there is a training history to extend.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.history.is_empty() {
            return Err(ModelError::InvalidData("trend model has no training history".into()));
        }
        if !(self.span > 0.0 && self.span.is_finite()) {
            return Err(ModelError::InvalidData(format!(
                "trend model span must be positive, got {}",
                self.span
            )));
        }
        if self.trend_coef.len() != self.changepoints.len() + 2 {
            return Err(ModelError::InvalidData(format!(
                "trend model has {} trend coefficients for {} changepoints",
                self.trend_coef.len(),
                self.changepoints.len()
            )));
        }
        if self.seasonal_coef.len() != 2 * self.yearly_order {
            return Err(ModelError::InvalidData(format!(
                "trend model has {} seasonal coefficients for yearly order {}",
                self.seasonal_coef.len(),
                self.yearly_order
            )));
        }
        Ok(())
    }
}

impl TrendForecaster for TrendModel {
    fn future_frame(&self, periods: usize) -> Vec<NaiveDate> {
        let mut frame = self.history.clone();
        if let Some(&last) = self.history.last() {
            frame.extend(calendar::business_days_after(last, periods));
        }
        frame
    }

    fn predict(&self, dates: &[NaiveDate]) -> Result<Vec<TrendPoint>, ModelError> {
        self.validate()?;
        let z = z_score(self.interval_width);
        let rate = self.changepoints.len() as f64;
        dates
            .iter()
            .map(|&date| {
                let day = day_number(date);
                let t = (day - self.t0) / self.span;
                let (_, seasonal) = self.scaled_parts(t, day);
                let mean = self.scaled_mean(t, day);

                let h = (t - 1.0).max(0.0);
                let trend_sd = (2.0 * rate * self.delta_scale.powi(2) * h.powi(3) / 3.0).sqrt();
                let trend_sd = match self.mode {
                    SeasonalityMode::Additive => trend_sd,
                    SeasonalityMode::Multiplicative => trend_sd * (1.0 + seasonal).abs(),
                };
                let sd = (self.sigma.powi(2) + trend_sd.powi(2)).sqrt();

                let point = TrendPoint {
                    date,
                    yhat: mean * self.y_scale,
                    lower: (mean - z * sd) * self.y_scale,
                    upper: (mean + z * sd) * self.y_scale,
                };
                if point.yhat.is_finite() && point.lower.is_finite() && point.upper.is_finite() {
                    Ok(point)
                } else {
                    Err(ModelError::Numerical(format!("non-finite prediction for {date}")))
                }
            })
            .collect()
    }

    fn last_training_date(&self) -> NaiveDate {
        self.history.last().copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seasonal_history(years: usize) -> (Vec<NaiveDate>, Vec<f64>) {
        let start = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
        let dates = calendar::business_days_after(start, years * 261);
        let y = dates
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let season = 0.05 * (2.0 * PI * day_number(*d) / YEAR_DAYS).sin();
                (200.0 + 0.1 * i as f64) * (1.0 + season)
            })
            .collect();
        (dates, y)
    }

    #[test]
    fn fits_trend_and_season() {
        let (dates, y) = seasonal_history(4);
        let model = TrendModel::fit(&dates, &y, &TrendParams::default()).unwrap();
        let fitted = model.predict(&dates).unwrap();
        let mape = fitted
            .iter()
            .zip(&y)
            .map(|(p, a)| ((p.yhat - a) / a).abs())
            .sum::<f64>()
            / y.len() as f64;
        assert!(mape < 0.02, "in-sample MAPE too high: {mape}");
    }

    #[test]
    fn future_frame_extends_by_business_days() {
        let (dates, y) = seasonal_history(2);
        let model = TrendModel::fit(&dates, &y, &TrendParams::default()).unwrap();
        let frame = model.future_frame(10);
        assert_eq!(frame.len(), dates.len() + 10);
        let tail = &frame[dates.len()..];
        assert!(tail.iter().all(|d| *d > model.last_training_date()));
        assert!(tail.iter().all(|d| calendar::is_business_day(*d)));
    }

    #[test]
    fn intervals_contain_mean_and_widen() {
        let (dates, y) = seasonal_history(3);
        for mode in [SeasonalityMode::Additive, SeasonalityMode::Multiplicative] {
            let params = TrendParams { mode, ..TrendParams::default() };
            let model = TrendModel::fit(&dates, &y, &params).unwrap();
            let frame = model.future_frame(700);
            let pts = model.predict(&frame[dates.len()..]).unwrap();
            assert!(pts.iter().all(|p| p.lower <= p.yhat && p.yhat <= p.upper));
            let first = pts[0].upper - pts[0].lower;
            let last = pts[pts.len() - 1].upper - pts[pts.len() - 1].lower;
            assert!(last >= first);
        }
    }

    #[test]
    fn prediction_is_deterministic_after_round_trip() {
        let (dates, y) = seasonal_history(2);
        let model = TrendModel::fit(&dates, &y, &TrendParams::default()).unwrap();
        let json = serde_json::to_string(&model).unwrap();
        let back: TrendModel = serde_json::from_str(&json).unwrap();
        let frame = model.future_frame(20);
        assert_eq!(model.predict(&frame).unwrap(), back.predict(&frame).unwrap());
    }

    #[test]
    fn rejects_bad_input() {
        let d = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert!(matches!(
            TrendModel::fit(&[d, d], &[1.0, 2.0], &TrendParams::default()),
            Err(ModelError::InsufficientData { .. })
        ));
        let bad = TrendParams { interval_width: 1.5, ..TrendParams::default() };
        assert!(matches!(
            TrendModel::fit(&[d], &[1.0], &bad),
            Err(ModelError::InvalidParameter { name: "interval_width", .. })
        ));
    }

    #[test]
    fn inconsistent_state_is_rejected() {
        let (dates, y) = seasonal_history(2);
        let model = TrendModel::fit(&dates, &y, &TrendParams::default()).unwrap();
        assert!(model.validate().is_ok());

        let mut no_history = model.clone();
        no_history.history.clear();
        assert!(no_history.future_frame(5).is_empty());
        assert!(matches!(no_history.predict(&[]), Err(ModelError::InvalidData(_))));

        let mut bad_trend = model.clone();
        bad_trend.trend_coef.pop();
        assert!(matches!(bad_trend.predict(&dates[..3]), Err(ModelError::InvalidData(_))));

        let mut bad_season = model.clone();
        bad_season.seasonal_coef.push(0.0);
        assert!(matches!(bad_season.validate(), Err(ModelError::InvalidData(_))));

        let mut flat_span = model;
        flat_span.span = 0.0;
        assert!(matches!(flat_span.validate(), Err(ModelError::InvalidData(_))));
    }
}
