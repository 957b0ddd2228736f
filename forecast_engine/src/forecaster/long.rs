//! Long-horizon path: trend + seasonality extrapolated over business days.

use market_data::Symbol;
use tracing::{debug, instrument};

use super::ForecastPoint;
use crate::{
    error::ForecastError,
    models::{ModelError, TrendForecaster, trend::TrendModel},
    registry::{ArtifactKind, ModelRegistry},
};

/// Business days per requested year.
pub const DAYS_PER_YEAR: usize = 365;

/// Extrapolates `model` for `periods` business days past its training data
/// and keeps only those future rows.
pub fn extrapolate<M: TrendForecaster + ?Sized>(
    model: &M,
    periods: usize,
    with_bounds: bool,
) -> Result<Vec<ForecastPoint>, ModelError> {
    let frame = model.future_frame(periods);
    let tail = &frame[frame.len().saturating_sub(periods)..];
    let points = model.predict(tail)?;
    Ok(points
        .into_iter()
        .map(|p| {
            if with_bounds {
                ForecastPoint::bounded(p.date, p.yhat, p.lower, p.upper)
            } else {
                ForecastPoint::point(p.date, p.yhat)
            }
        })
        .collect())
}

/// Forecasts `horizon_years × 365` business days after the last date the
/// trend model was trained on.
#[instrument(skip_all, fields(symbol = %symbol, horizon_years = horizon_years))]
pub fn predict_long(
    registry: &ModelRegistry,
    symbol: &Symbol,
    horizon_years: usize,
    expose_bounds: bool,
) -> Result<Vec<ForecastPoint>, ForecastError> {
    if horizon_years == 0 {
        return Err(ForecastError::InvalidRange(
            "long horizon must be at least 1 year".into(),
        ));
    }
    let model = registry
        .load::<TrendModel>(symbol, ArtifactKind::TrendModel)?
        .model;
    model
        .validate()
        .map_err(|e| ForecastError::upstream(symbol, e))?;
    let periods = horizon_years * DAYS_PER_YEAR;
    let points =
        extrapolate(&model, periods, expose_bounds).map_err(|e| ForecastError::upstream(symbol, e))?;
    debug!(
        from = %model.last_training_date(),
        rows = points.len(),
        "long-horizon extrapolation done"
    );
    Ok(points)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use market_data::calendar;

    use super::*;
    use crate::models::TrendPoint;

    /// Flat 100 ± 5 over a three-day history ending on a Friday.
    struct Flat(Vec<NaiveDate>);

    impl TrendForecaster for Flat {
        fn future_frame(&self, periods: usize) -> Vec<NaiveDate> {
            let mut frame = self.0.clone();
            frame.extend(calendar::business_days_after(self.last_training_date(), periods));
            frame
        }

        fn predict(&self, dates: &[NaiveDate]) -> Result<Vec<TrendPoint>, ModelError> {
            Ok(dates
                .iter()
                .map(|&date| TrendPoint {
                    date,
                    yhat: 100.0,
                    lower: 95.0,
                    upper: 105.0,
                })
                .collect())
        }

        fn last_training_date(&self) -> NaiveDate {
            self.0[self.0.len() - 1]
        }
    }

    fn model() -> Flat {
        let d = |day| NaiveDate::from_ymd_opt(2024, 5, day).unwrap();
        Flat(vec![d(15), d(16), d(17)])
    }

    #[test]
    fn keeps_only_the_future_tail() {
        let points = extrapolate(&model(), 4, true).unwrap();
        let dates: Vec<_> = points.iter().map(|p| p.date.to_string()).collect();
        assert_eq!(dates, ["2024-05-20", "2024-05-21", "2024-05-22", "2024-05-23"]);
        assert!(points.iter().all(|p| p.lower_bound == Some(95.0) && p.upper_bound == Some(105.0)));
    }

    #[test]
    fn bounds_can_be_dropped() {
        let points = extrapolate(&model(), 2, false).unwrap();
        assert!(points.iter().all(|p| p.lower_bound.is_none() && p.upper_bound.is_none()));
    }
}
