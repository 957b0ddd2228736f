//! Rolling technical indicators over one symbol's price history.
//!
//! Windows: SMA 20 and 50 of close, day-over-day return, 20-day sample
//! standard deviation of returns, 14-day RSI from simple averages of gains and
//! losses. A row is emitted only when every window is full, so the first
//! `SMA_LONG - 1` rows of each series never appear in the output.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use market_data::{
    DataError, PriceSeries, PriceTable, Symbol,
    io::sink::{CsvFileSink, DataSink},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const SMA_SHORT: usize = 20;
pub const SMA_LONG: usize = 50;
pub const VOLATILITY_WINDOW: usize = 20;
pub const RSI_PERIOD: usize = 14;

/// RSI reported when a window has neither gains nor losses.
pub const RSI_NEUTRAL: f64 = 50.0;

/// A price row augmented with its technical features.
///
/// Field names serialize to the column names of the technical-feature table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume")]
    pub volume: f64,
    #[serde(rename = "Stock")]
    pub stock: Symbol,
    #[serde(rename = "SMA_20")]
    pub sma_20: f64,
    #[serde(rename = "SMA_50")]
    pub sma_50: f64,
    #[serde(rename = "Returns")]
    pub returns: f64,
    #[serde(rename = "Volatility_20")]
    pub volatility_20: f64,
    #[serde(rename = "RSI_14")]
    pub rsi_14: f64,
}

impl IndicatorRow {
    /// Model input order used by the tree ensemble.
    pub fn features(&self) -> [f64; 5] {
        [
            self.sma_20,
            self.sma_50,
            self.rsi_14,
            self.volatility_20,
            self.returns,
        ]
    }
}

/// Computes indicators for one series. Pure; emits no NaN or infinite values.
pub fn compute_indicators(series: &PriceSeries) -> Vec<IndicatorRow> {
    let bars = series.bars();
    let closes = series.closes();
    let n = closes.len();

    let mut returns = vec![f64::NAN; n];
    for i in 1..n {
        returns[i] = closes[i] / closes[i - 1] - 1.0;
    }

    let first = (SMA_LONG - 1).max(VOLATILITY_WINDOW).max(RSI_PERIOD);
    let mut rows = Vec::with_capacity(n.saturating_sub(first));

    for i in first..n {
        let row = IndicatorRow {
            date: bars[i].date,
            open: bars[i].open,
            high: bars[i].high,
            low: bars[i].low,
            close: bars[i].close,
            volume: bars[i].volume,
            stock: series.symbol().clone(),
            sma_20: mean(&closes[i + 1 - SMA_SHORT..=i]),
            sma_50: mean(&closes[i + 1 - SMA_LONG..=i]),
            returns: returns[i],
            volatility_20: sample_std(&returns[i + 1 - VOLATILITY_WINDOW..=i]),
            rsi_14: rsi(&closes[i - RSI_PERIOD..=i]),
        };
        if row.features().iter().all(|v| v.is_finite()) {
            rows.push(row);
        }
    }

    debug!(symbol = %series.symbol(), input = n, output = rows.len(), "computed indicators");
    rows
}

/// Indicators for every symbol, ordered by symbol then date.
pub fn compute_all(table: &PriceTable) -> Vec<IndicatorRow> {
    table.iter().flat_map(compute_indicators).collect()
}

/// Persists the technical-feature table (atomic replace).
pub fn write_technical_table(
    path: impl Into<PathBuf>,
    rows: &[IndicatorRow],
) -> Result<usize, DataError> {
    Ok(CsvFileSink::new(path).write(rows)?)
}

/// Reads a technical-feature table written by [`write_technical_table`].
pub fn read_technical_table(path: &Path) -> Result<Vec<IndicatorRow>, DataError> {
    let csv_err = |source| DataError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
    let rows = reader
        .deserialize()
        .collect::<Result<Vec<IndicatorRow>, _>>()
        .map_err(csv_err)?;
    debug!(path = %path.display(), rows = rows.len(), "read technical table");
    Ok(rows)
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Sample (n − 1) standard deviation.
fn sample_std(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return f64::NAN;
    }
    let m = mean(xs);
    let ss: f64 = xs.iter().map(|x| (x - m).powi(2)).sum();
    (ss / (xs.len() - 1) as f64).sqrt()
}

/// RSI over `closes.len() - 1` deltas.
///
/// No losses and no gains is neutral (50); no losses with gains is 100.
pub fn rsi(closes: &[f64]) -> f64 {
    let deltas = closes.windows(2).map(|w| w[1] - w[0]);
    let (gain, loss) = deltas.fold((0.0, 0.0), |(g, l), d| {
        if d > 0.0 { (g + d, l) } else { (g, l - d) }
    });
    let periods = closes.len().saturating_sub(1).max(1) as f64;
    let (avg_gain, avg_loss) = (gain / periods, loss / periods);

    if avg_loss == 0.0 {
        if avg_gain == 0.0 { RSI_NEUTRAL } else { 100.0 }
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_data::PriceBar;
    use proptest::prelude::*;

    fn series(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let dates = market_data::calendar::business_days_after(start, closes.len());
        let bars = dates
            .into_iter()
            .zip(closes)
            .map(|(date, &c)| PriceBar {
                date,
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 100.0,
            })
            .collect();
        PriceSeries::new(Symbol::new("TEST.NS"), bars).unwrap()
    }

    #[test]
    fn drops_warmup_rows() {
        let closes: Vec<f64> = (1..=60).map(f64::from).collect();
        let rows = compute_indicators(&series(&closes));
        assert_eq!(rows.len(), 11);
        assert_eq!(rows[0].close, 50.0);
        assert!((rows[0].sma_20 - 40.5).abs() < 1e-12);
        assert!((rows[0].sma_50 - 25.5).abs() < 1e-12);
        assert!((rows[0].returns - (50.0 / 49.0 - 1.0)).abs() < 1e-12);
        assert_eq!(rows[0].rsi_14, 100.0);
    }

    #[test]
    fn short_series_yields_nothing() {
        assert!(compute_indicators(&series(&[10.0; 49])).is_empty());
    }

    #[test]
    fn constant_price_gives_neutral_rsi() {
        let rows = compute_indicators(&series(&[100.0; 80]));
        assert_eq!(rows.len(), 31);
        for r in rows {
            assert_eq!(r.rsi_14, RSI_NEUTRAL);
            assert_eq!(r.returns, 0.0);
            assert_eq!(r.volatility_20, 0.0);
        }
    }

    #[test]
    fn rsi_matches_hand_computation() {
        // deltas: +2, -1 repeated → avg gain 14/14=1.0, avg loss 7/14=0.5
        let mut closes = vec![10.0];
        for i in 0..14 {
            let last = *closes.last().unwrap();
            closes.push(if i % 2 == 0 { last + 2.0 } else { last - 1.0 });
        }
        let v = rsi(&closes);
        assert!((v - (100.0 - 100.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn technical_table_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("technical.csv");
        let closes: Vec<f64> = (0..70).map(|i| 100.0 + (i as f64 * 0.3).sin()).collect();
        let rows = compute_indicators(&series(&closes));
        assert_eq!(write_technical_table(&path, &rows).unwrap(), rows.len());

        let header = std::fs::read_to_string(&path).unwrap();
        assert!(header.starts_with(
            "Date,Open,High,Low,Close,Volume,Stock,SMA_20,SMA_50,Returns,Volatility_20,RSI_14"
        ));
        let back = read_technical_table(&path).unwrap();
        assert_eq!(back.len(), rows.len());
        assert_eq!(back[0].date, rows[0].date);
        assert_eq!(back[0].stock, rows[0].stock);
    }

    proptest! {
        #[test]
        fn rows_are_always_defined_and_bounded(
            closes in prop::collection::vec(1.0f64..5_000.0, 50..200)
        ) {
            let rows = compute_indicators(&series(&closes));
            prop_assert_eq!(rows.len(), closes.len() - 49);
            for r in &rows {
                prop_assert!(r.features().iter().all(|v| v.is_finite()));
                prop_assert!((0.0..=100.0).contains(&r.rsi_14));
                prop_assert!(r.volatility_20 >= 0.0);
            }
        }
    }
}
