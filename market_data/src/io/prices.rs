//! Price-history CSV loading and cleaning.
//!
//! The input is one long table keyed by `(Stock, Date)` with `Open, High, Low,
//! Close, Volume` columns. Any other column (e.g. a leading unnamed index) is
//! ignored. Cleaning:
//! - numeric cells that do not parse are treated as missing, and rows with any
//!   missing OHLCV value or an unparseable date are dropped;
//! - rows are grouped per symbol and sorted by date;
//! - duplicate `(Stock, Date)` rows keep their first occurrence.
//!
//! Entrypoints: [`load_price_table`] and [`write_price_table`].

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    errors::DataError,
    io::sink::{CsvFileSink, DataSink},
    models::{bar::PriceBar, series::PriceSeries, series::PriceTable, symbol::Symbol},
};

const REQUIRED_COLUMNS: [&str; 7] = ["Date", "Open", "High", "Low", "Close", "Volume", "Stock"];

#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Stock")]
    stock: String,
    #[serde(rename = "Open", deserialize_with = "csv::invalid_option")]
    open: Option<f64>,
    #[serde(rename = "High", deserialize_with = "csv::invalid_option")]
    high: Option<f64>,
    #[serde(rename = "Low", deserialize_with = "csv::invalid_option")]
    low: Option<f64>,
    #[serde(rename = "Close", deserialize_with = "csv::invalid_option")]
    close: Option<f64>,
    #[serde(rename = "Volume", deserialize_with = "csv::invalid_option")]
    volume: Option<f64>,
}

/// A cleaned price row as written by [`write_price_table`].
#[derive(Debug, Clone, Serialize)]
pub struct PriceRow<'a> {
    /// Trading date.
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    /// Opening price.
    #[serde(rename = "Open")]
    pub open: f64,
    /// Session high.
    #[serde(rename = "High")]
    pub high: f64,
    /// Session low.
    #[serde(rename = "Low")]
    pub low: f64,
    /// Closing price.
    #[serde(rename = "Close")]
    pub close: f64,
    /// Shares traded.
    #[serde(rename = "Volume")]
    pub volume: f64,
    /// Ticker with market suffix.
    #[serde(rename = "Stock")]
    pub stock: &'a str,
}

/// Counters describing what cleaning did to the raw file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Data rows read from the file.
    pub rows_read: usize,
    /// Rows kept after cleaning.
    pub rows_kept: usize,
    /// Rows dropped for a missing or unparseable value.
    pub rows_incomplete: usize,
    /// Rows dropped as a repeated `(Stock, Date)` key.
    pub duplicates_dropped: usize,
    /// Distinct symbols kept.
    pub symbols: usize,
}

/// Reads, cleans and groups a price-history CSV.
pub fn load_price_table(path: &Path) -> Result<(PriceTable, LoadReport), DataError> {
    let csv_err = |source| DataError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let headers = rdr.headers().map_err(csv_err)?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(DataError::MissingColumn {
                path: path.to_path_buf(),
                column,
            });
        }
    }

    let mut report = LoadReport::default();
    let mut grouped: BTreeMap<Symbol, Vec<PriceBar>> = BTreeMap::new();

    for record in rdr.deserialize::<RawRow>() {
        report.rows_read += 1;
        let raw = record.map_err(csv_err)?;
        match clean_row(&raw) {
            Some((symbol, bar)) => grouped.entry(symbol).or_default().push(bar),
            None => report.rows_incomplete += 1,
        }
    }

    let mut table = PriceTable::new();
    for (symbol, mut bars) in grouped {
        // stable: first occurrence of a date wins
        bars.sort_by_key(|b| b.date);
        let before = bars.len();
        bars.dedup_by_key(|b| b.date);
        report.duplicates_dropped += before - bars.len();
        report.rows_kept += bars.len();
        table.insert(PriceSeries::new(symbol, bars)?);
    }
    report.symbols = table.len();

    if report.rows_incomplete > 0 || report.duplicates_dropped > 0 {
        warn!(
            incomplete = report.rows_incomplete,
            duplicates = report.duplicates_dropped,
            "dropped rows while cleaning price history"
        );
    }
    info!(
        path = %path.display(),
        rows = report.rows_kept,
        symbols = report.symbols,
        "loaded price history"
    );
    Ok((table, report))
}

/// Writes every series of `table` as one long CSV, sorted by `(Stock, Date)`.
pub fn write_price_table(path: impl Into<PathBuf>, table: &PriceTable) -> Result<usize, DataError> {
    let rows: Vec<PriceRow<'_>> = table
        .iter()
        .flat_map(|s| {
            s.bars().iter().map(move |b| PriceRow {
                date: b.date,
                open: b.open,
                high: b.high,
                low: b.low,
                close: b.close,
                volume: b.volume,
                stock: s.symbol().as_str(),
            })
        })
        .collect();
    Ok(CsvFileSink::new(path).write(&rows)?)
}

fn clean_row(raw: &RawRow) -> Option<(Symbol, PriceBar)> {
    let symbol = Symbol::new(&raw.stock);
    if symbol.as_str().is_empty() {
        return None;
    }
    let date = parse_date(&raw.date)?;
    let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
    let bar = PriceBar {
        date,
        open: finite(raw.open)?,
        high: finite(raw.high)?,
        low: finite(raw.low)?,
        close: finite(raw.close)?,
        volume: finite(raw.volume)?,
    };
    Some((symbol, bar))
}

/// Accepts `YYYY-MM-DD` optionally followed by a time/offset tail
/// (`2020-01-01 00:00:00+05:30`).
fn parse_date(s: &str) -> Option<NaiveDate> {
    let day = s.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_date_with_time_tail() {
        assert_eq!(
            parse_date("2021-03-04 00:00:00+05:30"),
            NaiveDate::from_ymd_opt(2021, 3, 4)
        );
        assert_eq!(parse_date("2021-03-04"), NaiveDate::from_ymd_opt(2021, 3, 4));
        assert_eq!(parse_date("03/04/2021"), None);
        assert_eq!(parse_date("2021"), None);
    }
}
