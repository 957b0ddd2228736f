//! Canonical in-memory representation of one trading day (OHLCV).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single daily bar.
///
/// Dates are calendar dates in exchange-local time; intraday timestamps from
/// the raw download are truncated to the day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    /// Trading date.
    pub date: NaiveDate,

    /// Opening price.
    pub open: f64,

    /// Highest price during the session.
    pub high: f64,

    /// Lowest price during the session.
    pub low: f64,

    /// Closing price.
    pub close: f64,

    /// Shares traded during the session.
    pub volume: f64,
}

impl PriceBar {
    /// A bar carrying the same values as `self` on a different date.
    ///
    /// Used when forward-filling gaps onto a business-day index.
    pub fn carried_to(&self, date: NaiveDate) -> Self {
        Self { date, ..*self }
    }
}
