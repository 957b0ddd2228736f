//! Market analysis over the technical-feature table: date-range filtering and
//! rule-based trend/momentum signals.

use std::fmt;

use chrono::NaiveDate;
use market_data::Symbol;
use serde::Serialize;

use crate::{error::ForecastError, indicators::IndicatorRow};

pub const RSI_OVERBOUGHT: f64 = 70.0;
pub const RSI_OVERSOLD: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendSignal {
    Uptrend,
    Downtrend,
    Sideways,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MomentumSignal {
    Overbought,
    Oversold,
    Neutral,
}

impl fmt::Display for TrendSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for MomentumSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Price above a rising moving-average stack is an uptrend, below a falling
/// one a downtrend; anything else is sideways.
pub fn trend_signal(close: f64, sma_20: f64, sma_50: f64) -> TrendSignal {
    if close > sma_20 && sma_20 > sma_50 {
        TrendSignal::Uptrend
    } else if close < sma_20 && sma_20 < sma_50 {
        TrendSignal::Downtrend
    } else {
        TrendSignal::Sideways
    }
}

pub fn momentum_signal(rsi: f64) -> MomentumSignal {
    if rsi > RSI_OVERBOUGHT {
        MomentumSignal::Overbought
    } else if rsi < RSI_OVERSOLD {
        MomentumSignal::Oversold
    } else {
        MomentumSignal::Neutral
    }
}

/// Rows of `symbol` dated within `start..=end`, in input order.
///
/// An inverted range or a range that matches nothing is
/// [`ForecastError::InvalidRange`].
pub fn filter_range<'a>(
    rows: &'a [IndicatorRow],
    symbol: &Symbol,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<&'a IndicatorRow>, ForecastError> {
    if start > end {
        return Err(ForecastError::InvalidRange(format!(
            "start {start} is after end {end}"
        )));
    }
    let selected: Vec<&IndicatorRow> = rows
        .iter()
        .filter(|r| &r.stock == symbol && (start..=end).contains(&r.date))
        .collect();
    if selected.is_empty() {
        return Err(ForecastError::InvalidRange(format!(
            "no data for {symbol} between {start} and {end}"
        )));
    }
    Ok(selected)
}

/// The latest state of one symbol within an analysed window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSnapshot {
    pub symbol: Symbol,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub rows: usize,
    pub close: f64,
    pub rsi_14: f64,
    pub sma_20: f64,
    pub sma_50: f64,
    pub volatility_20: f64,
    /// Close-to-close change over the window, in percent.
    pub change_pct: f64,
    pub period_high: f64,
    pub period_low: f64,
    pub trend: TrendSignal,
    pub momentum: MomentumSignal,
}

/// Summarizes a non-empty, date-ordered window; `None` when `rows` is empty.
pub fn snapshot(rows: &[&IndicatorRow]) -> Option<MarketSnapshot> {
    let (first, latest) = (rows.first()?, rows.last()?);
    let (period_low, period_high) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
        (lo.min(r.low), hi.max(r.high))
    });
    let change_pct = if first.close != 0.0 {
        100.0 * (latest.close / first.close - 1.0)
    } else {
        0.0
    };
    Some(MarketSnapshot {
        symbol: latest.stock.clone(),
        from: first.date,
        to: latest.date,
        rows: rows.len(),
        close: latest.close,
        rsi_14: latest.rsi_14,
        sma_20: latest.sma_20,
        sma_50: latest.sma_50,
        volatility_20: latest.volatility_20,
        change_pct,
        period_high,
        period_low,
        trend: trend_signal(latest.close, latest.sma_20, latest.sma_50),
        momentum: momentum_signal(latest.rsi_14),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn row(stock: &str, d: u32, close: f64, rsi: f64) -> IndicatorRow {
        IndicatorRow {
            date: day(d),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10.0,
            stock: Symbol::new(stock),
            sma_20: 100.0,
            sma_50: 90.0,
            returns: 0.0,
            volatility_20: 0.01,
            rsi_14: rsi,
        }
    }

    #[test]
    fn signals_follow_thresholds() {
        assert_eq!(trend_signal(110.0, 100.0, 90.0), TrendSignal::Uptrend);
        assert_eq!(trend_signal(80.0, 90.0, 100.0), TrendSignal::Downtrend);
        assert_eq!(trend_signal(95.0, 100.0, 90.0), TrendSignal::Sideways);
        assert_eq!(momentum_signal(70.1), MomentumSignal::Overbought);
        assert_eq!(momentum_signal(70.0), MomentumSignal::Neutral);
        assert_eq!(momentum_signal(29.9), MomentumSignal::Oversold);
    }

    #[test]
    fn filter_is_inclusive_and_per_symbol() {
        let rows = vec![
            row("A.NS", 4, 100.0, 50.0),
            row("B.NS", 5, 1.0, 50.0),
            row("A.NS", 5, 105.0, 50.0),
            row("A.NS", 6, 120.0, 75.0),
        ];
        let a = Symbol::new("A.NS");
        let picked = filter_range(&rows, &a, day(5), day(6)).unwrap();
        assert_eq!(picked.len(), 2);

        let snap = snapshot(&picked).unwrap();
        assert_eq!(snap.close, 120.0);
        assert_eq!(snap.trend, TrendSignal::Uptrend);
        assert_eq!(snap.momentum, MomentumSignal::Overbought);
        assert_eq!((snap.period_low, snap.period_high), (104.0, 121.0));
        assert!((snap.change_pct - (120.0 / 105.0 - 1.0) * 100.0).abs() < 1e-9);
    }

    #[test]
    fn empty_or_inverted_range_is_invalid() {
        let rows = vec![row("A.NS", 4, 100.0, 50.0)];
        let a = Symbol::new("A.NS");
        assert!(matches!(
            filter_range(&rows, &a, day(10), day(12)),
            Err(ForecastError::InvalidRange(msg)) if msg.contains("no data")
        ));
        assert!(matches!(
            filter_range(&rows, &a, day(6), day(4)),
            Err(ForecastError::InvalidRange(_))
        ));
        assert!(snapshot(&[]).is_none());
    }
}
