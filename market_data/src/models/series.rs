//! Per-symbol price series and the multi-symbol table they are grouped into.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::{
    calendar,
    errors::SeriesError,
    models::{bar::PriceBar, symbol::Symbol},
};

/// An ordered daily price history for one symbol.
///
/// Invariants (enforced by [`PriceSeries::new`]): dates strictly increase and
/// every close is finite.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    symbol: Symbol,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Builds a validated series. `bars` must already be sorted by date.
    pub fn new(symbol: Symbol, bars: Vec<PriceBar>) -> Result<Self, SeriesError> {
        for bar in &bars {
            if !bar.close.is_finite() {
                return Err(SeriesError::NonFiniteClose {
                    symbol: symbol.to_string(),
                    date: bar.date,
                });
            }
        }
        if let Some(w) = bars.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(SeriesError::NotIncreasing {
                symbol: symbol.to_string(),
                date: w[1].date,
            });
        }
        Ok(Self { symbol, bars })
    }

    /// A series with no bars.
    pub fn empty(symbol: Symbol) -> Self {
        Self {
            symbol,
            bars: Vec::new(),
        }
    }

    /// Symbol this history belongs to.
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// All bars, oldest first.
    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    /// Number of bars.
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Whether the series holds no bars.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Closing prices, oldest first.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Dates, oldest first.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|b| b.date).collect()
    }

    /// Date of the most recent bar.
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    /// Re-indexes the series onto every business day between its first and
    /// last bar, carrying the latest known bar forward over gaps (holidays).
    ///
    /// Weekend-dated bars do not appear in the output; their values are
    /// carried into the following business day if that day has no bar.
    pub fn to_business_day_frequency(&self) -> PriceSeries {
        let (Some(first), Some(last)) = (self.bars.first(), self.bars.last()) else {
            return self.clone();
        };

        let mut out = Vec::with_capacity(self.bars.len());
        let mut next = 0;
        let mut carried: Option<PriceBar> = None;
        for day in calendar::business_days_between(first.date, last.date) {
            while next < self.bars.len() && self.bars[next].date <= day {
                carried = Some(self.bars[next]);
                next += 1;
            }
            if let Some(bar) = carried {
                out.push(bar.carried_to(day));
            }
        }

        PriceSeries {
            symbol: self.symbol.clone(),
            bars: out,
        }
    }

    /// Bars whose date lies within `start..=end`.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> &[PriceBar] {
        let lo = self.bars.partition_point(|b| b.date < start);
        let hi = self.bars.partition_point(|b| b.date <= end);
        if lo >= hi { &[] } else { &self.bars[lo..hi] }
    }
}

/// Every symbol's validated [`PriceSeries`], ordered by symbol.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    series: BTreeMap<Symbol, PriceSeries>,
}

impl PriceTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts (or replaces) a symbol's series.
    pub fn insert(&mut self, series: PriceSeries) {
        self.series.insert(series.symbol().clone(), series);
    }

    /// Looks up one symbol's history.
    pub fn get(&self, symbol: &Symbol) -> Option<&PriceSeries> {
        self.series.get(symbol)
    }

    /// All symbols in sorted order.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.series.keys()
    }

    /// All series in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = &PriceSeries> {
        self.series.values()
    }

    /// Number of symbols.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Whether the table holds no symbols.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl FromIterator<PriceSeries> for PriceTable {
    fn from_iter<I: IntoIterator<Item = PriceSeries>>(iter: I) -> Self {
        let mut table = PriceTable::new();
        for s in iter {
            table.insert(s);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(y: i32, m: u32, d: u32, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000.0,
        }
    }

    #[test]
    fn rejects_duplicate_dates() {
        let err = PriceSeries::new(
            Symbol::new("TCS.NS"),
            vec![bar(2024, 1, 2, 1.0), bar(2024, 1, 2, 2.0)],
        )
        .unwrap_err();
        assert!(matches!(err, SeriesError::NotIncreasing { .. }));
    }

    #[test]
    fn rejects_nan_close() {
        let err = PriceSeries::new(Symbol::new("TCS.NS"), vec![bar(2024, 1, 2, f64::NAN)])
            .unwrap_err();
        assert!(matches!(err, SeriesError::NonFiniteClose { .. }));
    }

    #[test]
    fn business_day_frequency_fills_holidays() {
        // Thu 2024-01-25, (Fri 26 holiday), Mon 29
        let s = PriceSeries::new(
            Symbol::new("INFY.NS"),
            vec![bar(2024, 1, 25, 10.0), bar(2024, 1, 29, 12.0)],
        )
        .unwrap();
        let filled = s.to_business_day_frequency();
        let closes: Vec<_> = filled.bars().iter().map(|b| (b.date.to_string(), b.close)).collect();
        assert_eq!(
            closes,
            vec![
                ("2024-01-25".to_string(), 10.0),
                ("2024-01-26".to_string(), 10.0),
                ("2024-01-29".to_string(), 12.0),
            ]
        );
    }

    #[test]
    fn between_is_inclusive() {
        let s = PriceSeries::new(
            Symbol::new("ITC.NS"),
            vec![bar(2024, 1, 1, 1.0), bar(2024, 1, 2, 2.0), bar(2024, 1, 3, 3.0)],
        )
        .unwrap();
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        assert_eq!(s.between(d(2), d(3)).len(), 2);
        assert!(s.between(d(4), d(9)).is_empty());
        assert!(s.between(d(3), d(1)).is_empty());
    }
}
