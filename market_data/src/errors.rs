use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

use crate::io::sink::SinkError;

/// The unified error type for the `market_data` crate.
#[derive(Debug, Error)]
pub enum DataError {
    /// The price-history file could not be opened or parsed as CSV.
    #[error("failed to read price history from {}", path.display())]
    Csv {
        /// File being read.
        path: PathBuf,
        /// Underlying CSV error.
        #[source]
        source: csv::Error,
    },

    /// The file parsed but lacks a column the loader requires.
    #[error("price history {} is missing required column `{column}`", path.display())]
    MissingColumn {
        /// File being read.
        path: PathBuf,
        /// Name of the absent column.
        column: &'static str,
    },

    /// A per-symbol series violated its invariants after cleaning.
    #[error(transparent)]
    Series(#[from] SeriesError),

    /// Writing an output table failed.
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Invariant violations for a [`PriceSeries`](crate::PriceSeries).
#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    /// Dates must be strictly increasing (this also rules out duplicates).
    #[error("{symbol}: dates not strictly increasing at {date}")]
    NotIncreasing {
        /// Symbol of the offending series.
        symbol: String,
        /// First date that is not after its predecessor.
        date: NaiveDate,
    },

    /// A close price is NaN or infinite.
    #[error("{symbol}: non-finite close on {date}")]
    NonFiniteClose {
        /// Symbol of the offending series.
        symbol: String,
        /// Date of the offending bar.
        date: NaiveDate,
    },
}
