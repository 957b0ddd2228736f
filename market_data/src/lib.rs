//! Price-history models and I/O for the NIFTY-50 forecasting pipeline.
//!
//! - [`models`]: [`Symbol`], [`PriceBar`], [`PriceSeries`] and the per-symbol
//!   [`PriceTable`].
//! - [`calendar`]: Monday–Friday business-day arithmetic.
//! - [`io`]: CSV price-history loading/cleaning and an atomic CSV sink.

pub mod calendar;
pub mod errors;
pub mod io;
pub mod models;

pub use errors::{DataError, SeriesError};
pub use models::bar::PriceBar;
pub use models::series::{PriceSeries, PriceTable};
pub use models::symbol::Symbol;
