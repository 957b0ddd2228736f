//! Ticker identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Market suffix carried by NSE tickers (e.g. `RELIANCE.NS`).
pub const MARKET_SUFFIX: &str = ".NS";

/// A stock ticker identifier, stored exactly as it appears in the price history.
///
/// Storage and lookup keep the market suffix; [`Symbol::stem`] strips it for
/// display and for artifact keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Creates a symbol from any string-like value, trimming surrounding whitespace.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    /// The full ticker, suffix included.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The ticker with the trailing market suffix removed (`TCS.NS` -> `TCS`).
    pub fn stem(&self) -> &str {
        self.0.strip_suffix(MARKET_SUFFIX).unwrap_or(&self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Tickers of the NIFTY-50 constituents as used by the price-history download.
pub const NIFTY50_SYMBOLS: &[&str] = &[
    "RELIANCE.NS", "TCS.NS", "HDFCBANK.NS", "INFY.NS", "ICICIBANK.NS",
    "HINDUNILVR.NS", "ITC.NS", "SBIN.NS", "BHARTIARTL.NS", "KOTAKBANK.NS",
    "LT.NS", "AXISBANK.NS", "ASIANPAINT.NS", "MARUTI.NS", "SUNPHARMA.NS",
    "TITAN.NS", "ULTRACEMCO.NS", "NESTLEIND.NS", "BAJFINANCE.NS", "WIPRO.NS",
    "HCLTECH.NS", "POWERGRID.NS", "NTPC.NS", "ONGC.NS", "JSWSTEEL.NS",
    "TATASTEEL.NS", "COALINDIA.NS", "BAJAJFINSV.NS", "GRASIM.NS", "HDFCLIFE.NS",
    "SBILIFE.NS", "DRREDDY.NS", "CIPLA.NS", "EICHERMOT.NS", "HEROMOTOCO.NS",
    "APOLLOHOSP.NS", "DIVISLAB.NS", "BRITANNIA.NS", "ADANIPORTS.NS", "INDUSINDBK.NS",
    "TECHM.NS", "TATAMOTORS.NS", "BAJAJ-AUTO.NS", "UPL.NS", "HINDALCO.NS",
    "BPCL.NS", "SHREECEM.NS", "M&M.NS", "ADANIENT.NS", "IOC.NS",
];
