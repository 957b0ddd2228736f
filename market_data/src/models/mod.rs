//! Canonical in-memory price-history models.

pub mod bar;
pub mod series;
pub mod symbol;
