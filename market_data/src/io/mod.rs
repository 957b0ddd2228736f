//! Reading and writing price tables.

pub mod prices;
pub mod sink;
