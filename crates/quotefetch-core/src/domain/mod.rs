//! # Domain Models
//!
//! Canonical in-memory types shared by every adapter and codec.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Bar`] | OHLCV observation with a UTC timestamp |
//! | [`BarSeries`] | Ordered bars for one symbol |
//! | [`SeriesCollection`] | Series in arrival order |
//! | [`Symbol`] | Validated, case-preserving identifier |
//! | [`Period`] | Bar period (1m … monthly) |
//! | [`Market`] | Listable symbol universe |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! Adapters always hand back ascending bars. Decoders preserve file order.

mod market;
mod models;
mod period;
mod symbol;
mod timestamp;

pub use market::{Market, ScreenerFilter};
pub use models::{Bar, BarSeries, SeriesCollection};
pub use period::Period;
pub use symbol::Symbol;
pub use timestamp::{lookback_years, parse_partial_date, UtcDateTime};
