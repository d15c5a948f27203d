//! # Domain Models
//!
//! Canonical domain types for ferrocast market data.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Validated ticker |
//! | [`TradingDate`] | Calendar day of a daily bar |
//! | [`UtcDateTime`] | UTC timestamp |
//! | [`Bar`] | Daily OHLCV record |
//! | [`BarSeries`] | Date-ordered bars for one symbol |
//!
//! All types enforce their invariants at construction time:
//!
//! ```rust
//! use ferrocast_core::{Bar, TradingDate, ValidationError};
//!
//! let date = TradingDate::parse("2024-01-02").unwrap();
//! let invalid = Bar::new(date, 100.0, 95.0, 105.0, 102.0, 1_000);
//! assert!(matches!(invalid, Err(ValidationError::InvalidBarRange)));
//! ```

mod date;
mod models;
mod symbol;
mod timestamp;

pub use date::TradingDate;
pub use models::{Bar, BarSeries};
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
