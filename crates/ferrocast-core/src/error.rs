use thiserror::Error;

use crate::TradingDate;

/// Rejected input: a malformed ticker, date or bar.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("empty ticker")]
    EmptySymbol,
    #[error("ticker is {len} characters, at most {max} allowed")]
    SymbolTooLong { len: usize, max: usize },
    #[error("ticker cannot start with '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("ticker has '{ch}' at position {index}; only letters, digits, '.' and '-' are allowed")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("not an RFC 3339 timestamp: '{value}'")]
    InvalidTimestamp { value: String },
    #[error("not a YYYY-MM-DD date: '{value}'")]
    InvalidDate { value: String },
    #[error("{start} is after {end}")]
    EmptyDateRange { start: TradingDate, end: TradingDate },

    #[error("bar {field} is not finite")]
    NonFiniteValue { field: &'static str },
    #[error("bar {field} is negative")]
    NegativeValue { field: &'static str },
    #[error("bar volume {value} does not fit in a signed 64-bit column")]
    VolumeOutOfRange { value: u64 },
    #[error("bar low is above its high")]
    InvalidBarRange,
    #[error("bar open or close lies outside its low..high range")]
    InvalidBarBounds,
    #[error("bar dated {next} follows {previous}; dates must strictly increase")]
    UnorderedBars {
        previous: TradingDate,
        next: TradingDate,
    },
}
