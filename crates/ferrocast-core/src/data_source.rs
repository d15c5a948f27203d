//! This module defines the adapter contract (`DataSource`) that every
//! market-data provider implements. The forecasting pipeline only ever asks
//! for one thing: daily bars for one symbol over a date range.
//!
//! # Example
//!
//! ```rust,ignore
//! use ferrocast_core::{BarsRequest, DataSource, SourceError, Symbol, TradingDate, YahooAdapter};
//!
//! async fn fetch(adapter: &YahooAdapter) -> Result<(), SourceError> {
//!     let request = BarsRequest::new(
//!         Symbol::parse("WIPRO.NS")?,
//!         TradingDate::parse("2015-01-01")?,
//!         TradingDate::last_completed_day(),
//!     )?;
//!     let series = adapter.bars(request).await?;
//!     println!("{} bars", series.len());
//!     Ok(())
//! }
//! ```

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::{BarSeries, ProviderId, Symbol, TradingDate, ValidationError};

/// Why a bar fetch failed, as far as the orchestrator cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    Unavailable,
    RateLimited,
    InvalidRequest,
    NotFound,
    Internal,
}

/// Structured source error. `retryable` marks failures an immediate retry may fix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::NotFound,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::NotFound => "source.not_found",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

impl From<ValidationError> for SourceError {
    fn from(error: ValidationError) -> Self {
        Self::invalid_request(error.to_string())
    }
}

/// Request payload for daily bars over an inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarsRequest {
    pub symbol: Symbol,
    pub start: TradingDate,
    pub end: TradingDate,
}

impl BarsRequest {
    pub fn new(symbol: Symbol, start: TradingDate, end: TradingDate) -> Result<Self, SourceError> {
        if start > end {
            return Err(ValidationError::EmptyDateRange { start, end }.into());
        }
        Ok(Self { symbol, start, end })
    }

    /// The trailing `days` calendar days ending at `end`.
    pub fn trailing(symbol: Symbol, end: TradingDate, days: u32) -> Result<Self, SourceError> {
        if days == 0 {
            return Err(SourceError::invalid_request(
                "bars request must cover at least one day",
            ));
        }
        let start = end.add_days(-(i64::from(days) - 1));
        Self::new(symbol, start, end)
    }

    pub fn contains(&self, date: TradingDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Market-data source contract.
///
/// Implementations must be `Send + Sync` because the orchestrator may share a
/// single source across concurrent per-symbol jobs.
pub trait DataSource: Send + Sync {
    /// Returns the provider identifier.
    fn id(&self) -> ProviderId;

    /// Fetches daily bars for `req.symbol` between `req.start` and `req.end`
    /// inclusive, ordered by date.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if:
    /// - the symbol is unknown to the provider (`NotFound`)
    /// - the provider is unreachable or times out (`Unavailable`)
    /// - the provider throttles the caller (`RateLimited`)
    fn bars<'a>(
        &'a self,
        req: BarsRequest,
    ) -> Pin<Box<dyn Future<Output = Result<BarSeries, SourceError>> + Send + 'a>>;
}
