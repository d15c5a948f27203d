//! # ferrocast-core
//!
//! Domain types and market-data plumbing shared by the ferrocast crates.
//!
//! - [`domain`]: validated symbols, trading dates and daily bars
//! - [`DataSource`]: async contract for fetching daily bars
//! - [`adapters`]: Yahoo Finance and in-memory fixture sources
//! - [`fetch_bars`]: timeout plus single-retry fetch policy
//! - [`symbols`]: line-delimited symbol lists

pub mod adapters;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod retry;
pub mod source;
pub mod symbols;

pub use adapters::{FixtureSource, YahooAdapter};
pub use data_source::{BarsRequest, DataSource, SourceError, SourceErrorKind};
pub use domain::*;
pub use error::ValidationError;
pub use http_client::{
    HttpClient, HttpError, HttpErrorKind, HttpFuture, HttpRequest, HttpResponse, NoopHttpClient,
    ReqwestHttpClient,
};
pub use retry::{fetch_bars, FetchPolicy};
pub use source::ProviderId;
pub use symbols::{dedupe_symbols, parse_symbol_list, read_symbol_file, SymbolListError};
