//! Symbol-list parsing.
//!
//! A symbol list is line-delimited: one ticker per line, blank lines and
//! lines starting with `#` ignored, surrounding whitespace trimmed.

use std::collections::BTreeSet;
use std::path::Path;

use thiserror::Error;

use crate::{Symbol, ValidationError};

#[derive(Debug, Error)]
pub enum SymbolListError {
    #[error("line {line}: {source}")]
    InvalidSymbol {
        line: usize,
        #[source]
        source: ValidationError,
    },

    #[error("failed to read symbol list '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Parse a symbol list, keeping the first occurrence of each ticker.
pub fn parse_symbol_list(input: &str) -> Result<Vec<Symbol>, SymbolListError> {
    let mut symbols = Vec::new();
    for (index, raw) in input.lines().enumerate() {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let symbol = Symbol::parse(trimmed).map_err(|source| SymbolListError::InvalidSymbol {
            line: index + 1,
            source,
        })?;
        symbols.push(symbol);
    }
    Ok(dedupe_symbols(symbols))
}

pub fn read_symbol_file(path: &Path) -> Result<Vec<Symbol>, SymbolListError> {
    let content = std::fs::read_to_string(path).map_err(|source| SymbolListError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_symbol_list(&content)
}

/// Drop repeated symbols, preserving first-seen order.
pub fn dedupe_symbols(symbols: impl IntoIterator<Item = Symbol>) -> Vec<Symbol> {
    let mut seen = BTreeSet::new();
    symbols
        .into_iter()
        .filter(|symbol| seen.insert(symbol.clone()))
        .collect()
}
