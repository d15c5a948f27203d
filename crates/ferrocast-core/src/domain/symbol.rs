use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MAX_SYMBOL_LEN: usize = 20;

/// Prefix marking an index ticker such as `^NSEI`.
const INDEX_PREFIX: char = '^';

/// Uppercased ticker as the market-data source spells it, e.g. `AAPL`,
/// `WIPRO.NS` or `^NSEI`.
///
/// Tickers also name model files, so path separators and whitespace are
/// rejected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let ticker = input.trim().to_ascii_uppercase();
        let len = ticker.chars().count();
        if len == 0 {
            return Err(ValidationError::EmptySymbol);
        }
        if len > MAX_SYMBOL_LEN {
            return Err(ValidationError::SymbolTooLong {
                len,
                max: MAX_SYMBOL_LEN,
            });
        }

        let skip = usize::from(ticker.starts_with(INDEX_PREFIX));
        for (index, ch) in ticker.chars().enumerate().skip(skip) {
            if index == skip && !ch.is_ascii_alphabetic() {
                return Err(ValidationError::SymbolInvalidStart { ch });
            }
            if !(ch.is_ascii_alphanumeric() || ch == '.' || ch == '-') {
                return Err(ValidationError::SymbolInvalidChar { ch, index });
            }
        }
        if skip == len {
            return Err(ValidationError::EmptySymbol);
        }

        Ok(Self(ticker))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_index(&self) -> bool {
        self.0.starts_with(INDEX_PREFIX)
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Symbol {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_normalizes_symbol() {
        let parsed = Symbol::parse(" wipro.ns ").expect("symbol should parse");
        assert_eq!(parsed.as_str(), "WIPRO.NS");
    }

    #[test]
    fn accepts_index_caret_prefix() {
        let parsed = Symbol::parse("^nsei").expect("index symbol should parse");
        assert_eq!(parsed.as_str(), "^NSEI");
        assert!(parsed.is_index());
        assert!(matches!(Symbol::parse("^"), Err(ValidationError::EmptySymbol)));
    }

    #[test]
    fn rejects_invalid_start() {
        let err = Symbol::parse("1AAPL").expect_err("must fail");
        assert!(matches!(err, ValidationError::SymbolInvalidStart { ch: '1' }));
        assert!(matches!(
            Symbol::parse("^.X"),
            Err(ValidationError::SymbolInvalidStart { ch: '.' })
        ));
    }

    #[test]
    fn rejects_path_separators() {
        let err = Symbol::parse("AA/PL").expect_err("must fail");
        assert!(matches!(
            err,
            ValidationError::SymbolInvalidChar { ch: '/', index: 2 }
        ));
    }
}
