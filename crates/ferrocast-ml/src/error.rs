use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use ferrocast_core::{SourceError, Symbol, TradingDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures of the model store itself, independent of any forecasting step.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("artifact for '{artifact}' cannot be stored under '{key}'")]
    SymbolMismatch { key: Symbol, artifact: Symbol },

    #[error("stored artifact '{}' is corrupt: {message}", path.display())]
    Corrupt { path: PathBuf, message: String },

    #[error("model store I/O failed at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode artifact: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("model store lock poisoned")]
    Poisoned,
}

/// Errors raised while building features, training, storing or predicting.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("{symbol}: insufficient history, {required} bars required but {available} available")]
    InsufficientHistory {
        symbol: Symbol,
        required: usize,
        available: usize,
    },

    #[error("{symbol}: training failed: {reason}")]
    TrainingFailed { symbol: Symbol, reason: String },

    #[error("{symbol}: no trained model stored")]
    ModelNotFound { symbol: Symbol },

    #[error("{symbol}: feature schema mismatch, model expects [{}] but builder produces [{}]", expected.join(", "), found.join(", "))]
    SchemaMismatch {
        symbol: Symbol,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("{symbol}: market data unavailable: {source}")]
    DataUnavailable {
        symbol: Symbol,
        #[source]
        source: SourceError,
    },

    #[error("{symbol}: model trained through {trained_through} is {age_days} days older than {as_of} (limit {max_age_days})")]
    StaleModel {
        symbol: Symbol,
        trained_through: TradingDate,
        as_of: TradingDate,
        age_days: i64,
        max_age_days: u32,
    },

    #[error("{symbol}: non-finite value in '{feature}'")]
    NonFiniteFeatures { symbol: Symbol, feature: String },

    #[error("{symbol}: indicator setup failed: {message}")]
    Indicator { symbol: Symbol, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("bar cache error: {0}")]
    Cache(String),
}

impl ForecastError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientHistory { .. } => ErrorKind::InsufficientHistory,
            Self::TrainingFailed { .. } => ErrorKind::TrainingFailed,
            Self::ModelNotFound { .. } => ErrorKind::ModelNotFound,
            Self::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            Self::DataUnavailable { .. } => ErrorKind::DataUnavailable,
            Self::StaleModel { .. } => ErrorKind::StaleModel,
            Self::NonFiniteFeatures { .. } => ErrorKind::NonFiniteFeatures,
            Self::Indicator { .. } => ErrorKind::Indicator,
            Self::Store(_) => ErrorKind::Store,
            Self::Cache(_) => ErrorKind::Cache,
        }
    }

    pub const fn code(&self) -> &'static str {
        self.kind().code()
    }
}

/// Stable, serializable classification of a [`ForecastError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InsufficientHistory,
    TrainingFailed,
    ModelNotFound,
    SchemaMismatch,
    DataUnavailable,
    StaleModel,
    NonFiniteFeatures,
    Indicator,
    Store,
    Cache,
}

impl ErrorKind {
    pub const fn code(self) -> &'static str {
        match self {
            Self::InsufficientHistory => "forecast.insufficient_history",
            Self::TrainingFailed => "forecast.training_failed",
            Self::ModelNotFound => "forecast.model_not_found",
            Self::SchemaMismatch => "forecast.schema_mismatch",
            Self::DataUnavailable => "forecast.data_unavailable",
            Self::StaleModel => "forecast.stale_model",
            Self::NonFiniteFeatures => "forecast.non_finite_features",
            Self::Indicator => "forecast.indicator",
            Self::Store => "forecast.store",
            Self::Cache => "forecast.cache",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_dotted_and_stable() {
        let error = ForecastError::ModelNotFound {
            symbol: Symbol::parse("AAPL").expect("symbol"),
        };
        assert_eq!(error.code(), "forecast.model_not_found");
        assert_eq!(error.to_string(), "AAPL: no trained model stored");
    }

    #[test]
    fn store_errors_classify_as_store() {
        let error = ForecastError::from(StoreError::Poisoned);
        assert_eq!(error.kind(), ErrorKind::Store);
    }

    #[test]
    fn kind_serializes_in_snake_case() {
        let json = serde_json::to_string(&ErrorKind::InsufficientHistory).expect("serialize");
        assert_eq!(json, "\"insufficient_history\"");
    }
}
