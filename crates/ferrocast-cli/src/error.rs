use ferrocast_ml::{ErrorKind, ForecastError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ferrocast_core::ValidationError),

    #[error(transparent)]
    SymbolList(#[from] ferrocast_core::SymbolListError),

    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error(transparent)]
    Warehouse(#[from] ferrocast_warehouse::WarehouseError),

    #[error("no cached bars for '{symbol}'")]
    NoCachedBars { symbol: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::SymbolList(_) | Self::Config(_) | Self::Usage(_) => 2,
            Self::Forecast(error) => match error.kind() {
                ErrorKind::ModelNotFound | ErrorKind::SchemaMismatch | ErrorKind::StaleModel => 3,
                ErrorKind::DataUnavailable | ErrorKind::InsufficientHistory => 4,
                _ => 10,
            },
            Self::NoCachedBars { .. } => 4,
            Self::Warehouse(_) | Self::Serialization(_) | Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrocast_core::Symbol;

    #[test]
    fn forecast_errors_map_to_documented_exit_codes() {
        let symbol = Symbol::parse("AAA").expect("symbol");
        let missing = CliError::from(ForecastError::ModelNotFound {
            symbol: symbol.clone(),
        });
        let failed = CliError::from(ForecastError::TrainingFailed {
            symbol,
            reason: String::from("solver"),
        });

        assert_eq!(missing.exit_code(), 3);
        assert_eq!(failed.exit_code(), 10);
        assert_eq!(CliError::Config(String::from("bad")).exit_code(), 2);
    }
}
