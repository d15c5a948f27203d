//! # ferrocast-warehouse
//!
//! DuckDB-backed local storage:
//!
//! | Table | Description |
//! |-------|-------------|
//! | `bars_1d` | Daily bars per symbol, one row per `(symbol, date)`; refreshed bars replace older ones |
//! | `predictions` | Append-only log of issued forecasts |
//!
//! The warehouse implements [`BarCache`], so a training run can extend the
//! cached history incrementally instead of refetching it.
//!
//! ```rust,no_run
//! use ferrocast_warehouse::{Warehouse, WarehouseConfig};
//! use ferrocast_core::Symbol;
//!
//! let warehouse = Warehouse::open(WarehouseConfig::default())?;
//! if let Some(coverage) = warehouse.coverage(&Symbol::parse("WIPRO.NS")?)? {
//!     println!("{} to {}: {} days", coverage.first_date, coverage.last_date, coverage.trading_days);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod duckdb;
pub mod migrations;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::{params, Connection};
use ferrocast_core::{Bar, BarSeries, Symbol, TradingDate, UtcDateTime, ValidationError};
use ferrocast_ml::{BarCache, ForecastError, PredictionRecord};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

pub use duckdb::{DuckDbConnectionManager, PooledConnection};

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid row in '{table}': {source}")]
    InvalidRow {
        table: &'static str,
        #[source]
        source: ValidationError,
    },
}

#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    pub ferrocast_home: PathBuf,
    pub db_path: PathBuf,
    pub max_pool_size: usize,
}

impl WarehouseConfig {
    pub fn for_home(ferrocast_home: impl Into<PathBuf>) -> Self {
        let ferrocast_home = ferrocast_home.into();
        let db_path = ferrocast_home.join("warehouse.duckdb");
        Self {
            ferrocast_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self::for_home(resolve_ferrocast_home())
    }
}

/// Date span of the cached bars for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BarCoverage {
    pub first_date: TradingDate,
    pub last_date: TradingDate,
    pub trading_days: u64,
}

#[derive(Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
    manager: DuckDbConnectionManager,
}

impl Warehouse {
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manager = DuckDbConnectionManager::open(config.db_path.clone(), config.max_pool_size)?;
        let warehouse = Self { config, manager };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    pub fn home(&self) -> &Path {
        self.config.ferrocast_home.as_path()
    }

    /// Insert or replace bars; returns the number of rows written.
    pub fn upsert_bars(&self, series: &BarSeries) -> Result<usize, WarehouseError> {
        if series.is_empty() {
            return Ok(0);
        }

        let connection = self.manager.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, WarehouseError> {
            let mut statement = connection.prepare(
                r#"
INSERT OR REPLACE INTO bars_1d (symbol, date, open, high, low, close, volume, updated_at)
VALUES (?, CAST(? AS DATE), ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
"#,
            )?;
            for bar in series.bars() {
                let volume = i64::try_from(bar.volume).map_err(|_| WarehouseError::InvalidRow {
                    table: "bars_1d",
                    source: ValidationError::VolumeOutOfRange { value: bar.volume },
                })?;
                statement.execute(params![
                    series.symbol().as_str(),
                    bar.date.format(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    volume,
                ])?;
            }
            Ok(series.len())
        })();

        let written = finalize_transaction(&connection, result)?;
        debug!(symbol = %series.symbol(), rows = written, "upserted daily bars");
        Ok(written)
    }

    /// All cached bars for `symbol`, or `None` when nothing is cached.
    pub fn load_bars(&self, symbol: &Symbol) -> Result<Option<BarSeries>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(
            r#"
SELECT CAST(date AS VARCHAR), open, high, low, close, volume
FROM bars_1d
WHERE symbol = ?
ORDER BY date
"#,
        )?;
        let rows = statement.query_map(params![symbol.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, i64>(5)?,
            ))
        })?;

        let mut bars = Vec::new();
        for row in rows {
            let (date, open, high, low, close, volume) = row?;
            let date = parse_date("bars_1d", &date)?;
            let invalid = |source| WarehouseError::InvalidRow {
                table: "bars_1d",
                source,
            };
            let volume = u64::try_from(volume)
                .map_err(|_| invalid(ValidationError::NegativeValue { field: "volume" }))?;
            let bar = Bar::new(date, open, high, low, close, volume).map_err(invalid)?;
            bars.push(bar);
        }

        if bars.is_empty() {
            return Ok(None);
        }
        BarSeries::new(symbol.clone(), bars)
            .map(Some)
            .map_err(|source| WarehouseError::InvalidRow {
                table: "bars_1d",
                source,
            })
    }

    pub fn last_bar_date(&self, symbol: &Symbol) -> Result<Option<TradingDate>, WarehouseError> {
        Ok(self.coverage(symbol)?.map(|coverage| coverage.last_date))
    }

    pub fn coverage(&self, symbol: &Symbol) -> Result<Option<BarCoverage>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let (first, last, count): (Option<String>, Option<String>, i64) = connection.query_row(
            r#"
SELECT CAST(MIN(date) AS VARCHAR), CAST(MAX(date) AS VARCHAR), COUNT(*)
FROM bars_1d
WHERE symbol = ?
"#,
            params![symbol.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let (Some(first), Some(last)) = (first, last) else {
            return Ok(None);
        };
        Ok(Some(BarCoverage {
            first_date: parse_date("bars_1d", &first)?,
            last_date: parse_date("bars_1d", &last)?,
            trading_days: u64::try_from(count).unwrap_or(0),
        }))
    }

    pub fn append_prediction(&self, record: &PredictionRecord) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        connection.execute(
            r#"
INSERT INTO predictions (
    symbol, as_of, predicted_move, reference_close, predicted_high,
    model_trained_through, generated_at, recorded_at
) VALUES (?, CAST(? AS DATE), ?, ?, ?, CAST(? AS DATE), ?, CURRENT_TIMESTAMP)
"#,
            params![
                record.symbol.as_str(),
                record.as_of.format(),
                record.predicted_move,
                record.reference_close,
                record.predicted_high,
                record.model_trained_through.format(),
                record.generated_at.format_rfc3339(),
            ],
        )?;
        debug!(symbol = %record.symbol, as_of = %record.as_of, "logged prediction");
        Ok(())
    }

    /// Logged predictions for `symbol`, oldest first.
    pub fn predictions_for(&self, symbol: &Symbol) -> Result<Vec<PredictionRecord>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(
            r#"
SELECT CAST(as_of AS VARCHAR), predicted_move, reference_close, predicted_high,
       CAST(model_trained_through AS VARCHAR), generated_at
FROM predictions
WHERE symbol = ?
ORDER BY as_of, generated_at
"#,
        )?;
        let rows = statement.query_map(params![symbol.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (as_of, predicted_move, reference_close, predicted_high, trained, generated) = row?;
            records.push(PredictionRecord {
                symbol: symbol.clone(),
                as_of: parse_date("predictions", &as_of)?,
                predicted_move,
                reference_close,
                predicted_high,
                model_trained_through: parse_date("predictions", &trained)?,
                generated_at: UtcDateTime::parse(&generated).map_err(|source| {
                    WarehouseError::InvalidRow {
                        table: "predictions",
                        source,
                    }
                })?,
            });
        }
        Ok(records)
    }
}

impl BarCache for Warehouse {
    fn last_bar_date(&self, symbol: &Symbol) -> Result<Option<TradingDate>, ForecastError> {
        Warehouse::last_bar_date(self, symbol).map_err(cache_error)
    }

    fn merge(&self, fetched: &BarSeries) -> Result<BarSeries, ForecastError> {
        self.upsert_bars(fetched).map_err(cache_error)?;
        let merged = self.load_bars(fetched.symbol()).map_err(cache_error)?;
        Ok(merged.unwrap_or_else(|| fetched.clone()))
    }
}

fn cache_error(error: WarehouseError) -> ForecastError {
    ForecastError::Cache(error.to_string())
}

fn parse_date(table: &'static str, value: &str) -> Result<TradingDate, WarehouseError> {
    TradingDate::parse(value).map_err(|source| WarehouseError::InvalidRow { table, source })
}

fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

/// `FERROCAST_HOME` when set and non-empty, else `$HOME/.ferrocast`.
pub fn resolve_ferrocast_home() -> PathBuf {
    if let Some(path) = env::var_os("FERROCAST_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".ferrocast");
    }

    PathBuf::from(".ferrocast")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open(temp: &tempfile::TempDir) -> Warehouse {
        Warehouse::open(WarehouseConfig {
            ferrocast_home: temp.path().to_path_buf(),
            db_path: temp.path().join("db").join("warehouse.duckdb"),
            max_pool_size: 2,
        })
        .expect("warehouse open")
    }

    fn symbol() -> Symbol {
        Symbol::parse("WIPRO.NS").expect("symbol")
    }

    fn series(days: &[(&str, f64)]) -> BarSeries {
        let bars = days
            .iter()
            .map(|(day, close)| {
                Bar::new(
                    TradingDate::parse(day).expect("date"),
                    *close,
                    close + 1.0,
                    close - 1.0,
                    *close,
                    1_000,
                )
                .expect("bar")
            })
            .collect();
        BarSeries::new(symbol(), bars).expect("series")
    }

    #[test]
    fn applies_migrations_once() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open(&temp);
        warehouse.initialize().expect("second initialize");

        let connection = warehouse.manager.acquire().expect("connection");
        let versions = migrations::applied_versions(&connection).expect("versions");
        assert_eq!(versions, vec!["0001_bars_1d", "0002_predictions"]);
    }

    #[test]
    fn oversized_volume_is_rejected_without_writing() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open(&temp);
        let date = TradingDate::parse("2024-01-02").expect("date");
        let bars = vec![
            Bar::new(date, 10.0, 10.0, 10.0, 10.0, 1_000).expect("bar"),
            Bar::new(date.add_days(1), 10.0, 10.0, 10.0, 10.0, u64::MAX).expect("bar"),
        ];
        let oversized = BarSeries::new(symbol(), bars).expect("series");

        let error = warehouse.upsert_bars(&oversized).expect_err("volume too large");
        assert!(matches!(
            error,
            WarehouseError::InvalidRow {
                source: ValidationError::VolumeOutOfRange { value: u64::MAX },
                ..
            }
        ));
        assert!(warehouse.load_bars(&symbol()).expect("load").is_none());
    }

    #[test]
    fn upsert_keeps_latest_bar_per_date() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open(&temp);

        warehouse
            .upsert_bars(&series(&[("2024-01-02", 10.0), ("2024-01-03", 11.0)]))
            .expect("first upsert");
        warehouse
            .upsert_bars(&series(&[("2024-01-03", 12.0), ("2024-01-04", 13.0)]))
            .expect("second upsert");

        let loaded = warehouse.load_bars(&symbol()).expect("load").expect("bars");
        let closes: Vec<f64> = loaded.bars().iter().map(|bar| bar.close).collect();
        assert_eq!(closes, vec![10.0, 12.0, 13.0]);

        let coverage = warehouse.coverage(&symbol()).expect("coverage").expect("some");
        assert_eq!(coverage.first_date.to_string(), "2024-01-02");
        assert_eq!(coverage.last_date.to_string(), "2024-01-04");
        assert_eq!(coverage.trading_days, 3);
    }

    #[test]
    fn unknown_symbol_has_no_coverage() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open(&temp);

        assert_eq!(warehouse.coverage(&symbol()).expect("coverage"), None);
        assert!(warehouse.load_bars(&symbol()).expect("load").is_none());
        assert_eq!(Warehouse::last_bar_date(&warehouse, &symbol()).expect("last"), None);
    }

    #[test]
    fn cache_merge_returns_full_history() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open(&temp);
        warehouse
            .upsert_bars(&series(&[("2024-01-02", 10.0)]))
            .expect("seed");

        let merged = BarCache::merge(&warehouse, &series(&[("2024-01-03", 11.0)])).expect("merge");
        assert_eq!(merged.len(), 2);
        assert_eq!(
            BarCache::last_bar_date(&warehouse, &symbol()).expect("last"),
            Some(TradingDate::parse("2024-01-03").expect("date"))
        );
    }

    #[test]
    fn predictions_are_appended_not_replaced() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open(&temp);
        let record = PredictionRecord {
            symbol: symbol(),
            as_of: TradingDate::parse("2024-01-04").expect("date"),
            predicted_move: 0.012,
            reference_close: 480.0,
            predicted_high: 485.76,
            model_trained_through: TradingDate::parse("2024-01-03").expect("date"),
            generated_at: UtcDateTime::parse("2024-01-04T16:00:00Z").expect("timestamp"),
        };

        warehouse.append_prediction(&record).expect("first append");
        warehouse.append_prediction(&record).expect("second append");

        let logged = warehouse.predictions_for(&symbol()).expect("predictions");
        assert_eq!(logged.len(), 2);
        assert_eq!(logged[0], record);
    }

    #[test]
    fn reopening_sees_committed_rows() {
        let temp = tempdir().expect("tempdir");
        {
            let warehouse = open(&temp);
            warehouse
                .upsert_bars(&series(&[("2024-01-02", 10.0)]))
                .expect("upsert");
        }

        let reopened = open(&temp);
        assert!(reopened.load_bars(&symbol()).expect("load").is_some());
    }
}
