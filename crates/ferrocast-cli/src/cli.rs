//! CLI argument definitions.
//!
//! | Command | Description |
//! |---------|-------------|
//! | `train` | Fetch history and train one model per symbol |
//! | `predict` | Forecast the next day's high for one symbol |
//! | `inspect` | Date range and trading days of cached bars |
//! | `models` | List or remove stored models |
//!
//! ```bash
//! ferrocast --mock train AAPL MSFT
//! ferrocast train --symbols tickers.txt --concurrency 4
//! ferrocast predict WIPRO.NS --format table
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "ferrocast",
    author,
    version,
    about = "Per-ticker next-day high forecasting"
)]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Data directory; defaults to FERROCAST_HOME or ~/.ferrocast.
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// YAML settings file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Use deterministic offline market data instead of Yahoo Finance.
    #[arg(long, global = true, default_value_t = false)]
    pub mock: bool,

    /// Per-request fetch timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Refuse to predict with models older than this many days.
    #[arg(long, global = true)]
    pub max_model_age_days: Option<u32>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Train and store a model for every listed symbol.
    Train(TrainArgs),
    /// Forecast the next trading day's maximum upside for one symbol.
    Predict(PredictArgs),
    /// Show cached bar coverage for one symbol.
    Inspect(InspectArgs),
    /// List stored models.
    Models(ModelsArgs),
}

#[derive(Debug, Args)]
pub struct TrainArgs {
    /// Symbols to train; combined with --symbols.
    pub symbols: Vec<String>,

    /// Line-delimited symbol list.
    #[arg(long = "symbols", value_name = "FILE")]
    pub symbols_file: Option<PathBuf>,

    /// Calendar days of history to fetch.
    #[arg(long)]
    pub days: Option<u32>,

    /// Symbols trained in parallel.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Train on fetched bars only, without the local bar cache.
    #[arg(long, default_value_t = false)]
    pub no_cache: bool,
}

#[derive(Debug, Args)]
pub struct PredictArgs {
    pub symbol: String,

    /// Calendar days of recent history to fetch for features.
    #[arg(long, default_value_t = 90)]
    pub days: u32,

    /// Do not append the forecast to the prediction log.
    #[arg(long, default_value_t = false)]
    pub no_log: bool,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    pub symbol: String,
}

#[derive(Debug, Args)]
pub struct ModelsArgs {
    /// Delete the stored model for this symbol.
    #[arg(long, value_name = "SYMBOL")]
    pub remove: Option<String>,
}
