mod inspect;
mod models;
mod predict;
mod train;

use std::path::PathBuf;
use std::sync::Arc;

use ferrocast_core::{DataSource, ReqwestHttpClient, YahooAdapter};
use ferrocast_ml::{FsModelStore, ModelStore};
use ferrocast_warehouse::{Warehouse, WarehouseConfig};
use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::config::{models_dir, resolve_home, Settings};
use crate::error::CliError;

pub struct CommandResult {
    pub data: Value,
    /// Set when the command finished but some of its work failed.
    pub partial_failure: bool,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            partial_failure: false,
        }
    }

    pub fn with_partial_failure(mut self, failed: bool) -> Self {
        self.partial_failure = failed;
        self
    }
}

/// Handles shared by every command.
pub struct Context {
    pub home: PathBuf,
    pub settings: Settings,
    pub mock: bool,
}

impl Context {
    pub fn new(cli: &Cli) -> Result<Self, CliError> {
        Ok(Self {
            home: resolve_home(cli),
            settings: Settings::resolve(cli)?,
            mock: cli.mock,
        })
    }

    pub fn source(&self) -> Arc<dyn DataSource> {
        if self.mock {
            return Arc::new(YahooAdapter::default());
        }
        let adapter = YahooAdapter::with_http_client(Arc::new(ReqwestHttpClient::new()));
        let adapter = match self.settings.pipeline.fetch_timeout_ms {
            Some(timeout_ms) => adapter.with_timeout_ms(timeout_ms),
            None => adapter,
        };
        Arc::new(adapter)
    }

    pub fn store(&self) -> Arc<dyn ModelStore> {
        Arc::new(FsModelStore::new(models_dir(&self.home)))
    }

    pub fn warehouse(&self) -> Result<Warehouse, CliError> {
        Ok(Warehouse::open(WarehouseConfig::for_home(self.home.clone()))?)
    }
}

pub async fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    let context = Context::new(cli)?;
    match &cli.command {
        Command::Train(args) => train::run(args, &context).await,
        Command::Predict(args) => predict::run(args, &context).await,
        Command::Inspect(args) => inspect::run(args, &context),
        Command::Models(args) => models::run(args, &context),
    }
}
