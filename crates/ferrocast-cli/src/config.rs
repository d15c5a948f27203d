//! Settings layering: built-in defaults, then an optional YAML file, then
//! command-line flags.

use std::fs;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ferrocast_ml::{PipelineConfig, PredictorConfig, TrainerConfig};
use ferrocast_warehouse::resolve_ferrocast_home;
use serde::Deserialize;

use crate::cli::Cli;
use crate::error::CliError;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub history_days: Option<u32>,
    pub pipeline: PipelineSettings,
    pub trainer: TrainerConfig,
    pub predictor: PredictorConfig,
    /// Symbol list used by `train` when no symbols are given.
    pub symbols_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSettings {
    pub concurrency: Option<usize>,
    pub fetch_timeout_ms: Option<u64>,
    pub retry_once: Option<bool>,
    pub requests_per_second: Option<NonZeroU32>,
}

impl Settings {
    pub fn from_yaml(content: &str) -> Result<Self, CliError> {
        serde_yaml::from_str(content).map_err(|e| CliError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, CliError> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::Config(format!("{}: {e}", path.display())))?;
        Self::from_yaml(&content)
    }

    /// File settings when `--config` is given, defaults otherwise.
    pub fn resolve(cli: &Cli) -> Result<Self, CliError> {
        let mut settings = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if let Some(max_age) = cli.max_model_age_days {
            settings.predictor.max_model_age_days = Some(max_age);
        }
        if let Some(timeout_ms) = cli.timeout_ms {
            settings.pipeline.fetch_timeout_ms = Some(timeout_ms);
        }
        Ok(settings)
    }

    pub fn pipeline_config(&self, days: Option<u32>, concurrency: Option<usize>) -> PipelineConfig {
        let defaults = PipelineConfig::default();
        PipelineConfig {
            history_days: days.or(self.history_days).unwrap_or(defaults.history_days),
            end: None,
            concurrency: concurrency
                .or(self.pipeline.concurrency)
                .unwrap_or(defaults.concurrency)
                .max(1),
            fetch_timeout: self.fetch_timeout().unwrap_or(defaults.fetch_timeout),
            retry_once: self.pipeline.retry_once.unwrap_or(defaults.retry_once),
            requests_per_second: self.pipeline.requests_per_second,
        }
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.pipeline.fetch_timeout_ms.map(Duration::from_millis)
    }
}

/// `--home` when given, else `FERROCAST_HOME` or `~/.ferrocast`.
pub fn resolve_home(cli: &Cli) -> PathBuf {
    cli.home.clone().unwrap_or_else(resolve_ferrocast_home)
}

pub fn models_dir(home: &Path) -> PathBuf {
    home.join("models")
}
