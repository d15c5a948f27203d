use ferrocast_core::{Symbol, TradingDate, UtcDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ForecastError;
use crate::features::{FeatureRow, FeatureSchema, FeatureTable, LABEL_NAME};
use crate::model::{RidgeModel, ValidationMetrics};
use crate::store::ModelStore;

/// Bumped whenever the artifact layout changes incompatibly.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainerConfig {
    /// Trailing share of labeled rows held out for validation.
    pub holdout_ratio: f64,
    pub min_training_rows: usize,
    pub min_holdout_rows: usize,
    /// L2 penalty of the ridge fit, in standardized feature space.
    pub penalty: f64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            holdout_ratio: 0.2,
            min_training_rows: 50,
            min_holdout_rows: 5,
            penalty: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub format_version: u32,
    pub label: String,
    pub trained_from: TradingDate,
    /// Date of the last labeled row used in the fit.
    pub trained_through: TradingDate,
    pub training_rows: usize,
    pub validation: Option<ValidationMetrics>,
    pub trained_at: UtcDateTime,
}

/// A fitted model bound to one symbol and the schema it was trained on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub symbol: Symbol,
    pub schema: FeatureSchema,
    pub model: RidgeModel,
    pub metadata: ArtifactMetadata,
}

impl ModelArtifact {
    pub fn predict(&self, values: &[f64]) -> f64 {
        self.model.predict(values)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelTrainer {
    config: TrainerConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Fit a model on the labeled rows of `table`.
    ///
    /// Unlabeled rows are ignored, so both training-mode and full tables are
    /// accepted. Validation metrics come from a chronological holdout; the
    /// returned model is refit on every labeled row.
    pub fn train(&self, table: &FeatureTable) -> Result<ModelArtifact, ForecastError> {
        let symbol = table.symbol();
        let failed = |reason: String| ForecastError::TrainingFailed {
            symbol: symbol.clone(),
            reason,
        };

        let expected = FeatureSchema::current();
        if table.schema() != &expected {
            return Err(failed(format!(
                "table schema [{}] differs from builder schema [{}]",
                table.schema().names().join(", "),
                expected.names().join(", ")
            )));
        }

        let rows: Vec<&FeatureRow> = table.labeled_rows().collect();
        if rows.len() < self.config.min_training_rows {
            return Err(failed(format!(
                "{} labeled rows, at least {} required",
                rows.len(),
                self.config.min_training_rows
            )));
        }

        let mut features = Vec::with_capacity(rows.len());
        let mut labels = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(name) = row.first_non_finite(table.schema()) {
                return Err(failed(format!("non-finite '{name}' on {}", row.date)));
            }
            let label = row.label.unwrap_or(f64::NAN);
            if !label.is_finite() {
                return Err(failed(format!("non-finite label on {}", row.date)));
            }
            features.push(row.values.clone());
            labels.push(label);
        }

        let validation = self.holdout_metrics(&features, &labels).map_err(failed)?;

        let model = RidgeModel::fit(&features, &labels, self.config.penalty)
            .map_err(|e| failed(e.to_string()))?;

        let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
            return Err(failed(String::from("no labeled rows")));
        };

        info!(
            symbol = %symbol,
            rows = rows.len(),
            trained_through = %last.date,
            holdout_r2 = ?validation.map(|m| m.r2),
            "trained model"
        );

        Ok(ModelArtifact {
            symbol: symbol.clone(),
            schema: expected,
            model,
            metadata: ArtifactMetadata {
                format_version: ARTIFACT_FORMAT_VERSION,
                label: LABEL_NAME.to_owned(),
                trained_from: first.date,
                trained_through: last.date,
                training_rows: rows.len(),
                validation,
                trained_at: UtcDateTime::now(),
            },
        })
    }

    /// Train and persist. The store is only written after a successful fit.
    pub fn train_and_store(
        &self,
        table: &FeatureTable,
        store: &dyn ModelStore,
    ) -> Result<ModelArtifact, ForecastError> {
        let artifact = self.train(table)?;
        store.put(&artifact.symbol, &artifact)?;
        Ok(artifact)
    }

    fn holdout_metrics(
        &self,
        features: &[Vec<f64>],
        labels: &[f64],
    ) -> Result<Option<ValidationMetrics>, String> {
        let ratio = self.config.holdout_ratio.clamp(0.0, 1.0);
        let holdout = (features.len() as f64 * ratio).floor() as usize;
        let fit_rows = features.len() - holdout;
        if holdout < self.config.min_holdout_rows.max(1) || fit_rows == 0 {
            debug!(holdout, "skipping holdout validation");
            return Ok(None);
        }

        let model = RidgeModel::fit(&features[..fit_rows], &labels[..fit_rows], self.config.penalty)
            .map_err(|e| format!("holdout fit: {e}"))?;
        let predicted: Vec<f64> = features[fit_rows..]
            .iter()
            .map(|row| model.predict(row))
            .collect();
        Ok(Some(ValidationMetrics::evaluate(&predicted, &labels[fit_rows..])))
    }
}
