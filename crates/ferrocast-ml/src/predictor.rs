use std::sync::Arc;

use ferrocast_core::{BarSeries, Symbol, TradingDate, UtcDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ForecastError;
use crate::features::FeatureBuilder;
use crate::store::ModelStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PredictorConfig {
    /// Refuse models whose training data ends more than this many calendar
    /// days before the forecast date.
    pub max_model_age_days: Option<u32>,
}

/// Point forecast for the trading day after `as_of`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub symbol: Symbol,
    pub as_of: TradingDate,
    /// Expected `(next high - close) / close`.
    pub predicted_move: f64,
    pub reference_close: f64,
    pub predicted_high: f64,
    pub model_trained_through: TradingDate,
    pub generated_at: UtcDateTime,
}

pub struct Predictor {
    store: Arc<dyn ModelStore>,
    builder: FeatureBuilder,
    config: PredictorConfig,
}

impl Predictor {
    pub fn new(store: Arc<dyn ModelStore>, config: PredictorConfig) -> Self {
        Self {
            store,
            builder: FeatureBuilder::new(),
            config,
        }
    }

    pub fn predict(&self, series: &BarSeries) -> Result<PredictionRecord, ForecastError> {
        let symbol = series.symbol();
        let artifact = self.store.get(symbol)?;
        let row = self.builder.inference(series)?;

        let live = self.builder.schema();
        if artifact.schema != live {
            return Err(ForecastError::SchemaMismatch {
                symbol: symbol.clone(),
                expected: artifact.schema.names().to_vec(),
                found: live.names().to_vec(),
            });
        }

        let trained_through = artifact.metadata.trained_through;
        if let Some(max_age_days) = self.config.max_model_age_days {
            let age_days = trained_through.days_until(row.date);
            if age_days > i64::from(max_age_days) {
                return Err(ForecastError::StaleModel {
                    symbol: symbol.clone(),
                    trained_through,
                    as_of: row.date,
                    age_days,
                    max_age_days,
                });
            }
        }

        if let Some(feature) = row.first_non_finite(&live) {
            return Err(ForecastError::NonFiniteFeatures {
                symbol: symbol.clone(),
                feature: feature.to_owned(),
            });
        }

        let predicted_move = artifact.predict(&row.values);
        if !predicted_move.is_finite() {
            return Err(ForecastError::NonFiniteFeatures {
                symbol: symbol.clone(),
                feature: String::from("prediction"),
            });
        }

        debug!(symbol = %symbol, as_of = %row.date, predicted_move, "forecast ready");

        Ok(PredictionRecord {
            symbol: symbol.clone(),
            as_of: row.date,
            predicted_move,
            reference_close: row.close,
            predicted_high: row.close * (1.0 + predicted_move),
            model_trained_through: trained_through,
            generated_at: UtcDateTime::now(),
        })
    }
}
