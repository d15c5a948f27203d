//! # ferrocast-ml
//!
//! Per-symbol forecasting of the next day's maximum upside move.
//!
//! | Stage | Type |
//! |-------|------|
//! | Features | [`FeatureBuilder`] |
//! | Fitting | [`ModelTrainer`] over a standardized [`RidgeModel`] |
//! | Persistence | [`ModelStore`] ([`FsModelStore`], [`MemoryModelStore`]) |
//! | Forecast | [`Predictor`] |
//! | Train-all | [`Orchestrator`] |

pub mod error;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod predictor;
pub mod store;
pub mod trainer;

pub use error::{ErrorKind, ForecastError, StoreError};
pub use features::{
    FeatureBuilder, FeatureRow, FeatureSchema, FeatureTable, FEATURE_NAMES, LABEL_NAME,
    MIN_HISTORY,
};
pub use model::{FitError, RidgeModel, Scaler, ValidationMetrics};
pub use pipeline::{
    BarCache, FailedSymbol, Orchestrator, PipelineConfig, RunReport, TrainedSymbol,
};
pub use predictor::{PredictionRecord, Predictor, PredictorConfig};
pub use store::{FsModelStore, MemoryModelStore, ModelStore};
pub use trainer::{
    ArtifactMetadata, ModelArtifact, ModelTrainer, TrainerConfig, ARTIFACT_FORMAT_VERSION,
};
