//! Behavior-driven tests for features, training, persistence and prediction.

use std::sync::Arc;

use ferrocast_core::{Bar, BarSeries, TradingDate};
use ferrocast_ml::{
    FeatureBuilder, FeatureSchema, ForecastError, FsModelStore, ModelStore, ModelTrainer,
    Predictor, PredictorConfig, FEATURE_NAMES, MIN_HISTORY,
};
use ferrocast_tests::{date, symbol, wavy_series};
use tempfile::tempdir;

fn flat_bar(day: TradingDate, high: f64) -> Bar {
    Bar::new(day, 100.0, high, 100.0, 100.0, 1_000).expect("bar")
}

// =============================================================================
// Feature Builder
// =============================================================================

#[test]
fn when_a_flat_market_spikes_the_features_and_label_reflect_it() {
    // Given: 300 flat days followed by one day whose high reaches 105
    let start = date("2023-01-01");
    let mut bars: Vec<Bar> = (0..300).map(|i| flat_bar(start.add_days(i), 100.0)).collect();
    bars.push(flat_bar(start.add_days(300), 105.0));
    let series = BarSeries::new(symbol("FLAT"), bars).expect("series");
    let builder = FeatureBuilder::new();

    // When: Inference and training rows are built
    let latest = builder.inference(&series).expect("inference row");
    let table = builder.training(&series).expect("training table");

    // Then: The latest row matches the hand-computed values
    let expected = [
        100.0, 105.0, 100.0, 100.0, 1000.0, 0.0, 100.0, 100.0, 100.0, 0.0, 0.0, 0.05, 1.0,
    ];
    assert_eq!(latest.values.len(), FEATURE_NAMES.len());
    for (name, (actual, wanted)) in FEATURE_NAMES.iter().zip(latest.values.iter().zip(expected)) {
        assert!((actual - wanted).abs() < 1e-12, "{name}: {actual} != {wanted}");
    }

    // And: The day before the spike is labeled with the 5% upside move
    let last_labeled = &table.rows()[table.len() - 1];
    assert_eq!(last_labeled.date, start.add_days(299));
    let label = last_labeled.label.expect("labeled");
    assert!((label - 0.05).abs() < 1e-12);
}

#[test]
fn when_history_is_one_bar_short_features_are_refused() {
    // Given: One bar fewer than the longest indicator needs
    let series = wavy_series("SHORT", date("2024-01-31"), MIN_HISTORY - 1);

    // When: An inference row is requested
    let error = FeatureBuilder::new().inference(&series).expect_err("too short");

    // Then: The shortfall is reported precisely
    match error {
        ForecastError::InsufficientHistory {
            required,
            available,
            ..
        } => {
            assert_eq!(required, MIN_HISTORY);
            assert_eq!(available, MIN_HISTORY - 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn when_the_latest_day_has_no_next_high_it_is_left_out_of_training() {
    // Given: A history ending on the last day of January
    let series = wavy_series("AAA", date("2024-01-31"), 120);
    let builder = FeatureBuilder::new();

    // When: Full and training tables are built
    let full = builder.full(&series).expect("full table");
    let training = builder.training(&series).expect("training table");

    // Then: Only the final full row is unlabeled, and training drops it
    let last = &full.rows()[full.len() - 1];
    assert_eq!(last.date, date("2024-01-31"));
    assert!(last.label.is_none());
    assert_eq!(full.labeled_rows().count(), full.len() - 1);
    assert_eq!(training.len(), full.len() - 1);
    assert_eq!(training.rows()[training.len() - 1].date, date("2024-01-30"));
}

// =============================================================================
// Model Store and Predictor
// =============================================================================

#[test]
fn when_no_model_was_trained_prediction_is_refused() {
    // Given: An empty model directory
    let temp = tempdir().expect("tempdir");
    let predictor = Predictor::new(
        Arc::new(FsModelStore::new(temp.path())),
        PredictorConfig::default(),
    );

    // When: A forecast is requested
    let error = predictor
        .predict(&wavy_series("NEW", date("2024-01-31"), 60))
        .expect_err("no model");

    // Then: The caller is told to train first
    assert!(matches!(error, ForecastError::ModelNotFound { .. }));
    assert_eq!(error.code(), "forecast.model_not_found");
}

#[test]
fn when_a_model_is_reloaded_it_predicts_exactly_as_before() {
    // Given: A model trained and stored on disk
    let series = wavy_series("AAA", date("2024-01-31"), 200);
    let table = FeatureBuilder::new().training(&series).expect("table");
    let temp = tempdir().expect("tempdir");
    let store = FsModelStore::new(temp.path());
    let trained = ModelTrainer::default()
        .train_and_store(&table, &store)
        .expect("trained");

    // When: It is loaded back
    let loaded = store.get(&symbol("AAA")).expect("stored");

    // Then: Schema and output on a fixed vector are unchanged
    assert_eq!(loaded.schema, FeatureSchema::current());
    let probe = &table.rows()[42].values;
    assert!((loaded.predict(probe) - trained.predict(probe)).abs() < 1e-12);
}

#[test]
fn when_a_retrain_fails_the_previous_model_survives() {
    // Given: A stored model
    let temp = tempdir().expect("tempdir");
    let store = FsModelStore::new(temp.path());
    let builder = FeatureBuilder::new();
    let trainer = ModelTrainer::default();
    let original = trainer
        .train_and_store(
            &builder
                .training(&wavy_series("AAA", date("2024-01-31"), 200))
                .expect("table"),
            &store,
        )
        .expect("first fit");

    // When: A retrain on too little data fails
    let short = builder
        .training(&wavy_series("AAA", date("2024-06-28"), 40))
        .expect("table");
    let error = trainer.train_and_store(&short, &store).expect_err("too few rows");

    // Then: The stored artifact is the original one
    assert!(matches!(error, ForecastError::TrainingFailed { .. }));
    let kept = store.get(&symbol("AAA")).expect("still stored");
    assert_eq!(kept.metadata.trained_through, original.metadata.trained_through);
    assert_eq!(kept.model, original.model);
}

#[test]
fn when_a_model_is_too_old_the_predictor_refuses_it() {
    // Given: A model trained through the end of January
    let temp = tempdir().expect("tempdir");
    let store = Arc::new(FsModelStore::new(temp.path()));
    let table = FeatureBuilder::new()
        .training(&wavy_series("AAA", date("2024-01-31"), 200))
        .expect("table");
    ModelTrainer::default()
        .train_and_store(&table, store.as_ref())
        .expect("trained");

    // When: Predicting from data that runs into April with a 30 day limit
    let predictor = Predictor::new(
        store,
        PredictorConfig {
            max_model_age_days: Some(30),
        },
    );
    let error = predictor
        .predict(&wavy_series("AAA", date("2024-04-01"), 120))
        .expect_err("stale");

    // Then: The model is reported stale rather than used
    assert!(matches!(error, ForecastError::StaleModel { .. }));
}
