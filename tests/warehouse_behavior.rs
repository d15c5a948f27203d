//! Behavior-driven tests for the local bar cache and prediction log.

use ferrocast_core::{Bar, BarSeries, UtcDateTime};
use ferrocast_ml::{BarCache, PredictionRecord};
use ferrocast_tests::{date, open_warehouse, symbol, wavy_series};
use tempfile::tempdir;

// =============================================================================
// Bar cache
// =============================================================================

#[test]
fn when_refreshed_bars_overlap_the_cache_the_newer_values_win() {
    // Given: Thirty cached days
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(temp.path());
    let cached = wavy_series("AAA", date("2024-02-29"), 30);
    warehouse.upsert_bars(&cached).expect("initial load");

    // When: A refresh overlaps the last five days and adds five new ones
    let refreshed: Vec<Bar> = (0..10)
        .map(|i| {
            Bar::new(date("2024-02-25").add_days(i), 70.0, 72.0, 69.0, 71.0, 9_999)
                .expect("bar")
        })
        .collect();
    let refreshed = BarSeries::new(symbol("AAA"), refreshed).expect("series");
    let merged = BarCache::merge(&warehouse, &refreshed).expect("merge");

    // Then: The cache holds one row per day with the refreshed values
    assert_eq!(merged.len(), 35);
    assert_eq!(merged.last_date(), Some(date("2024-03-05")));
    let overlapped = merged
        .bars()
        .iter()
        .find(|bar| bar.date == date("2024-02-27"))
        .expect("overlapping day");
    assert_eq!(overlapped.close, 71.0);
    assert_eq!(overlapped.volume, 9_999);

    let coverage = warehouse
        .coverage(&symbol("AAA"))
        .expect("coverage")
        .expect("cached");
    assert_eq!(coverage.first_date, cached.first_date().expect("first"));
    assert_eq!(coverage.trading_days, 35);
}

#[test]
fn when_several_symbols_are_cached_they_stay_separate() {
    // Given: Two symbols with different histories
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(temp.path());
    warehouse
        .upsert_bars(&wavy_series("AAA", date("2024-02-29"), 40))
        .expect("AAA");
    warehouse
        .upsert_bars(&wavy_series("BBB", date("2024-01-31"), 25))
        .expect("BBB");

    // When/Then: Each symbol reports only its own bars
    assert_eq!(
        BarCache::last_bar_date(&warehouse, &symbol("AAA")).expect("AAA date"),
        Some(date("2024-02-29"))
    );
    assert_eq!(
        warehouse
            .load_bars(&symbol("BBB"))
            .expect("BBB bars")
            .expect("cached")
            .len(),
        25
    );
    assert!(warehouse
        .load_bars(&symbol("CCC"))
        .expect("CCC bars")
        .is_none());
}

// =============================================================================
// Prediction log
// =============================================================================

#[test]
fn when_predictions_are_logged_they_survive_a_reopen_in_order() {
    // Given: Two forecasts logged for the same symbol
    let temp = tempdir().expect("tempdir");
    let first = PredictionRecord {
        symbol: symbol("WIPRO.NS"),
        as_of: date("2024-03-27"),
        predicted_move: 0.011,
        reference_close: 480.0,
        predicted_high: 485.28,
        model_trained_through: date("2024-03-26"),
        generated_at: UtcDateTime::parse("2024-03-27T16:00:00Z").expect("timestamp"),
    };
    let second = PredictionRecord {
        as_of: date("2024-03-28"),
        predicted_move: 0.008,
        generated_at: UtcDateTime::parse("2024-03-28T16:00:00Z").expect("timestamp"),
        ..first.clone()
    };
    {
        let warehouse = open_warehouse(temp.path());
        warehouse.append_prediction(&second).expect("log second");
        warehouse.append_prediction(&first).expect("log first");
    }

    // When: The warehouse is opened again
    let warehouse = open_warehouse(temp.path());
    let logged = warehouse
        .predictions_for(&symbol("WIPRO.NS"))
        .expect("predictions");

    // Then: Both records come back ordered by forecast date
    assert_eq!(logged.len(), 2);
    assert_eq!(logged[0].as_of, first.as_of);
    assert_eq!(logged[1].as_of, second.as_of);
    assert_eq!(logged[0].predicted_move, 0.011);
    assert!(warehouse
        .predictions_for(&symbol("OTHER"))
        .expect("none")
        .is_empty());
}
