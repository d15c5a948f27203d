//! Feature engineering over daily bars.
//!
//! Every row is computed from bars at or before its own date; the label of
//! row `t` is the only value that looks at bar `t + 1`:
//!
//! ```text
//! label[t] = (high[t+1] - close[t]) / close[t]
//! ```
//!
//! The longest indicator (`sma_20`) needs 19 prior bars, so the first row is
//! emitted at index 19 and a series needs at least [`MIN_HISTORY`] bars.

use ferrocast_core::{Bar, BarSeries, Symbol, TradingDate};
use serde::{Deserialize, Serialize};
use ta::errors::TaError;
use ta::indicators::{SimpleMovingAverage, StandardDeviation};
use ta::Next;

use crate::error::ForecastError;

/// Ordered feature names produced by [`FeatureBuilder`].
pub const FEATURE_NAMES: [&str; 13] = [
    "open",
    "high",
    "low",
    "close",
    "volume",
    "return_1d",
    "sma_5",
    "sma_10",
    "sma_20",
    "close_to_sma_20",
    "volatility_10",
    "range_pct",
    "volume_ratio_10",
];

/// Name recorded in artifacts for the label definition above.
pub const LABEL_NAME: &str = "next_high_return";

/// Prior bars required by the longest indicator.
pub const LOOKBACK: usize = 19;

/// Shortest series that yields at least one feature row.
pub const MIN_HISTORY: usize = LOOKBACK + 1;

/// Ordered list of feature names a model expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema(Vec<String>);

impl FeatureSchema {
    /// Schema of the current builder.
    pub fn current() -> Self {
        Self(FEATURE_NAMES.iter().map(|name| (*name).to_owned()).collect())
    }

    pub fn from_names(names: Vec<String>) -> Self {
        Self(names)
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub date: TradingDate,
    /// Close of day `t`, the base of the label and of forecasts.
    pub close: f64,
    pub values: Vec<f64>,
    pub label: Option<f64>,
}

impl FeatureRow {
    /// Name of the first non-finite feature, if any.
    pub fn first_non_finite<'a>(&self, schema: &'a FeatureSchema) -> Option<&'a str> {
        self.values
            .iter()
            .zip(schema.names())
            .find(|(value, _)| !value.is_finite())
            .map(|(_, name)| name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    symbol: Symbol,
    schema: FeatureSchema,
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn new(symbol: Symbol, schema: FeatureSchema, rows: Vec<FeatureRow>) -> Self {
        Self {
            symbol,
            schema,
            rows,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn labeled_rows(&self) -> impl Iterator<Item = &FeatureRow> {
        self.rows.iter().filter(|row| row.label.is_some())
    }
}

/// Turns a [`BarSeries`] into feature rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureBuilder;

impl FeatureBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn schema(&self) -> FeatureSchema {
        FeatureSchema::current()
    }

    /// Every eligible row; the last one carries no label.
    pub fn full(&self, series: &BarSeries) -> Result<FeatureTable, ForecastError> {
        let bars = checked_bars(series)?;
        let rows = (LOOKBACK..bars.len())
            .map(|t| -> Result<FeatureRow, ForecastError> {
                Ok(FeatureRow {
                    date: bars[t].date,
                    close: bars[t].close,
                    values: row_values(bars, t).map_err(|e| indicator_error(series, e))?,
                    label: bars.get(t + 1).map(|next| upside(&bars[t], next)),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FeatureTable::new(series.symbol().clone(), self.schema(), rows))
    }

    /// Rows with a defined label, ready for fitting.
    pub fn training(&self, series: &BarSeries) -> Result<FeatureTable, ForecastError> {
        let full = self.full(series)?;
        let FeatureTable {
            symbol,
            schema,
            mut rows,
        } = full;
        rows.retain(|row| row.label.is_some());
        Ok(FeatureTable::new(symbol, schema, rows))
    }

    /// The row for the most recent bar.
    pub fn inference(&self, series: &BarSeries) -> Result<FeatureRow, ForecastError> {
        let bars = checked_bars(series)?;
        let t = bars.len() - 1;
        Ok(FeatureRow {
            date: bars[t].date,
            close: bars[t].close,
            values: row_values(bars, t).map_err(|e| indicator_error(series, e))?,
            label: None,
        })
    }
}

fn checked_bars(series: &BarSeries) -> Result<&[Bar], ForecastError> {
    let bars = series.bars();
    if bars.len() < MIN_HISTORY {
        return Err(ForecastError::InsufficientHistory {
            symbol: series.symbol().clone(),
            required: MIN_HISTORY,
            available: bars.len(),
        });
    }
    Ok(bars)
}

fn indicator_error(series: &BarSeries, error: TaError) -> ForecastError {
    ForecastError::Indicator {
        symbol: series.symbol().clone(),
        message: error.to_string(),
    }
}

fn upside(today: &Bar, next: &Bar) -> f64 {
    (next.high - today.close) / today.close
}

// Caller guarantees t >= LOOKBACK.
fn row_values(bars: &[Bar], t: usize) -> Result<Vec<f64>, TaError> {
    let bar = &bars[t];
    let trailing = move |len: usize| &bars[t + 1 - len..=t];

    let sma_5 = last_output(SimpleMovingAverage::new(5)?, trailing(5).iter().map(|b| b.close));
    let sma_10 = last_output(SimpleMovingAverage::new(10)?, trailing(10).iter().map(|b| b.close));
    let sma_20 = last_output(SimpleMovingAverage::new(20)?, trailing(20).iter().map(|b| b.close));
    let volatility_10 = last_output(
        StandardDeviation::new(10)?,
        (t - 9..=t).map(|i| daily_return(bars, i)),
    );
    let mean_volume = last_output(
        SimpleMovingAverage::new(10)?,
        trailing(10).iter().map(|b| b.volume as f64),
    );

    Ok(vec![
        bar.open,
        bar.high,
        bar.low,
        bar.close,
        bar.volume as f64,
        daily_return(bars, t),
        sma_5,
        sma_10,
        sma_20,
        bar.close / sma_20 - 1.0,
        volatility_10,
        (bar.high - bar.low) / bar.close,
        if mean_volume == 0.0 {
            0.0
        } else {
            bar.volume as f64 / mean_volume
        },
    ])
}

/// Feeds a fresh indicator exactly the window it summarizes.
fn last_output<I>(mut indicator: I, window: impl Iterator<Item = f64>) -> f64
where
    I: Next<f64, Output = f64>,
{
    window.fold(0.0, |_, value| indicator.next(value))
}

fn daily_return(bars: &[Bar], i: usize) -> f64 {
    bars[i].close / bars[i - 1].close - 1.0
}
