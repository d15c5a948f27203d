use serde::{Deserialize, Serialize};

use crate::{Symbol, TradingDate, ValidationError};

/// One trading day's OHLCV record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: TradingDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    pub fn new(
        date: TradingDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("open", open)?;
        validate_non_negative("high", high)?;
        validate_non_negative("low", low)?;
        validate_non_negative("close", close)?;

        if high < low {
            return Err(ValidationError::InvalidBarRange);
        }

        if open < low || open > high || close < low || close > high {
            return Err(ValidationError::InvalidBarBounds);
        }

        Ok(Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

/// Daily bars for one symbol, strictly ascending by date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSeries {
    symbol: Symbol,
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Wrap already-ordered bars, rejecting out-of-order or duplicate dates.
    pub fn new(symbol: Symbol, bars: Vec<Bar>) -> Result<Self, ValidationError> {
        for pair in bars.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(ValidationError::UnorderedBars {
                    previous: pair[0].date,
                    next: pair[1].date,
                });
            }
        }
        Ok(Self { symbol, bars })
    }

    /// Sort by date and collapse duplicate dates, keeping the last occurrence.
    ///
    /// Refreshed downloads are appended after older data, so "last wins"
    /// lets a re-fetched day replace a stale one.
    pub fn from_unsorted(symbol: Symbol, bars: Vec<Bar>) -> Self {
        let mut indexed = bars.into_iter().enumerate().collect::<Vec<_>>();
        indexed.sort_by(|(left_idx, left), (right_idx, right)| {
            left.date.cmp(&right.date).then(left_idx.cmp(right_idx))
        });

        let mut deduped: Vec<Bar> = Vec::with_capacity(indexed.len());
        for (_, bar) in indexed {
            match deduped.last_mut() {
                Some(last) if last.date == bar.date => *last = bar,
                _ => deduped.push(bar),
            }
        }

        Self {
            symbol,
            bars: deduped,
        }
    }

    pub fn empty(symbol: Symbol) -> Self {
        Self {
            symbol,
            bars: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> Option<TradingDate> {
        self.bars.first().map(|bar| bar.date)
    }

    pub fn last_date(&self) -> Option<TradingDate> {
        self.bars.last().map(|bar| bar.date)
    }

    /// Merge newer bars into this series; overlapping dates take the incoming bar.
    pub fn merge(self, incoming: Self) -> Self {
        let symbol = self.symbol;
        let mut bars = self.bars;
        bars.extend(incoming.bars);
        Self::from_unsorted(symbol, bars)
    }

    /// Bars up to and including `date`.
    pub fn truncate_after(&self, date: TradingDate) -> Self {
        let end = self.bars.partition_point(|bar| bar.date <= date);
        Self {
            symbol: self.symbol.clone(),
            bars: self.bars[..end].to_vec(),
        }
    }
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}
