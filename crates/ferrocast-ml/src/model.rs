//! Standardized ridge regression.
//!
//! Features are centered and scaled with statistics from the fit rows, then
//! an L2-only elastic net is solved with `linfa-elasticnet`. The fitted
//! weights are kept as plain vectors so an artifact serializes to JSON and
//! predicts without linfa at load time.

use linfa::prelude::*;
use linfa::DatasetBase;
use linfa_elasticnet::ElasticNet;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SOLVER_TOLERANCE: f64 = 1e-8;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FitError {
    #[error("no rows to fit")]
    Empty,

    #[error("row {row} has {found} values, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("elastic net solver failed: {0}")]
    Solver(String),

    #[error("fit produced non-finite weights")]
    NonFinite,
}

/// Per-column standardization, `(x - mean) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub means: Vec<f64>,
    /// Population std-dev of the column, or 1 for constant columns.
    pub scales: Vec<f64>,
}

impl Scaler {
    pub fn fit(features: &[Vec<f64>]) -> Self {
        let width = features.first().map_or(0, Vec::len);
        let n = features.len().max(1) as f64;

        let mut means = vec![0.0; width];
        for row in features {
            for (mean, value) in means.iter_mut().zip(row) {
                *mean += value / n;
            }
        }

        let mut scales = vec![0.0; width];
        for row in features {
            for ((scale, mean), value) in scales.iter_mut().zip(&means).zip(row) {
                *scale += (value - mean) * (value - mean) / n;
            }
        }
        for scale in &mut scales {
            *scale = scale.sqrt();
            if !scale.is_finite() || *scale < 1e-12 {
                *scale = 1.0;
            }
        }

        Self { means, scales }
    }

    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(value, (mean, scale))| (value - mean) / scale)
            .collect()
    }

    /// Columns that vary across the fit rows.
    fn active_columns(&self, features: &[Vec<f64>]) -> Vec<usize> {
        (0..self.means.len())
            .filter(|&column| {
                features
                    .iter()
                    .any(|row| (row[column] - self.means[column]).abs() > 1e-12)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeModel {
    pub scaler: Scaler,
    /// Coefficients in standardized feature space.
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub penalty: f64,
}

impl RidgeModel {
    pub fn fit(features: &[Vec<f64>], targets: &[f64], penalty: f64) -> Result<Self, FitError> {
        let Some(first) = features.first() else {
            return Err(FitError::Empty);
        };
        let width = first.len();
        for (row, values) in features.iter().enumerate() {
            if values.len() != width {
                return Err(FitError::Ragged {
                    row,
                    expected: width,
                    found: values.len(),
                });
            }
        }

        let scaler = Scaler::fit(features);
        let active = scaler.active_columns(features);
        let mut coefficients = vec![0.0; width];

        let intercept = if active.is_empty() {
            targets.iter().sum::<f64>() / targets.len() as f64
        } else {
            let standardized: Vec<Vec<f64>> =
                features.iter().map(|row| scaler.transform(row)).collect();
            let records = Array2::from_shape_fn((features.len(), active.len()), |(i, j)| {
                standardized[i][active[j]]
            });
            let dataset = DatasetBase::new(records, Array1::from(targets.to_vec()));

            let fitted = ElasticNet::<f64>::params()
                .penalty(penalty)
                .l1_ratio(0.0)
                .with_intercept(true)
                .tolerance(SOLVER_TOLERANCE)
                .fit(&dataset)
                .map_err(|e| FitError::Solver(e.to_string()))?;

            for (slot, weight) in active.iter().zip(fitted.hyperplane().iter()) {
                coefficients[*slot] = *weight;
            }
            fitted.intercept()
        };

        if !intercept.is_finite() || coefficients.iter().any(|w| !w.is_finite()) {
            return Err(FitError::NonFinite);
        }

        Ok(Self {
            scaler,
            coefficients,
            intercept,
            penalty,
        })
    }

    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    pub fn predict(&self, values: &[f64]) -> f64 {
        self.scaler
            .transform(values)
            .iter()
            .zip(&self.coefficients)
            .map(|(x, w)| x * w)
            .sum::<f64>()
            + self.intercept
    }
}

/// Holdout evaluation of a fitted model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub rows: usize,
    pub mae: f64,
    pub rmse: f64,
    /// Coefficient of determination; 0 when the holdout labels are constant.
    pub r2: f64,
    /// Share of rows where prediction and label have the same sign.
    pub directional_hit_rate: f64,
}

impl ValidationMetrics {
    pub fn evaluate(predicted: &[f64], actual: &[f64]) -> Self {
        let rows = predicted.len().min(actual.len());
        if rows == 0 {
            return Self {
                rows,
                mae: 0.0,
                rmse: 0.0,
                r2: 0.0,
                directional_hit_rate: 0.0,
            };
        }

        let n = rows as f64;
        let pairs = || predicted.iter().zip(actual).take(rows);
        let mae = pairs().map(|(p, a)| (p - a).abs()).sum::<f64>() / n;
        let ss_res = pairs().map(|(p, a)| (p - a) * (p - a)).sum::<f64>();
        let mean_actual = actual[..rows].iter().sum::<f64>() / n;
        let ss_tot = actual[..rows]
            .iter()
            .map(|a| (a - mean_actual) * (a - mean_actual))
            .sum::<f64>();
        let hits = pairs()
            .filter(|(p, a)| p.signum() == a.signum())
            .count();

        Self {
            rows,
            mae,
            rmse: (ss_res / n).sqrt(),
            r2: if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 },
            directional_hit_rate: hits as f64 / n,
        }
    }
}
