//! Holdout split and error measurement

use crate::models::FeatureRow;
use crate::regressor::Regressor;
use anyhow::{bail, Result};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

/// Which rows the recorded MAE was measured on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Evaluation {
    /// Rows held out from fitting
    Holdout,
    /// The fitted rows themselves; the MAE is optimistic
    TrainingSet,
}

impl Evaluation {
    pub fn is_optimistic(&self) -> bool {
        matches!(self, Evaluation::TrainingSet)
    }
}

/// Row indices for fitting and for measuring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
    pub evaluation: Evaluation,
}

/// Shuffle `0..n` with a fixed seed and hold out `ceil(fraction * n)` rows.
///
/// With fewer than `min_rows` rows nothing is held out: every row trains and
/// the same rows are measured. The holdout is clamped so both sides keep at
/// least one row.
pub fn holdout_split(n: usize, fraction: f64, seed: u64, min_rows: usize) -> Split {
    let all: Vec<usize> = (0..n).collect();
    if n < min_rows.max(2) {
        return Split {
            train: all.clone(),
            test: all,
            evaluation: Evaluation::TrainingSet,
        };
    }

    let mut indices = all;
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let held_out = ((fraction * n as f64).ceil() as usize).clamp(1, n - 1);
    let train = indices.split_off(held_out);
    Split {
        train,
        test: indices,
        evaluation: Evaluation::Holdout,
    }
}

/// Mean absolute error of `model` over the given rows
pub fn mean_absolute_error(
    model: &dyn Regressor,
    rows: &[FeatureRow],
    targets: &[f64],
) -> Result<f64> {
    if rows.is_empty() {
        bail!("no rows to evaluate");
    }
    if rows.len() != targets.len() {
        bail!("{} rows but {} targets", rows.len(), targets.len());
    }

    let mut total = 0.0;
    for (row, target) in rows.iter().zip(targets) {
        total += (model.predict(row)? - target).abs();
    }
    let mae = total / rows.len() as f64;
    if !mae.is_finite() {
        bail!("evaluation produced a non-finite MAE");
    }
    Ok(mae)
}
