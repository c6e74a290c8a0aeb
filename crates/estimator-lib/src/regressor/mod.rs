//! Fitted regression models
//!
//! The serving path only needs `predict`; fitting is exposed through
//! [`FittedRegressor::fit`] and [`FittedRegressor::continue_fit`] so the
//! retrain service can treat the algorithm as an opaque capability.

mod linear;
mod mean;

pub use linear::{CategoricalTerm, LinearRegressor, NumericTerm, TrainingParams};
pub use mean::MeanRegressor;

use crate::models::{FeatureRow, FeatureSchema};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Trait for fitted price models
pub trait Regressor: Send + Sync {
    /// Predict a price for a single feature row
    fn predict(&self, row: &FeatureRow) -> Result<f64>;
}

/// Fitting algorithm selected by configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// One-hot categorical plus standardized numeric linear model
    #[default]
    Linear,
    /// Training-target mean
    Mean,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Linear => "linear",
            Algorithm::Mean => "mean",
        }
    }
}

/// Serializable closed set of regressors an artifact can carry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedRegressor {
    Linear(LinearRegressor),
    Mean(MeanRegressor),
}

impl FittedRegressor {
    /// Fit a new regressor from scratch
    pub fn fit(
        algorithm: Algorithm,
        schema: FeatureSchema,
        rows: &[FeatureRow],
        targets: &[f64],
        params: &TrainingParams,
    ) -> Result<Self> {
        check_batch(schema, rows, targets)?;
        Ok(match algorithm {
            Algorithm::Linear => {
                FittedRegressor::Linear(LinearRegressor::fit(schema, rows, targets, params)?)
            }
            Algorithm::Mean => FittedRegressor::Mean(MeanRegressor::fit(targets)?),
        })
    }

    /// Continue training from the current parameters on a new batch.
    /// Returns a new regressor; `self` is left untouched.
    pub fn continue_fit(
        &self,
        schema: FeatureSchema,
        rows: &[FeatureRow],
        targets: &[f64],
        params: &TrainingParams,
    ) -> Result<Self> {
        check_batch(schema, rows, targets)?;
        Ok(match self {
            FittedRegressor::Linear(model) => {
                FittedRegressor::Linear(model.continue_fit(rows, targets, params)?)
            }
            FittedRegressor::Mean(model) => FittedRegressor::Mean(model.continue_fit(targets)?),
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            FittedRegressor::Linear(_) => Algorithm::Linear,
            FittedRegressor::Mean(_) => Algorithm::Mean,
        }
    }

    /// Structural check used when loading or accepting an artifact
    pub fn validate(&self, schema: FeatureSchema) -> Result<()> {
        match self {
            FittedRegressor::Linear(model) => model.validate(schema),
            FittedRegressor::Mean(model) => model.validate(),
        }
    }
}

impl Regressor for FittedRegressor {
    fn predict(&self, row: &FeatureRow) -> Result<f64> {
        match self {
            FittedRegressor::Linear(model) => model.predict(row),
            FittedRegressor::Mean(model) => model.predict(row),
        }
    }
}

fn check_batch(schema: FeatureSchema, rows: &[FeatureRow], targets: &[f64]) -> Result<()> {
    if rows.is_empty() {
        bail!("cannot fit on an empty batch");
    }
    if rows.len() != targets.len() {
        bail!("{} feature rows but {} targets", rows.len(), targets.len());
    }
    let categorical = schema.categorical_columns().len();
    let numeric = schema.numeric_columns().len();
    if let Some(bad) = rows
        .iter()
        .position(|r| r.categorical.len() != categorical || r.numeric.len() != numeric)
    {
        bail!("row {} does not match the {} schema layout", bad, schema);
    }
    Ok(())
}
