//! Model retraining
//!
//! Turns an uploaded dataset into a new [`ModelArtifact`](crate::artifact::ModelArtifact):
//! - Column and type validation of the whole batch before any fitting
//! - Fresh or incremental fitting, chosen by configuration
//! - MAE on a seeded holdout split, or on the training rows for tiny batches

mod dataset;
mod evaluation;
mod service;

pub use dataset::TrainingDataset;
pub use evaluation::{holdout_split, mean_absolute_error, Evaluation, Split};
pub use service::RetrainService;

use crate::models::FeatureSchema;
use crate::regressor::{Algorithm, TrainingParams};
use serde::{Deserialize, Serialize};

/// Default fraction of rows held out for MAE
pub const DEFAULT_HOLDOUT_FRACTION: f64 = 0.2;

/// Default seed for the holdout shuffle
pub const DEFAULT_SPLIT_SEED: u64 = 42;

/// Below this many rows the MAE is measured on the training rows
pub const MIN_HOLDOUT_ROWS: usize = 5;

/// How a retrain treats the currently active model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrainMode {
    /// Ignore the active model and fit from scratch
    #[default]
    Fresh,
    /// Continue training the active model on the new rows
    Incremental,
}

impl RetrainMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrainMode::Fresh => "fresh",
            RetrainMode::Incremental => "incremental",
        }
    }
}

/// Configuration for the retrain service
#[derive(Debug, Clone)]
pub struct RetrainConfig {
    pub schema: FeatureSchema,
    pub mode: RetrainMode,
    pub algorithm: Algorithm,
    pub params: TrainingParams,
    pub holdout_fraction: f64,
    pub split_seed: u64,
    pub min_holdout_rows: usize,
}

impl Default for RetrainConfig {
    fn default() -> Self {
        Self {
            schema: FeatureSchema::default(),
            mode: RetrainMode::default(),
            algorithm: Algorithm::default(),
            params: TrainingParams::default(),
            holdout_fraction: DEFAULT_HOLDOUT_FRACTION,
            split_seed: DEFAULT_SPLIT_SEED,
            min_holdout_rows: MIN_HOLDOUT_ROWS,
        }
    }
}
