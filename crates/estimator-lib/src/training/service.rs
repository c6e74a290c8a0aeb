//! Builds new artifacts from uploaded datasets

use super::dataset::TrainingDataset;
use super::evaluation::{holdout_split, mean_absolute_error};
use super::{RetrainConfig, RetrainMode};
use crate::artifact::{ArtifactMetadata, ModelArtifact};
use crate::error::{DatasetIssue, EstimatorError, Result};
use crate::regressor::FittedRegressor;
use tracing::{debug, info, warn};

/// Fits regressors and measures them. Holds no model state of its own:
/// the current artifact is passed in and a new one is returned.
#[derive(Debug, Clone)]
pub struct RetrainService {
    config: RetrainConfig,
}

impl RetrainService {
    pub fn new(config: RetrainConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetrainConfig {
        &self.config
    }

    /// Fit a new artifact on `dataset`.
    ///
    /// In incremental mode the current artifact's regressor is continued on
    /// the new rows; with no current artifact this falls back to a fresh fit.
    /// `current` is never modified.
    pub fn retrain(
        &self,
        current: Option<&ModelArtifact>,
        dataset: &TrainingDataset,
    ) -> Result<ModelArtifact> {
        let schema = dataset.schema();
        if schema != self.config.schema {
            return Err(DatasetIssue::SchemaMismatch(format!(
                "dataset uses the {} schema but the service is configured for {}",
                schema, self.config.schema
            ))
            .into());
        }

        let base = match (self.config.mode, current) {
            (RetrainMode::Incremental, Some(artifact)) => {
                if artifact.schema() != schema {
                    return Err(DatasetIssue::SchemaMismatch(format!(
                        "active model uses the {} schema, cannot continue it with {} rows",
                        artifact.schema(),
                        schema
                    ))
                    .into());
                }
                let active_algorithm = artifact.regressor().algorithm();
                if active_algorithm != self.config.algorithm {
                    return Err(DatasetIssue::SchemaMismatch(format!(
                        "active model is {}, configured algorithm is {}",
                        active_algorithm.as_str(),
                        self.config.algorithm.as_str()
                    ))
                    .into());
                }
                Some(artifact)
            }
            (RetrainMode::Incremental, None) => {
                info!("No active model to continue, fitting from scratch");
                None
            }
            (RetrainMode::Fresh, _) => None,
        };

        let split = holdout_split(
            dataset.len(),
            self.config.holdout_fraction,
            self.config.split_seed,
            self.config.min_holdout_rows,
        );
        let (train_rows, train_targets) = dataset.select(&split.train);
        let (test_rows, test_targets) = dataset.select(&split.test);
        debug!(
            train = train_rows.len(),
            test = test_rows.len(),
            evaluation = ?split.evaluation,
            "Dataset split"
        );

        let (regressor, mode) = match base {
            Some(artifact) => (
                artifact
                    .regressor()
                    .continue_fit(schema, &train_rows, &train_targets, &self.config.params),
                RetrainMode::Incremental,
            ),
            None => (
                FittedRegressor::fit(
                    self.config.algorithm,
                    schema,
                    &train_rows,
                    &train_targets,
                    &self.config.params,
                ),
                RetrainMode::Fresh,
            ),
        };
        let regressor = regressor.map_err(|e| EstimatorError::RetrainFailed(format!("{:#}", e)))?;

        let mae = mean_absolute_error(&regressor, &test_rows, &test_targets)
            .map_err(|e| EstimatorError::RetrainFailed(format!("{:#}", e)))?;

        if split.evaluation.is_optimistic() {
            warn!(
                rows = dataset.len(),
                mae = mae,
                "Dataset too small for a holdout, MAE measured on training rows"
            );
        }

        let metadata = ArtifactMetadata::new(
            schema,
            regressor.algorithm(),
            mode,
            split.evaluation,
            train_rows.len(),
            test_rows.len(),
        );

        ModelArtifact::new(regressor, mae, metadata).map_err(|e| match e {
            EstimatorError::InvalidArtifact(msg) => EstimatorError::RetrainFailed(msg),
            other => other,
        })
    }
}
