//! Model artifacts: a fitted regressor paired with its MAE
//!
//! An artifact is immutable once built. Replacing the served model means
//! building a new artifact and swapping the whole thing, so the regressor
//! and its error statistic can never come from different fits.

mod active;
mod store;

pub use active::{ActiveArtifact, ServingState};
pub use store::ArtifactStore;

use crate::error::{EstimatorError, Result};
use crate::models::FeatureSchema;
use crate::regressor::{Algorithm, FittedRegressor};
use crate::training::{Evaluation, RetrainMode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Version of the persisted artifact layout
pub const FORMAT_VERSION: u32 = 1;

/// How and on what an artifact was fitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub schema: FeatureSchema,
    pub algorithm: Algorithm,
    pub mode: RetrainMode,
    pub evaluation: Evaluation,
    pub training_rows: usize,
    pub evaluation_rows: usize,
    pub trained_at: DateTime<Utc>,
}

impl ArtifactMetadata {
    pub fn new(
        schema: FeatureSchema,
        algorithm: Algorithm,
        mode: RetrainMode,
        evaluation: Evaluation,
        training_rows: usize,
        evaluation_rows: usize,
    ) -> Self {
        Self {
            schema,
            algorithm,
            mode,
            evaluation,
            training_rows,
            evaluation_rows,
            trained_at: Utc::now(),
        }
    }
}

/// Owned on-disk layout
#[derive(Deserialize)]
struct ArtifactFile {
    format_version: u32,
    mae: f64,
    regressor: FittedRegressor,
    metadata: ArtifactMetadata,
}

/// Borrowed on-disk layout, used for writing and fingerprinting
#[derive(Serialize)]
struct ArtifactFileRef<'a> {
    format_version: u32,
    mae: f64,
    regressor: &'a FittedRegressor,
    metadata: &'a ArtifactMetadata,
}

/// A fitted regressor and the MAE measured for that same fit
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    regressor: FittedRegressor,
    mae: f64,
    metadata: ArtifactMetadata,
    fingerprint: String,
}

impl ModelArtifact {
    /// Build and validate an artifact
    pub fn new(regressor: FittedRegressor, mae: f64, metadata: ArtifactMetadata) -> Result<Self> {
        if !(mae.is_finite() && mae >= 0.0) {
            return Err(EstimatorError::InvalidArtifact(format!(
                "mae must be a finite non-negative number, got {}",
                mae
            )));
        }
        regressor
            .validate(metadata.schema)
            .map_err(|e| EstimatorError::InvalidArtifact(format!("{:#}", e)))?;

        let mut artifact = Self {
            regressor,
            mae,
            metadata,
            fingerprint: String::new(),
        };
        artifact.fingerprint = compute_checksum(&artifact.encode_compact()?);
        Ok(artifact)
    }

    /// Decode and validate serialized artifact bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let file: ArtifactFile = serde_json::from_slice(bytes)
            .map_err(|e| EstimatorError::InvalidArtifact(e.to_string()))?;
        if file.format_version != FORMAT_VERSION {
            return Err(EstimatorError::InvalidArtifact(format!(
                "unsupported format_version {}, expected {}",
                file.format_version, FORMAT_VERSION
            )));
        }
        Self::new(file.regressor, file.mae, file.metadata)
    }

    /// Serialized form written to the artifact slot
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(&self.as_file()).map_err(|e| {
            EstimatorError::ArtifactUnavailable(format!("cannot serialize artifact: {}", e))
        })
    }

    fn encode_compact(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.as_file()).map_err(|e| {
            EstimatorError::InvalidArtifact(format!("cannot serialize artifact: {}", e))
        })
    }

    fn as_file(&self) -> ArtifactFileRef<'_> {
        ArtifactFileRef {
            format_version: FORMAT_VERSION,
            mae: self.mae,
            regressor: &self.regressor,
            metadata: &self.metadata,
        }
    }

    pub fn regressor(&self) -> &FittedRegressor {
        &self.regressor
    }

    pub fn mae(&self) -> f64 {
        self.mae
    }

    pub fn metadata(&self) -> &ArtifactMetadata {
        &self.metadata
    }

    pub fn schema(&self) -> FeatureSchema {
        self.metadata.schema
    }

    /// True when the MAE was measured on the training rows themselves
    pub fn mae_optimistic(&self) -> bool {
        self.metadata.evaluation == Evaluation::TrainingSet
    }

    /// SHA-256 of the canonical serialized form
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
