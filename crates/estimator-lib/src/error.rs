//! Error taxonomy for the estimator
//!
//! Every failure the serving path can produce maps to one variant here.
//! The HTTP boundary converts them into structured responses; none of them
//! terminate the process.

use serde::Serialize;
use std::fmt;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, EstimatorError>;

/// A single problem with a prediction request field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub reason: String,
}

impl FieldIssue {
    pub fn missing(field: &str) -> Self {
        Self {
            field: field.to_string(),
            reason: "missing".to_string(),
        }
    }

    pub fn malformed(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.field, self.reason)
    }
}

/// Why an uploaded training dataset was rejected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DatasetIssue {
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("row {row}: column '{column}' {reason}")]
    MalformedRow {
        row: usize,
        column: String,
        reason: String,
    },

    #[error("dataset contains no rows")]
    Empty,

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("unreadable dataset: {0}")]
    Unreadable(String),
}

/// Canonical error type for the estimator
#[derive(Debug, thiserror::Error)]
pub enum EstimatorError {
    /// The durable artifact slot is missing, unreadable or malformed, or
    /// could not be written
    #[error("model artifact unavailable: {0}")]
    ArtifactUnavailable(String),

    /// Uploaded artifact bytes failed structural validation
    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),

    /// No artifact is active
    #[error("no model loaded")]
    ModelUnavailable,

    /// Prediction parameters missing or malformed
    #[error("invalid request: {}", join_issues(.0))]
    InvalidRequest(Vec<FieldIssue>),

    /// Retrain input failed schema or type checks
    #[error("invalid dataset: {0}")]
    InvalidDataset(#[from] DatasetIssue),

    /// Unexpected fault during inference
    #[error("prediction failed: {0}")]
    PredictionFailed(String),

    /// Unexpected fault during fitting or evaluation
    #[error("retrain failed: {0}")]
    RetrainFailed(String),
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl EstimatorError {
    /// Stable machine-readable code
    pub fn kind(&self) -> &'static str {
        match self {
            EstimatorError::ArtifactUnavailable(_) => "artifact_unavailable",
            EstimatorError::InvalidArtifact(_) => "invalid_artifact",
            EstimatorError::ModelUnavailable => "model_unavailable",
            EstimatorError::InvalidRequest(_) => "invalid_request",
            EstimatorError::InvalidDataset(_) => "invalid_dataset",
            EstimatorError::PredictionFailed(_) => "prediction_failed",
            EstimatorError::RetrainFailed(_) => "retrain_failed",
        }
    }

    /// True when the caller supplied bad input (400-equivalent)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EstimatorError::InvalidArtifact(_)
                | EstimatorError::InvalidRequest(_)
                | EstimatorError::InvalidDataset(_)
        )
    }

    /// HTTP-equivalent status class: 400 for caller faults, 500 otherwise
    pub fn status_class(&self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            500
        }
    }

    /// Field issues carried by an invalid request
    pub fn field_issues(&self) -> Option<&[FieldIssue]> {
        match self {
            EstimatorError::InvalidRequest(issues) => Some(issues),
            _ => None,
        }
    }
}
