//! Property price estimation library
//!
//! This crate provides the core functionality for:
//! - Versioned feature schemas and request validation
//! - Model artifacts and their durable single-slot storage
//! - Price prediction with an MAE-derived band
//! - Retraining from uploaded datasets, fresh or incremental
//! - The lifecycle that loads, serves and hot-swaps the active model
//! - Health checks and observability

pub mod artifact;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod regressor;
pub mod training;

pub use artifact::{ArtifactMetadata, ArtifactStore, ModelArtifact, ServingState};
pub use error::{DatasetIssue, EstimatorError, FieldIssue, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use lifecycle::{ModelLifecycle, ModelStatus, RetrainOutcome};
pub use models::*;
pub use observability::{EstimatorMetrics, StructuredLogger};
pub use predictor::PredictionService;
pub use training::{RetrainConfig, RetrainMode, RetrainService, TrainingDataset};
