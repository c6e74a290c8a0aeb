//! Owner of the served model: load, predict, retrain and hot swap
//!
//! Predictions read an `Arc` snapshot of the active artifact and never wait
//! on a retrain. Retrains and uploads are serialized by a writer lock, run
//! their blocking work on the blocking pool, persist the new artifact and
//! only then swap it in. Any failure leaves both the slot and the served
//! model as they were.

use crate::artifact::{
    compute_checksum, ActiveArtifact, ArtifactMetadata, ArtifactStore, ModelArtifact,
    ServingState,
};
use crate::error::{EstimatorError, Result};
use crate::health::{components, HealthRegistry};
use crate::models::{FeatureSchema, PredictionResult, RawFeatureRequest};
use crate::observability::{EstimatorMetrics, StructuredLogger};
use crate::predictor::PredictionService;
use crate::training::{RetrainService, TrainingDataset};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Result of a successful retrain
#[derive(Debug, Clone)]
pub struct RetrainOutcome {
    pub artifact: Arc<ModelArtifact>,
    /// MAE of the artifact that was replaced, if one was active
    pub previous_mae: Option<f64>,
    pub duration: Duration,
}

/// Snapshot of what is being served
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub state: ServingState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mae: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mae_optimistic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ArtifactMetadata>,
}

#[derive(Clone)]
pub struct ModelLifecycle {
    active: ActiveArtifact,
    store: Arc<ArtifactStore>,
    predictor: Arc<PredictionService>,
    retrainer: Arc<RetrainService>,
    writer: Arc<Mutex<()>>,
    health: HealthRegistry,
    metrics: EstimatorMetrics,
    logger: StructuredLogger,
}

impl ModelLifecycle {
    pub fn new(
        store: ArtifactStore,
        predictor: PredictionService,
        retrainer: RetrainService,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            active: ActiveArtifact::new(),
            store: Arc::new(store),
            predictor: Arc::new(predictor),
            retrainer: Arc::new(retrainer),
            writer: Arc::new(Mutex::new(())),
            health: HealthRegistry::new(),
            metrics: EstimatorMetrics::new(),
            logger,
        }
    }

    /// Load the persisted artifact at startup.
    ///
    /// Never fails: a missing or malformed slot leaves the service running
    /// in the `Unloaded` state with the model component degraded.
    pub async fn load_from_store(&self) -> ServingState {
        self.health.register(components::MODEL).await;
        self.health.register(components::ARTIFACT_STORE).await;
        self.health.register(components::RETRAINER).await;

        let store = Arc::clone(&self.store);
        let loaded = tokio::task::spawn_blocking(move || store.load())
            .await
            .unwrap_or_else(|e| {
                Err(EstimatorError::ArtifactUnavailable(format!(
                    "load task aborted: {}",
                    e
                )))
            });

        match loaded {
            Ok(artifact) => {
                if artifact.schema() != self.schema() {
                    warn!(
                        artifact_schema = %artifact.schema(),
                        configured_schema = %self.schema(),
                        "Persisted model schema differs from configuration"
                    );
                }
                self.activate(Arc::new(artifact), "startup", None).await;
                ServingState::Ready
            }
            Err(e) => {
                warn!(
                    path = %self.store.path().display(),
                    error = %e,
                    "Starting without a model"
                );
                self.metrics.set_model_unloaded();
                self.health
                    .set_degraded(components::MODEL, format!("No model loaded: {}", e))
                    .await;
                ServingState::Unloaded
            }
        }
    }

    /// Predict against a snapshot of the active artifact
    pub async fn predict(&self, request: &RawFeatureRequest) -> Result<PredictionResult> {
        let snapshot = self.active.snapshot().await;
        let start = Instant::now();

        match self.predictor.predict(snapshot.as_deref(), request) {
            Ok(result) => {
                self.metrics.observe_prediction(start.elapsed().as_secs_f64());
                self.logger.log_prediction(
                    &result.inputs.zona,
                    result.point_estimate,
                    result.range.low,
                    result.range.high,
                    &result.fingerprint,
                );
                Ok(result)
            }
            Err(e) => {
                self.metrics.inc_prediction_errors(e.kind());
                if !e.is_client_error() {
                    error!(kind = e.kind(), error = %e, "Prediction failed");
                }
                Err(e)
            }
        }
    }

    /// Fit, persist and activate a new artifact.
    ///
    /// Predictions keep being served from the previous artifact until the
    /// new one is durable.
    pub async fn retrain(&self, dataset: TrainingDataset) -> Result<RetrainOutcome> {
        let _writer = self.writer.lock().await;
        let start = Instant::now();

        let current = self.active.snapshot().await;
        let previous_mae = current.as_ref().map(|a| a.mae());
        let rows = dataset.len();

        let retrainer = Arc::clone(&self.retrainer);
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || -> Result<ModelArtifact> {
            let artifact = retrainer.retrain(current.as_deref(), &dataset)?;
            store.save(&artifact)?;
            Ok(artifact)
        })
        .await
        .unwrap_or_else(|e| {
            Err(EstimatorError::RetrainFailed(format!(
                "retrain task aborted: {}",
                e
            )))
        });

        let duration = start.elapsed();
        match result {
            Ok(artifact) => {
                let artifact = Arc::new(artifact);
                self.activate(Arc::clone(&artifact), "retrain", previous_mae).await;
                self.metrics.observe_retrain(duration.as_secs_f64(), true);
                self.health.set_healthy(components::RETRAINER).await;
                self.health.set_healthy(components::ARTIFACT_STORE).await;
                self.logger.log_retrain_completed(
                    rows,
                    artifact.metadata().mode.as_str(),
                    artifact.mae(),
                    artifact.mae_optimistic(),
                    duration.as_secs_f64(),
                );
                Ok(RetrainOutcome {
                    artifact,
                    previous_mae,
                    duration,
                })
            }
            Err(e) => {
                self.metrics.observe_retrain(duration.as_secs_f64(), false);
                self.record_write_failure("retrain", &e).await;
                Err(e)
            }
        }
    }

    /// Validate, persist and activate uploaded artifact bytes.
    ///
    /// When `expected_sha256` is given it must match the bytes exactly
    /// (hex, case-insensitive) before anything is decoded.
    pub async fn activate_upload(
        &self,
        bytes: Vec<u8>,
        expected_sha256: Option<&str>,
    ) -> Result<Arc<ModelArtifact>> {
        let _writer = self.writer.lock().await;

        let result = self.persist_upload(bytes, expected_sha256).await;
        self.metrics.inc_model_uploads(result.is_ok());
        match result {
            Ok(artifact) => {
                let previous_mae = self.active.snapshot().await.map(|a| a.mae());
                self.activate(Arc::clone(&artifact), "upload", previous_mae).await;
                self.health.set_healthy(components::ARTIFACT_STORE).await;
                Ok(artifact)
            }
            Err(e) => {
                self.record_write_failure("upload", &e).await;
                Err(e)
            }
        }
    }

    async fn persist_upload(
        &self,
        bytes: Vec<u8>,
        expected_sha256: Option<&str>,
    ) -> Result<Arc<ModelArtifact>> {
        if let Some(expected) = expected_sha256 {
            let actual = compute_checksum(&bytes);
            if !actual.eq_ignore_ascii_case(expected.trim()) {
                return Err(EstimatorError::InvalidArtifact(format!(
                    "checksum mismatch: expected {}, got {}",
                    expected.trim(),
                    actual
                )));
            }
        }

        let store = Arc::clone(&self.store);
        let artifact = tokio::task::spawn_blocking(move || -> Result<ModelArtifact> {
            let artifact = ArtifactStore::decode(&bytes)?;
            store.save(&artifact)?;
            Ok(artifact)
        })
        .await
        .unwrap_or_else(|e| {
            Err(EstimatorError::ArtifactUnavailable(format!(
                "upload task aborted: {}",
                e
            )))
        })?;

        if artifact.schema() != self.schema() {
            warn!(
                artifact_schema = %artifact.schema(),
                configured_schema = %self.schema(),
                "Uploaded model schema differs from retrain configuration"
            );
        }
        Ok(Arc::new(artifact))
    }

    async fn activate(
        &self,
        artifact: Arc<ModelArtifact>,
        source: &str,
        previous_mae: Option<f64>,
    ) {
        let metadata = artifact.metadata();
        self.metrics.set_active_model(
            artifact.fingerprint(),
            metadata.algorithm.as_str(),
            metadata.schema.as_str(),
            artifact.mae(),
        );
        self.logger
            .log_model_activated(source, artifact.fingerprint(), artifact.mae(), previous_mae);

        self.active.replace(artifact).await;
        self.health.set_healthy(components::MODEL).await;
    }

    async fn record_write_failure(&self, source: &str, e: &EstimatorError) {
        self.logger.log_model_rejected(source, &e.to_string());
        match e {
            EstimatorError::ArtifactUnavailable(msg) => {
                error!(source = source, error = %e, "Could not persist model");
                self.health
                    .set_degraded(components::ARTIFACT_STORE, msg.clone())
                    .await;
            }
            EstimatorError::RetrainFailed(msg) => {
                error!(error = %e, "Retrain failed");
                self.health.set_degraded(components::RETRAINER, msg.clone()).await;
            }
            _ => info!(source = source, kind = e.kind(), "Rejected model input"),
        }
    }

    pub async fn status(&self) -> ModelStatus {
        match self.active.snapshot().await {
            Some(artifact) => ModelStatus {
                state: ServingState::Ready,
                mae: Some(artifact.mae()),
                mae_optimistic: Some(artifact.mae_optimistic()),
                fingerprint: Some(artifact.fingerprint().to_string()),
                metadata: Some(artifact.metadata().clone()),
            },
            None => ModelStatus {
                state: ServingState::Unloaded,
                mae: None,
                mae_optimistic: None,
                fingerprint: None,
                metadata: None,
            },
        }
    }

    /// Schema that retrain datasets are parsed with
    pub fn schema(&self) -> FeatureSchema {
        self.retrainer.config().schema
    }

    pub fn active(&self) -> &ActiveArtifact {
        &self.active
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }
}
