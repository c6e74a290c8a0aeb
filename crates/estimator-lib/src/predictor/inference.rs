//! Single-row price inference against a model artifact

use super::output::{OutputConfig, OutputFormatter};
use crate::artifact::ModelArtifact;
use crate::error::{EstimatorError, Result};
use crate::models::{FeatureRequest, PredictionResult, RawFeatureRequest};
use crate::regressor::Regressor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

/// Maximum inference latency before warning
const MAX_INFERENCE_MS: u128 = 5;

/// Validates requests and runs them through an artifact's regressor
#[derive(Debug)]
pub struct PredictionService {
    output_formatter: OutputFormatter,
    inference_count: AtomicU64,
    slow_inference_count: AtomicU64,
}

impl PredictionService {
    pub fn new() -> Self {
        Self::with_config(OutputConfig::default())
    }

    pub fn with_config(config: OutputConfig) -> Self {
        Self {
            output_formatter: OutputFormatter::with_config(config),
            inference_count: AtomicU64::new(0),
            slow_inference_count: AtomicU64::new(0),
        }
    }

    /// Predict a price for one request.
    ///
    /// The request is validated against the artifact's own schema before the
    /// regressor is touched. No side effects beyond inference counters.
    pub fn predict(
        &self,
        artifact: Option<&ModelArtifact>,
        request: &RawFeatureRequest,
    ) -> Result<PredictionResult> {
        let artifact = artifact.ok_or(EstimatorError::ModelUnavailable)?;
        let schema = artifact.schema();

        let request = FeatureRequest::parse(request, schema)?;
        let row = request.to_row(schema)?;

        let start = Instant::now();
        let estimate = artifact
            .regressor()
            .predict(&row)
            .map_err(|e| EstimatorError::PredictionFailed(format!("{:#}", e)))?;

        let elapsed = start.elapsed();
        self.inference_count.fetch_add(1, Ordering::Relaxed);
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            self.slow_inference_count.fetch_add(1, Ordering::Relaxed);
            warn!(
                elapsed_ms = elapsed.as_millis(),
                "Inference exceeded {}ms target",
                MAX_INFERENCE_MS
            );
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        if !estimate.is_finite() {
            return Err(EstimatorError::PredictionFailed(format!(
                "model produced a non-finite estimate ({})",
                estimate
            )));
        }

        let range = self.output_formatter.range(estimate, artifact.mae());
        Ok(PredictionResult {
            point_estimate: self.output_formatter.round_estimate(estimate),
            range,
            mae: artifact.mae(),
            confidence: self.output_formatter.confidence(),
            message: self.output_formatter.message(&range),
            inputs: request,
            fingerprint: artifact.fingerprint().to_string(),
        })
    }

    /// Get inference statistics
    pub fn stats(&self) -> InferenceStats {
        InferenceStats {
            total_inferences: self.inference_count.load(Ordering::Relaxed),
            slow_inferences: self.slow_inference_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for PredictionService {
    fn default() -> Self {
        Self::new()
    }
}

/// Inference statistics
#[derive(Debug, Clone)]
pub struct InferenceStats {
    pub total_inferences: u64,
    pub slow_inferences: u64,
}
