//! Prometheus metrics and structured event logging

use prometheus::{
    register_gauge, register_gauge_vec, register_histogram, register_int_counter,
    register_int_counter_vec, register_int_gauge, Gauge, GaugeVec, Histogram, IntCounter,
    IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Latency buckets for single-row inference (seconds)
const PREDICTION_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
];

/// Duration buckets for a full retrain (seconds)
const RETRAIN_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EstimatorMetricsInner> = OnceLock::new();

struct EstimatorMetricsInner {
    prediction_latency_seconds: Histogram,
    retrain_duration_seconds: Histogram,
    predictions_total: IntCounter,
    prediction_errors: IntCounterVec,
    retrains_total: IntCounterVec,
    model_uploads_total: IntCounterVec,
    model_mae: Gauge,
    model_info: GaugeVec,
    model_loaded: IntGauge,
}

impl EstimatorMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "estimator_prediction_latency_seconds",
                "Time spent validating and running a single prediction",
                PREDICTION_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            retrain_duration_seconds: register_histogram!(
                "estimator_retrain_duration_seconds",
                "Time spent fitting, evaluating and persisting a retrained model",
                RETRAIN_BUCKETS.to_vec()
            )
            .expect("Failed to register retrain_duration_seconds"),

            predictions_total: register_int_counter!(
                "estimator_predictions_total",
                "Total number of successful predictions"
            )
            .expect("Failed to register predictions_total"),

            prediction_errors: register_int_counter_vec!(
                "estimator_prediction_errors_total",
                "Failed predictions by error kind",
                &["kind"]
            )
            .expect("Failed to register prediction_errors_total"),

            retrains_total: register_int_counter_vec!(
                "estimator_retrains_total",
                "Retrain attempts by outcome",
                &["outcome"]
            )
            .expect("Failed to register retrains_total"),

            model_uploads_total: register_int_counter_vec!(
                "estimator_model_uploads_total",
                "Model uploads by outcome",
                &["outcome"]
            )
            .expect("Failed to register model_uploads_total"),

            model_mae: register_gauge!(
                "estimator_model_mae",
                "Mean absolute error recorded with the active model"
            )
            .expect("Failed to register model_mae"),

            model_info: register_gauge_vec!(
                "estimator_model_info",
                "Information about the active model",
                &["fingerprint", "algorithm", "schema"]
            )
            .expect("Failed to register model_info"),

            model_loaded: register_int_gauge!(
                "estimator_model_loaded",
                "1 when a model is being served, 0 otherwise"
            )
            .expect("Failed to register model_loaded"),
        }
    }
}

/// Handle to the process-wide metrics. Clones share the same collectors.
#[derive(Clone)]
pub struct EstimatorMetrics {
    inner: &'static EstimatorMetricsInner,
}

impl Default for EstimatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EstimatorMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EstimatorMetrics").finish_non_exhaustive()
    }
}

impl EstimatorMetrics {
    /// Create a handle, registering the collectors on first call
    pub fn new() -> Self {
        Self {
            inner: GLOBAL_METRICS.get_or_init(EstimatorMetricsInner::new),
        }
    }

    pub fn observe_prediction(&self, duration_secs: f64) {
        self.inner.prediction_latency_seconds.observe(duration_secs);
        self.inner.predictions_total.inc();
    }

    pub fn inc_prediction_errors(&self, kind: &str) {
        self.inner.prediction_errors.with_label_values(&[kind]).inc();
    }

    pub fn observe_retrain(&self, duration_secs: f64, success: bool) {
        self.inner.retrain_duration_seconds.observe(duration_secs);
        let outcome = if success { "success" } else { "failure" };
        self.inner.retrains_total.with_label_values(&[outcome]).inc();
    }

    pub fn inc_model_uploads(&self, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.inner.model_uploads_total.with_label_values(&[outcome]).inc();
    }

    /// Describe the newly active model, replacing the previous one
    pub fn set_active_model(&self, fingerprint: &str, algorithm: &str, schema: &str, mae: f64) {
        self.inner.model_info.reset();
        self.inner
            .model_info
            .with_label_values(&[fingerprint, algorithm, schema])
            .set(1.0);
        self.inner.model_mae.set(mae);
        self.inner.model_loaded.set(1);
    }

    pub fn set_model_unloaded(&self) {
        self.inner.model_info.reset();
        self.inner.model_mae.set(0.0);
        self.inner.model_loaded.set(0);
    }
}

/// Structured logger for service events
///
/// Every record carries an `event` tag and the instance name so log
/// pipelines can filter without parsing messages.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn log_startup(&self, version: &str, fingerprint: Option<&str>) {
        info!(
            event = "service_started",
            instance = %self.instance,
            service_version = %version,
            model_fingerprint = fingerprint.unwrap_or("none"),
            "Estimator service started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Estimator service shutting down"
        );
    }

    pub fn log_prediction(
        &self,
        zona: &str,
        estimate: f64,
        low: i64,
        high: i64,
        fingerprint: &str,
    ) {
        info!(
            event = "prediction_served",
            instance = %self.instance,
            zona = %zona,
            estimate = estimate,
            range_low = low,
            range_high = high,
            model_fingerprint = %fingerprint,
            "Served price estimate"
        );
    }

    /// `source` is where the artifact came from: `startup`, `retrain` or `upload`
    pub fn log_model_activated(
        &self,
        source: &str,
        fingerprint: &str,
        mae: f64,
        previous_mae: Option<f64>,
    ) {
        info!(
            event = "model_activated",
            instance = %self.instance,
            source = %source,
            model_fingerprint = %fingerprint,
            mae = mae,
            previous_mae = ?previous_mae,
            "Model activated"
        );
    }

    pub fn log_model_rejected(&self, source: &str, reason: &str) {
        warn!(
            event = "model_rejected",
            instance = %self.instance,
            source = %source,
            reason = %reason,
            "Model rejected, keeping previous model"
        );
    }

    pub fn log_retrain_completed(
        &self,
        rows: usize,
        mode: &str,
        mae: f64,
        optimistic: bool,
        duration_secs: f64,
    ) {
        info!(
            event = "retrain_completed",
            instance = %self.instance,
            rows = rows,
            mode = %mode,
            mae = mae,
            mae_optimistic = optimistic,
            duration_secs = duration_secs,
            "Retrain completed"
        );
    }
}
