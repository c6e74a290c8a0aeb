//! Price estimator service
//!
//! Loads the persisted model, serves predictions over HTTP and accepts
//! retrain datasets and model uploads, hot-swapping the served model.

use anyhow::Result;
use estimator_lib::{
    ArtifactStore, ModelLifecycle, PredictionService, RetrainService, ServingState,
    StructuredLogger,
};
use estimator_server::{api, config::ServerConfig};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting estimator-server");

    let config = ServerConfig::load()?;
    info!(
        instance = %config.instance_name,
        schema = %config.feature_schema,
        retrain_mode = config.retrain_mode.as_str(),
        algorithm = config.algorithm.as_str(),
        artifact_path = %config.artifact_path.display(),
        "Service configured"
    );

    let logger = StructuredLogger::new(&config.instance_name);
    let lifecycle = ModelLifecycle::new(
        ArtifactStore::new(&config.artifact_path),
        PredictionService::with_config(config.output_config()),
        RetrainService::new(config.retrain_config()),
        logger.clone(),
    );

    // A missing or broken artifact is not fatal
    let state = lifecycle.load_from_store().await;
    let fingerprint = lifecycle.status().await.fingerprint;
    logger.log_startup(SERVICE_VERSION, fingerprint.as_deref());
    if state == ServingState::Unloaded {
        info!("No model loaded, predictions fail until one is uploaded or trained");
    }

    lifecycle.health().set_ready(true);

    let app_state = Arc::new(api::AppState::new(lifecycle, config.max_upload_bytes));
    let shutdown_logger = logger.clone();
    api::serve(&config.bind_address, config.api_port, app_state, async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => shutdown_logger.log_shutdown("SIGINT received"),
            Err(e) => {
                tracing::warn!(error = %e, "Cannot listen for SIGINT, running until killed");
                std::future::pending::<()>().await
            }
        }
    })
    .await?;

    info!("Shutting down");
    Ok(())
}
