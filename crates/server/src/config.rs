//! Server configuration
//!
//! Values come from an optional file named by `ESTIMATOR_CONFIG`, then from
//! `ESTIMATOR_*` environment variables. Every field has a default.

use anyhow::{bail, Context, Result};
use estimator_lib::predictor::{OutputConfig, DEFAULT_BAND_FRACTION, DEFAULT_CONFIDENCE};
use estimator_lib::regressor::{Algorithm, TrainingParams};
use estimator_lib::training::{
    RetrainConfig, RetrainMode, DEFAULT_HOLDOUT_FRACTION, DEFAULT_SPLIT_SEED, MIN_HOLDOUT_ROWS,
};
use estimator_lib::FeatureSchema;
use serde::Deserialize;
use std::path::PathBuf;

/// Environment variable naming an optional config file
pub const CONFIG_FILE_VAR: &str = "ESTIMATOR_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Name attached to every structured log record
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// The single durable artifact slot
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,

    #[serde(default)]
    pub feature_schema: FeatureSchema,

    #[serde(default)]
    pub retrain_mode: RetrainMode,

    #[serde(default)]
    pub algorithm: Algorithm,

    #[serde(default = "default_split_seed")]
    pub split_seed: u64,

    #[serde(default = "default_holdout_fraction")]
    pub holdout_fraction: f64,

    #[serde(default = "default_min_holdout_rows")]
    pub min_holdout_rows: usize,

    #[serde(default = "default_epochs")]
    pub epochs: usize,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    #[serde(default = "default_l2")]
    pub l2: f64,

    /// Confidence quoted in the prediction message (0-1)
    #[serde(default = "default_confidence")]
    pub confidence: f64,

    #[serde(default = "default_band_fraction")]
    pub band_fraction: f64,

    /// Largest accepted retrain or upload body
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_instance_name() -> String {
    std::env::var("INSTANCE_NAME").unwrap_or_else(|_| "estimator".to_string())
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(10000)
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from("model/model.json")
}

fn default_split_seed() -> u64 {
    DEFAULT_SPLIT_SEED
}

fn default_holdout_fraction() -> f64 {
    DEFAULT_HOLDOUT_FRACTION
}

fn default_min_holdout_rows() -> usize {
    MIN_HOLDOUT_ROWS
}

fn default_epochs() -> usize {
    TrainingParams::default().epochs
}

fn default_learning_rate() -> f64 {
    TrainingParams::default().learning_rate
}

fn default_l2() -> f64 {
    TrainingParams::default().l2
}

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

fn default_band_fraction() -> f64 {
    DEFAULT_BAND_FRACTION
}

fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

impl ServerConfig {
    /// Load configuration from the optional file and the environment
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_FILE_VAR).ok();
        Self::from_sources(file.as_deref(), Self::environment())
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix("ESTIMATOR").try_parsing(true)
    }

    pub fn from_sources(file: Option<&str>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::with_name(path));
        }

        let config: Self = builder
            .add_source(env)
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.holdout_fraction > 0.0 && self.holdout_fraction < 1.0) {
            bail!(
                "holdout_fraction must be between 0 and 1, got {}",
                self.holdout_fraction
            );
        }
        if !(self.confidence > 0.0 && self.confidence <= 1.0) {
            bail!("confidence must be in (0, 1], got {}", self.confidence);
        }
        if !(self.band_fraction >= 0.0 && self.band_fraction.is_finite()) {
            bail!("band_fraction must be non-negative, got {}", self.band_fraction);
        }
        if self.max_upload_bytes == 0 {
            bail!("max_upload_bytes must be positive");
        }
        self.training_params()
            .validate()
            .context("Invalid training parameters")
    }

    pub fn training_params(&self) -> TrainingParams {
        TrainingParams {
            epochs: self.epochs,
            learning_rate: self.learning_rate,
            l2: self.l2,
        }
    }

    pub fn retrain_config(&self) -> RetrainConfig {
        RetrainConfig {
            schema: self.feature_schema,
            mode: self.retrain_mode,
            algorithm: self.algorithm,
            params: self.training_params(),
            holdout_fraction: self.holdout_fraction,
            split_seed: self.split_seed,
            min_holdout_rows: self.min_holdout_rows,
        }
    }

    pub fn output_config(&self) -> OutputConfig {
        OutputConfig {
            confidence: self.confidence,
            band_fraction: self.band_fraction,
        }
    }
}
