//! Offline training command

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use estimator_lib::regressor::Algorithm;
use estimator_lib::{
    ArtifactStore, FeatureSchema, ModelArtifact, RetrainConfig, RetrainService, TrainingDataset,
};

use crate::output::{
    format_euros, print_json, print_rows, print_success, print_warning, FieldRow, OutputFormat,
};

/// Fit an artifact from a CSV file and write it to `output`
pub fn train_offline(
    data: &Path,
    output: &Path,
    schema: FeatureSchema,
    algorithm: Algorithm,
    seed: u64,
    format: OutputFormat,
) -> Result<()> {
    let artifact = fit_from_csv(data, schema, algorithm, seed)?;

    ArtifactStore::new(output)
        .save(&artifact)
        .with_context(|| format!("Failed to write artifact to {}", output.display()))?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "output": output.display().to_string(),
            "mae": artifact.mae(),
            "mae_optimistic": artifact.mae_optimistic(),
            "fingerprint": artifact.fingerprint(),
            "metadata": artifact.metadata(),
        }))?,
        OutputFormat::Table => {
            print_success(&format!("Model written to {}", output.display()));
            if artifact.mae_optimistic() {
                print_warning("Too few rows for a holdout split; MAE was measured on the training rows");
            }
            let metadata = artifact.metadata();
            print_rows(vec![
                FieldRow::new("Schema", schema.as_str()),
                FieldRow::new("Algorithm", algorithm.as_str()),
                FieldRow::new("MAE", format_euros(artifact.mae())),
                FieldRow::new("Training rows", metadata.training_rows),
                FieldRow::new("Evaluation rows", metadata.evaluation_rows),
                FieldRow::new("Fingerprint", artifact.fingerprint()),
            ]);
        }
    }

    Ok(())
}

fn fit_from_csv(
    data: &Path,
    schema: FeatureSchema,
    algorithm: Algorithm,
    seed: u64,
) -> Result<ModelArtifact> {
    let file = File::open(data).with_context(|| format!("Failed to open {}", data.display()))?;
    let dataset = TrainingDataset::from_csv(BufReader::new(file), schema)
        .with_context(|| format!("Failed to load {}", data.display()))?;

    let service = RetrainService::new(RetrainConfig {
        schema,
        algorithm,
        split_seed: seed,
        ..RetrainConfig::default()
    });

    Ok(service.retrain(None, &dataset)?)
}
