//! Model upload and status commands

use std::path::Path;

use anyhow::{Context, Result};
use estimator_lib::artifact::compute_checksum;
use estimator_lib::ModelArtifact;

use crate::client::{ApiClient, ModelStatus, UploadResponse, CHECKSUM_HEADER};
use crate::output::{
    color_status, format_euros, print_info, print_json, print_rows, print_success, print_warning,
    FieldRow, OutputFormat,
};

/// Upload an artifact file, checked locally before it is sent
pub async fn upload_model(client: &ApiClient, path: &Path, format: OutputFormat) -> Result<()> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read artifact {}", path.display()))?;

    let artifact = ModelArtifact::from_bytes(&bytes)
        .with_context(|| format!("{} is not a valid model artifact", path.display()))?;
    let checksum = compute_checksum(&bytes);

    if format == OutputFormat::Table {
        print_info(&format!(
            "Uploading {} model ({} schema, MAE {})",
            artifact.metadata().algorithm.as_str(),
            artifact.schema().as_str(),
            format_euros(artifact.mae())
        ));
    }

    let response: UploadResponse = client
        .post_bytes(
            "upload_model",
            "application/json",
            bytes,
            &[(CHECKSUM_HEADER, checksum)],
        )
        .await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => {
            print_success(&response.mensaje);
            print_rows(vec![
                FieldRow::new("MAE", format_euros(response.mae)),
                FieldRow::new("Fingerprint", &response.fingerprint),
            ]);
        }
    }

    Ok(())
}

/// Show the model the service is currently serving
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status: ModelStatus = client.get("model", &[]).await?;

    match format {
        OutputFormat::Json => print_json(&status)?,
        OutputFormat::Table => {
            if status.metadata.is_none() {
                print_warning("No model loaded; predictions fail until one is trained or uploaded");
            }
            print_rows(status_rows(&status));
        }
    }

    Ok(())
}

fn status_rows(status: &ModelStatus) -> Vec<FieldRow> {
    let mut rows = vec![FieldRow::new("State", color_status(&status.state))];

    if let Some(mae) = status.mae {
        let optimistic = if status.mae_optimistic.unwrap_or(false) {
            " (training rows)"
        } else {
            ""
        };
        rows.push(FieldRow::new("MAE", format!("{}{}", format_euros(mae), optimistic)));
    }
    if let Some(fingerprint) = &status.fingerprint {
        rows.push(FieldRow::new("Fingerprint", fingerprint));
    }
    if let Some(metadata) = &status.metadata {
        rows.push(FieldRow::new("Schema", &metadata.schema));
        rows.push(FieldRow::new("Algorithm", &metadata.algorithm));
        rows.push(FieldRow::new("Mode", &metadata.mode));
        rows.push(FieldRow::new(
            "Rows",
            format!(
                "{} training / {} evaluation",
                metadata.training_rows, metadata.evaluation_rows
            ),
        ));
        rows.push(FieldRow::new(
            "Trained at",
            metadata.trained_at.format("%Y-%m-%d %H:%M:%S UTC"),
        ));
    }

    rows
}
