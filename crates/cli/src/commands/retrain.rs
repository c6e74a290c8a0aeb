//! Retrain command

use std::path::Path;

use anyhow::{Context, Result};

use crate::client::{ApiClient, RetrainResponse};
use crate::output::{
    format_euros, print_json, print_rows, print_success, print_warning, FieldRow, OutputFormat,
};

/// Content type the service parses a dataset file as
pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => "application/json",
        _ => "text/csv",
    }
}

/// Send a dataset file or a single JSON record to the retrain endpoint
pub async fn retrain(
    client: &ApiClient,
    file: Option<&Path>,
    record: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let (content_type, body) = match (file, record) {
        (Some(path), _) => {
            let body = std::fs::read(path)
                .with_context(|| format!("Failed to read dataset {}", path.display()))?;
            (content_type_for(path), body)
        }
        (None, Some(record)) => {
            let value: serde_json::Value =
                serde_json::from_str(record).context("--record is not valid JSON")?;
            ("application/json", serde_json::to_vec(&value)?)
        }
        (None, None) => anyhow::bail!("either --file or --record is required"),
    };

    let response: RetrainResponse = client.post_bytes("retrain", content_type, body, &[]).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => {
            print_success(&response.mensaje);
            if response.mae_optimista {
                print_warning("Too few rows for a holdout split; MAE was measured on the training rows");
            }
            print_rows(vec![
                FieldRow::new("Modo", &response.modo),
                FieldRow::new("Nuevo MAE", format_euros(response.nuevo_mae)),
                FieldRow::new(
                    "MAE anterior",
                    response
                        .mae_anterior
                        .map(format_euros)
                        .unwrap_or_else(|| "-".to_string()),
                ),
                FieldRow::new("Filas de entrenamiento", response.filas_entrenamiento),
                FieldRow::new("Filas de evaluación", response.filas_evaluacion),
            ]);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_from_extension() {
        assert_eq!(content_type_for(Path::new("rows.json")), "application/json");
        assert_eq!(content_type_for(Path::new("ROWS.JSON")), "application/json");
        assert_eq!(content_type_for(Path::new("rows.csv")), "text/csv");
        assert_eq!(content_type_for(Path::new("rows")), "text/csv");
    }
}
