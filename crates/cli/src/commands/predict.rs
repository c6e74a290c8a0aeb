//! Price estimate command

use anyhow::Result;

use crate::client::{ApiClient, PredictResponse};
use crate::output::{format_euros, print_json, print_rows, FieldRow, OutputFormat};

/// Feature values as given on the command line
#[derive(Debug, Clone)]
pub struct PredictArgs {
    pub zona: String,
    pub habitaciones: u32,
    pub banos: u32,
    pub tipovivienda: Option<String>,
    pub metros: Option<u32>,
}

impl PredictArgs {
    /// Query string pairs; optional fields are only sent when given
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("zona", self.zona.clone()),
            ("habitaciones", self.habitaciones.to_string()),
            ("banos", self.banos.to_string()),
        ];
        if let Some(tipovivienda) = &self.tipovivienda {
            query.push(("tipovivienda", tipovivienda.clone()));
        }
        if let Some(metros) = self.metros {
            query.push(("metros", metros.to_string()));
        }
        query
    }
}

/// Ask the service for a price estimate
pub async fn predict(client: &ApiClient, args: &PredictArgs, format: OutputFormat) -> Result<()> {
    let response: PredictResponse = client.get("predict", &args.query()).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => {
            println!("{}", response.mensaje);
            print_rows(estimate_rows(&response));
        }
    }

    Ok(())
}

fn estimate_rows(response: &PredictResponse) -> Vec<FieldRow> {
    let mut rows = vec![
        FieldRow::new("Zona", &response.zona),
        FieldRow::new("Habitaciones", response.habitaciones),
        FieldRow::new("Baños", response.banos),
    ];
    if let Some(tipovivienda) = &response.tipovivienda {
        rows.push(FieldRow::new("Tipo de vivienda", tipovivienda));
    }
    if let Some(metros) = response.metros {
        rows.push(FieldRow::new("Metros", format!("{} m²", metros)));
    }
    rows.push(FieldRow::new("Precio estimado", format_euros(response.prediccion_precio)));
    rows.push(FieldRow::new(
        "Rango",
        format!(
            "{} - {}",
            format_euros(response.rango_min as f64),
            format_euros(response.rango_max as f64)
        ),
    ));
    rows.push(FieldRow::new("MAE", format_euros(response.mae)));
    rows.push(FieldRow::new(
        "Confianza",
        format!("{:.0}%", response.confianza * 100.0),
    ));
    rows
}
