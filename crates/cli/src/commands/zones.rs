//! Zone listing command

use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use estimator_lib::{FeatureSchema, TrainingDataset};
use serde_json::Value;
use tabled::Tabled;

use crate::output::{print_json, print_rows, OutputFormat};

#[derive(Tabled)]
struct ZoneRow {
    #[tabled(rename = "Zona")]
    zona: String,
}

/// Print the sorted distinct zone names of a training CSV or a GeoJSON map
pub fn list_zones(data: Option<&Path>, geojson: Option<&Path>, format: OutputFormat) -> Result<()> {
    let zones = match (data, geojson) {
        (Some(path), _) => zones_from_csv(path)?,
        (None, Some(path)) => zones_from_geojson(path)?,
        (None, None) => anyhow::bail!("either --data or --geojson is required"),
    };

    match format {
        OutputFormat::Json => print_json(&zones)?,
        OutputFormat::Table => {
            print_rows(zones.into_iter().map(|zona| ZoneRow { zona }).collect());
        }
    }

    Ok(())
}

fn zones_from_csv(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let dataset = TrainingDataset::from_csv(BufReader::new(file), FeatureSchema::Basic)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    Ok(dataset.zones())
}

fn zones_from_geojson(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let map: Value = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    geojson_zone_names(&map)
}

/// `features[].properties.NOMBRE`, as the map front-end labels districts
fn geojson_zone_names(map: &Value) -> Result<Vec<String>> {
    let features = map
        .get("features")
        .and_then(Value::as_array)
        .context("GeoJSON has no features array")?;

    let names: BTreeSet<String> = features
        .iter()
        .filter_map(|feature| feature.pointer("/properties/NOMBRE")?.as_str())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();

    Ok(names.into_iter().collect())
}
