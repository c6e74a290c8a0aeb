//! Core data models for the price estimator

use crate::error::{EstimatorError, FieldIssue, Result};
use serde::{Deserialize, Serialize};

pub const ZONA: &str = "zona";
pub const HABITACIONES: &str = "habitaciones";
pub const BANOS: &str = "banos";
pub const TIPOVIVIENDA: &str = "tipovivienda";
pub const METROS: &str = "metros";

/// Ground-truth price column of a training dataset
pub const TARGET_COLUMN: &str = "precio";

/// Versioned feature layout shared by requests, datasets and fitted models
///
/// The column order returned here is the training-time order; feature rows
/// are always built in it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSchema {
    /// zona, habitaciones, banos
    Basic,
    /// zona, habitaciones, banos, tipovivienda, metros
    #[default]
    Full,
}

impl FeatureSchema {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureSchema::Basic => "basic",
            FeatureSchema::Full => "full",
        }
    }

    /// Columns treated as discrete labels
    pub fn categorical_columns(&self) -> &'static [&'static str] {
        match self {
            FeatureSchema::Basic => &[ZONA],
            FeatureSchema::Full => &[ZONA, TIPOVIVIENDA],
        }
    }

    /// Columns treated as numeric quantities
    pub fn numeric_columns(&self) -> &'static [&'static str] {
        match self {
            FeatureSchema::Basic => &[HABITACIONES, BANOS],
            FeatureSchema::Full => &[HABITACIONES, BANOS, METROS],
        }
    }

    /// Every column a training dataset must carry, target included
    pub fn required_columns(&self) -> Vec<&'static str> {
        let mut columns: Vec<&'static str> = self
            .categorical_columns()
            .iter()
            .chain(self.numeric_columns())
            .copied()
            .collect();
        columns.push(TARGET_COLUMN);
        columns
    }
}

impl std::fmt::Display for FeatureSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prediction parameters exactly as received, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawFeatureRequest {
    pub zona: Option<String>,
    pub habitaciones: Option<String>,
    pub banos: Option<String>,
    pub tipovivienda: Option<String>,
    pub metros: Option<String>,
}

/// Validated prediction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRequest {
    pub zona: String,
    pub habitaciones: u32,
    pub banos: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipovivienda: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metros: Option<u32>,
}

impl FeatureRequest {
    /// Validate a raw request against a schema, reporting every bad field at once
    pub fn parse(raw: &RawFeatureRequest, schema: FeatureSchema) -> Result<Self> {
        let mut issues = Vec::new();

        let zona = required_text(raw.zona.as_deref(), ZONA, &mut issues);
        let habitaciones = required_count(raw.habitaciones.as_deref(), HABITACIONES, &mut issues);
        let banos = required_count(raw.banos.as_deref(), BANOS, &mut issues);

        let (tipovivienda, metros) = match schema {
            FeatureSchema::Basic => (None, None),
            FeatureSchema::Full => (
                required_text(raw.tipovivienda.as_deref(), TIPOVIVIENDA, &mut issues),
                required_area(raw.metros.as_deref(), METROS, &mut issues),
            ),
        };

        match (zona, habitaciones, banos) {
            (Some(zona), Some(habitaciones), Some(banos)) if issues.is_empty() => Ok(Self {
                zona,
                habitaciones,
                banos,
                tipovivienda,
                metros,
            }),
            _ => Err(EstimatorError::InvalidRequest(issues)),
        }
    }

    /// Build the single-row feature vector in the schema's column order
    pub fn to_row(&self, schema: FeatureSchema) -> Result<FeatureRow> {
        let categorical = schema
            .categorical_columns()
            .iter()
            .map(|column| match *column {
                ZONA => Ok(self.zona.clone()),
                TIPOVIVIENDA => self
                    .tipovivienda
                    .clone()
                    .ok_or_else(|| {
                        EstimatorError::InvalidRequest(vec![FieldIssue::missing(TIPOVIVIENDA)])
                    }),
                other => Err(EstimatorError::PredictionFailed(format!(
                    "unknown categorical column '{}'",
                    other
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        let numeric = schema
            .numeric_columns()
            .iter()
            .map(|column| match *column {
                HABITACIONES => Ok(f64::from(self.habitaciones)),
                BANOS => Ok(f64::from(self.banos)),
                METROS => self
                    .metros
                    .map(f64::from)
                    .ok_or_else(|| {
                        EstimatorError::InvalidRequest(vec![FieldIssue::missing(METROS)])
                    }),
                other => Err(EstimatorError::PredictionFailed(format!(
                    "unknown numeric column '{}'",
                    other
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(FeatureRow { categorical, numeric })
    }
}

fn present<'a>(value: Option<&'a str>) -> Option<&'a str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn required_text(value: Option<&str>, field: &str, issues: &mut Vec<FieldIssue>) -> Option<String> {
    match present(value) {
        Some(v) => Some(v.to_string()),
        None => {
            issues.push(FieldIssue::missing(field));
            None
        }
    }
}

fn required_count(value: Option<&str>, field: &str, issues: &mut Vec<FieldIssue>) -> Option<u32> {
    let Some(v) = present(value) else {
        issues.push(FieldIssue::missing(field));
        return None;
    };
    match v.parse::<u32>() {
        Ok(n) => Some(n),
        Err(_) => {
            issues.push(FieldIssue::malformed(field, "must be a non-negative integer"));
            None
        }
    }
}

fn required_area(value: Option<&str>, field: &str, issues: &mut Vec<FieldIssue>) -> Option<u32> {
    let Some(v) = present(value) else {
        issues.push(FieldIssue::missing(field));
        return None;
    };
    match v.parse::<u32>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            issues.push(FieldIssue::malformed(field, "must be a positive integer"));
            None
        }
    }
}

/// One model input row: categorical labels and numeric values, each in
/// schema order
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub categorical: Vec<String>,
    pub numeric: Vec<f64>,
}

/// Heuristic price band derived from the artifact's MAE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub low: i64,
    pub high: i64,
}

impl PriceRange {
    pub fn width(&self) -> i64 {
        self.high - self.low
    }
}

/// Outcome of a successful prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    /// Point estimate rounded to two decimals
    pub point_estimate: f64,
    pub range: PriceRange,
    /// MAE of the artifact that produced the estimate
    pub mae: f64,
    pub confidence: f64,
    pub message: String,
    pub inputs: FeatureRequest,
    pub fingerprint: String,
}
