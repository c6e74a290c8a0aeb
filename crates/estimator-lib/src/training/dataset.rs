//! Uploaded training data
//!
//! A dataset is accepted whole or not at all: the first bad column or row
//! rejects the batch before any fitting starts.

use crate::error::{DatasetIssue, Result};
use crate::models::{FeatureRow, FeatureSchema, METROS, TARGET_COLUMN};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::io::Read;

/// Validated rows and targets for one retrain call
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingDataset {
    schema: FeatureSchema,
    rows: Vec<FeatureRow>,
    targets: Vec<f64>,
}

impl TrainingDataset {
    /// Parse CSV with a header row. Extra columns are ignored.
    pub fn from_csv<R: Read>(input: R, schema: FeatureSchema) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(input);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| DatasetIssue::Unreadable(e.to_string()))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();

        let index: HashMap<&str, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.as_str(), i))
            .collect();
        check_columns(schema, |column| index.contains_key(column))?;

        let mut dataset = Self::empty(schema);
        for (i, record) in reader.records().enumerate() {
            let row_number = i + 1;
            let record = record
                .map_err(|e| DatasetIssue::Unreadable(format!("row {}: {}", row_number, e)))?;
            let cell = |column: &str| {
                index
                    .get(column)
                    .and_then(|&idx| record.get(idx))
                    .map(str::to_string)
            };
            dataset.push(row_number, &cell)?;
        }

        dataset.finish()
    }

    /// Parse a single JSON record object or an array of them
    pub fn from_json(value: &Value, schema: FeatureSchema) -> Result<Self> {
        let records: Vec<&serde_json::Map<String, Value>> = match value {
            Value::Object(record) => vec![record],
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    item.as_object().ok_or_else(|| {
                        DatasetIssue::Unreadable(format!("element {} is not a JSON object", i))
                    })
                })
                .collect::<std::result::Result<_, _>>()?,
            _ => {
                return Err(DatasetIssue::Unreadable(
                    "expected a JSON object or an array of objects".to_string(),
                )
                .into())
            }
        };

        let columns: BTreeSet<&str> = records
            .iter()
            .flat_map(|r| r.keys().map(String::as_str))
            .collect();
        check_columns(schema, |column| columns.contains(column))?;

        let mut dataset = Self::empty(schema);
        for (i, record) in records.iter().enumerate() {
            let cell = |column: &str| record.get(column).and_then(json_cell);
            dataset.push(i + 1, &cell)?;
        }

        dataset.finish()
    }

    fn empty(schema: FeatureSchema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
            targets: Vec::new(),
        }
    }

    fn push(&mut self, row_number: usize, cell: &dyn Fn(&str) -> Option<String>) -> Result<()> {
        let categorical = self
            .schema
            .categorical_columns()
            .iter()
            .map(|column| parse_label(row_number, column, cell(column)))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let numeric = self
            .schema
            .numeric_columns()
            .iter()
            .map(|column| {
                if *column == METROS {
                    parse_positive(row_number, column, cell(column))
                } else {
                    parse_count(row_number, column, cell(column))
                }
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let target = parse_positive(row_number, TARGET_COLUMN, cell(TARGET_COLUMN))?;

        self.rows.push(FeatureRow { categorical, numeric });
        self.targets.push(target);
        Ok(())
    }

    fn finish(self) -> Result<Self> {
        if self.rows.is_empty() {
            return Err(DatasetIssue::Empty.into());
        }
        Ok(self)
    }

    pub fn schema(&self) -> FeatureSchema {
        self.schema
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    /// Rows and targets at the given indices
    pub fn select(&self, indices: &[usize]) -> (Vec<FeatureRow>, Vec<f64>) {
        indices
            .iter()
            .filter_map(|&i| Some((self.rows.get(i)?.clone(), *self.targets.get(i)?)))
            .unzip()
    }

    /// Distinct zone labels, sorted
    pub fn zones(&self) -> Vec<String> {
        let zones: BTreeSet<&str> = self
            .rows
            .iter()
            .filter_map(|r| r.categorical.first().map(String::as_str))
            .collect();
        zones.into_iter().map(str::to_string).collect()
    }
}

fn check_columns(
    schema: FeatureSchema,
    has_column: impl Fn(&str) -> bool,
) -> std::result::Result<(), DatasetIssue> {
    let missing: Vec<String> = schema
        .required_columns()
        .into_iter()
        .filter(|column| !has_column(column))
        .map(str::to_string)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(DatasetIssue::MissingColumns(missing))
    }
}

fn json_cell(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn malformed(row: usize, column: &str, reason: &str) -> DatasetIssue {
    DatasetIssue::MalformedRow {
        row,
        column: column.to_string(),
        reason: reason.to_string(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_label(
    row: usize,
    column: &str,
    value: Option<String>,
) -> std::result::Result<String, DatasetIssue> {
    non_empty(value).ok_or_else(|| malformed(row, column, "is missing or empty"))
}

fn parse_number(
    row: usize,
    column: &str,
    value: Option<String>,
) -> std::result::Result<f64, DatasetIssue> {
    let text = non_empty(value).ok_or_else(|| malformed(row, column, "is missing or empty"))?;
    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| malformed(row, column, &format!("is not numeric ('{}')", text)))
}

/// Non-negative whole number; `3` and `3.0` are both accepted
fn parse_count(
    row: usize,
    column: &str,
    value: Option<String>,
) -> std::result::Result<f64, DatasetIssue> {
    let number = parse_number(row, column, value)?;
    if number < 0.0 || number.fract() != 0.0 {
        return Err(malformed(row, column, "must be a non-negative integer"));
    }
    Ok(number)
}

fn parse_positive(
    row: usize,
    column: &str,
    value: Option<String>,
) -> std::result::Result<f64, DatasetIssue> {
    let number = parse_number(row, column, value)?;
    if number <= 0.0 {
        return Err(malformed(row, column, "must be positive"));
    }
    Ok(number)
}
