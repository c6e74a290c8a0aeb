//! Linear price model over one-hot categorical and standardized numeric terms
//!
//! Fitting is full-batch gradient descent with an L2 penalty. Each step is
//! divided by the diagonal of the loss curvature (the share of rows carrying
//! a category level, or the mean squared scaled value of a numeric column),
//! which keeps rare neighborhoods learning at the same pace as common ones.
//! Everything is deterministic: no sampling, fixed epoch count.

use super::Regressor;
use crate::models::{FeatureRow, FeatureSchema};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Curvature below this is treated as a column with no signal in the batch
const MIN_CURVATURE: f64 = 1e-12;

/// Hyperparameters for gradient descent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    /// Must stay below 2 / (number of feature groups + 1) to converge
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_l2")]
    pub l2: f64,
}

fn default_epochs() -> usize {
    400
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_l2() -> f64 {
    1e-3
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            epochs: default_epochs(),
            learning_rate: default_learning_rate(),
            l2: default_l2(),
        }
    }
}

impl TrainingParams {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            bail!("epochs must be positive");
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 0.3) {
            bail!("learning_rate must be in (0, 0.3], got {}", self.learning_rate);
        }
        if !(self.l2 >= 0.0 && self.l2.is_finite()) {
            bail!("l2 must be a non-negative number, got {}", self.l2);
        }
        Ok(())
    }
}

/// Per-level weights for one categorical column. Unseen levels weigh 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalTerm {
    pub column: String,
    pub levels: BTreeMap<String, f64>,
}

/// Standardization and weight for one numeric column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericTerm {
    pub column: String,
    pub mean: f64,
    pub scale: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegressor {
    pub categorical: Vec<CategoricalTerm>,
    pub numeric: Vec<NumericTerm>,
    pub intercept: f64,
    pub target_mean: f64,
    pub target_scale: f64,
    pub samples_seen: usize,
}

impl LinearRegressor {
    /// Fit from scratch. Scaling statistics come from this batch.
    pub fn fit(
        schema: FeatureSchema,
        rows: &[FeatureRow],
        targets: &[f64],
        params: &TrainingParams,
    ) -> Result<Self> {
        params.validate()?;

        let numeric = schema
            .numeric_columns()
            .iter()
            .enumerate()
            .map(|(j, column)| {
                let values: Vec<f64> = rows.iter().map(|r| r.numeric[j]).collect();
                let (mean, scale) = mean_and_scale(&values);
                NumericTerm {
                    column: column.to_string(),
                    mean,
                    scale,
                    weight: 0.0,
                }
            })
            .collect();

        let categorical = schema
            .categorical_columns()
            .iter()
            .enumerate()
            .map(|(c, column)| CategoricalTerm {
                column: column.to_string(),
                levels: rows
                    .iter()
                    .map(|r| (r.categorical[c].clone(), 0.0))
                    .collect(),
            })
            .collect();

        let (target_mean, target_scale) = mean_and_scale(targets);

        let mut model = Self {
            categorical,
            numeric,
            intercept: 0.0,
            target_mean,
            target_scale,
            samples_seen: 0,
        };
        model.descend(rows, targets, params);
        model.check_finite()?;
        Ok(model)
    }

    /// Warm start: keep scaling, add new category levels, continue descent
    /// from the current weights on the new batch only
    pub fn continue_fit(
        &self,
        rows: &[FeatureRow],
        targets: &[f64],
        params: &TrainingParams,
    ) -> Result<Self> {
        params.validate()?;

        let mut model = self.clone();
        for row in rows {
            for (term, level) in model.categorical.iter_mut().zip(&row.categorical) {
                term.levels.entry(level.clone()).or_insert(0.0);
            }
        }
        model.descend(rows, targets, params);
        model.check_finite()?;
        Ok(model)
    }

    pub fn validate(&self, schema: FeatureSchema) -> Result<()> {
        let categorical: Vec<&str> = self.categorical.iter().map(|t| t.column.as_str()).collect();
        let numeric: Vec<&str> = self.numeric.iter().map(|t| t.column.as_str()).collect();
        if categorical != schema.categorical_columns() || numeric != schema.numeric_columns() {
            bail!(
                "model columns {:?} + {:?} do not match the {} schema",
                categorical,
                numeric,
                schema
            );
        }
        if self.numeric.iter().any(|t| !(t.scale > 0.0)) || !(self.target_scale > 0.0) {
            bail!("model scaling factors must be positive");
        }
        self.check_finite()
    }

    fn check_finite(&self) -> Result<()> {
        let finite = self.intercept.is_finite()
            && self.target_mean.is_finite()
            && self.target_scale.is_finite()
            && self
                .numeric
                .iter()
                .all(|t| t.mean.is_finite() && t.scale.is_finite() && t.weight.is_finite())
            && self
                .categorical
                .iter()
                .all(|t| t.levels.values().all(|w| w.is_finite()));
        if !finite {
            bail!("model parameters are not finite");
        }
        Ok(())
    }

    fn scale_numeric(&self, values: &[f64]) -> Vec<f64> {
        self.numeric
            .iter()
            .zip(values)
            .map(|(term, x)| (x - term.mean) / term.scale)
            .collect()
    }

    /// Output in standardized target units
    fn scaled_output(&self, categorical: &[String], scaled_numeric: &[f64]) -> f64 {
        let categorical_part: f64 = self
            .categorical
            .iter()
            .zip(categorical)
            .map(|(term, level)| term.levels.get(level).copied().unwrap_or(0.0))
            .sum();
        let numeric_part: f64 = self
            .numeric
            .iter()
            .zip(scaled_numeric)
            .map(|(term, x)| term.weight * x)
            .sum();
        self.intercept + categorical_part + numeric_part
    }

    fn descend(&mut self, rows: &[FeatureRow], targets: &[f64], params: &TrainingParams) {
        let n = rows.len() as f64;
        let lr = params.learning_rate;
        let l2 = params.l2;

        let scaled_targets: Vec<f64> = targets
            .iter()
            .map(|y| (y - self.target_mean) / self.target_scale)
            .collect();
        let scaled_numeric: Vec<Vec<f64>> =
            rows.iter().map(|r| self.scale_numeric(&r.numeric)).collect();

        let numeric_curvature: Vec<f64> = (0..self.numeric.len())
            .map(|j| scaled_numeric.iter().map(|x| x[j] * x[j]).sum::<f64>() / n)
            .collect();

        let mut level_share: Vec<HashMap<&str, f64>> = vec![HashMap::new(); self.categorical.len()];
        for row in rows {
            for (c, level) in row.categorical.iter().enumerate() {
                *level_share[c].entry(level.as_str()).or_default() += 1.0 / n;
            }
        }

        for _ in 0..params.epochs {
            let residuals: Vec<f64> = rows
                .iter()
                .zip(&scaled_numeric)
                .zip(&scaled_targets)
                .map(|((row, x), y)| self.scaled_output(&row.categorical, x) - y)
                .collect();

            let mean_residual = residuals.iter().sum::<f64>() / n;

            let numeric_grads: Vec<f64> = (0..self.numeric.len())
                .map(|j| {
                    residuals
                        .iter()
                        .zip(&scaled_numeric)
                        .map(|(r, x)| r * x[j])
                        .sum::<f64>()
                        / n
                })
                .collect();

            let mut level_grads: Vec<HashMap<&str, f64>> =
                vec![HashMap::new(); self.categorical.len()];
            for (row, r) in rows.iter().zip(&residuals) {
                for (c, level) in row.categorical.iter().enumerate() {
                    *level_grads[c].entry(level.as_str()).or_default() += r / n;
                }
            }

            self.intercept -= lr * mean_residual;

            for (j, term) in self.numeric.iter_mut().enumerate() {
                let curvature = numeric_curvature[j];
                if curvature < MIN_CURVATURE {
                    continue;
                }
                term.weight -= lr * (numeric_grads[j] + l2 * term.weight) / (curvature + l2);
            }

            for (c, term) in self.categorical.iter_mut().enumerate() {
                for (level, grad) in &level_grads[c] {
                    let share = level_share[c].get(level).copied().unwrap_or(0.0);
                    if let Some(weight) = term.levels.get_mut(*level) {
                        *weight -= lr * (grad + l2 * *weight) / (share + l2);
                    }
                }
            }
        }

        self.samples_seen += rows.len();
    }
}

impl Regressor for LinearRegressor {
    fn predict(&self, row: &FeatureRow) -> Result<f64> {
        if row.categorical.len() != self.categorical.len()
            || row.numeric.len() != self.numeric.len()
        {
            bail!(
                "feature row has {} categorical and {} numeric values, model expects {} and {}",
                row.categorical.len(),
                row.numeric.len(),
                self.categorical.len(),
                self.numeric.len()
            );
        }
        let scaled = self.scale_numeric(&row.numeric);
        Ok(self.target_mean + self.target_scale * self.scaled_output(&row.categorical, &scaled))
    }
}

/// Mean and population standard deviation; constant columns get scale 1
fn mean_and_scale(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 1.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();
    if std > MIN_CURVATURE {
        (mean, std)
    } else {
        (mean, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(zona: &str, metros: f64) -> FeatureRow {
        FeatureRow {
            categorical: vec![zona.to_string(), "Piso".to_string()],
            numeric: vec![3.0, 2.0, metros],
        }
    }

    /// price = 3000 * metros, plus 50000 in Salamanca
    fn dataset(zonas: &[&str]) -> (Vec<FeatureRow>, Vec<f64>) {
        let mut rows = Vec::new();
        let mut targets = Vec::new();
        for zona in zonas {
            for metros in (40..=130).step_by(10) {
                let metros = metros as f64;
                rows.push(row(zona, metros));
                let premium = if *zona == "Salamanca" { 50_000.0 } else { 0.0 };
                targets.push(3000.0 * metros + premium);
            }
        }
        (rows, targets)
    }

    #[test]
    fn test_fit_recovers_linear_relationship() {
        let (rows, targets) = dataset(&["Tetuán", "Salamanca"]);
        let model =
            LinearRegressor::fit(FeatureSchema::Full, &rows, &targets, &TrainingParams::default())
                .unwrap();

        let tetuan = model.predict(&row("Tetuán", 90.0)).unwrap();
        let salamanca = model.predict(&row("Salamanca", 90.0)).unwrap();

        assert!((tetuan - 270_000.0).abs() / 270_000.0 < 0.02, "got {}", tetuan);
        assert!((salamanca - 320_000.0).abs() / 320_000.0 < 0.02, "got {}", salamanca);
        assert!(salamanca > tetuan);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (rows, targets) = dataset(&["Tetuán", "Salamanca"]);
        let params = TrainingParams::default();
        let a = LinearRegressor::fit(FeatureSchema::Full, &rows, &targets, &params).unwrap();
        let b = LinearRegressor::fit(FeatureSchema::Full, &rows, &targets, &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unseen_level_contributes_nothing() {
        let (rows, targets) = dataset(&["Tetuán"]);
        let model =
            LinearRegressor::fit(FeatureSchema::Full, &rows, &targets, &TrainingParams::default())
                .unwrap();
        let prediction = model.predict(&row("Vallecas", 90.0)).unwrap();
        assert!(prediction.is_finite());
    }

    #[test]
    fn test_continue_fit_learns_new_level() {
        let params = TrainingParams::default();
        let (rows, targets) = dataset(&["Tetuán"]);
        let model = LinearRegressor::fit(FeatureSchema::Full, &rows, &targets, &params).unwrap();
        let before = model.predict(&row("Salamanca", 90.0)).unwrap();

        let (new_rows, new_targets) = dataset(&["Salamanca"]);
        let updated = model.continue_fit(&new_rows, &new_targets, &params).unwrap();
        let after = updated.predict(&row("Salamanca", 90.0)).unwrap();

        assert!(updated.categorical[0].levels.contains_key("Salamanca"));
        assert!(after > before);
        assert_eq!(updated.samples_seen, rows.len() + new_rows.len());
        // scaling is frozen from the first fit
        assert_eq!(updated.numeric[2].mean, model.numeric[2].mean);
    }

    #[test]
    fn test_predict_rejects_wrong_shape() {
        let (rows, targets) = dataset(&["Tetuán"]);
        let model =
            LinearRegressor::fit(FeatureSchema::Full, &rows, &targets, &TrainingParams::default())
                .unwrap();
        let short = FeatureRow {
            categorical: vec!["Tetuán".into()],
            numeric: vec![3.0, 2.0],
        };
        assert!(model.predict(&short).is_err());
    }

    #[test]
    fn test_validate_checks_schema_layout() {
        let (rows, targets) = dataset(&["Tetuán"]);
        let model =
            LinearRegressor::fit(FeatureSchema::Full, &rows, &targets, &TrainingParams::default())
                .unwrap();
        assert!(model.validate(FeatureSchema::Full).is_ok());
        assert!(model.validate(FeatureSchema::Basic).is_err());

        let mut broken = model.clone();
        broken.intercept = f64::NAN;
        assert!(broken.validate(FeatureSchema::Full).is_err());
    }

    #[test]
    fn test_params_validation() {
        assert!(TrainingParams::default().validate().is_ok());
        let bad = TrainingParams {
            learning_rate: 1.5,
            ..TrainingParams::default()
        };
        assert!(bad.validate().is_err());
        let bad = TrainingParams {
            epochs: 0,
            ..TrainingParams::default()
        };
        assert!(bad.validate().is_err());
    }
}
