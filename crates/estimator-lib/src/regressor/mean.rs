//! Mean-of-target baseline regressor

use super::Regressor;
use crate::models::FeatureRow;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Predicts the mean training price regardless of features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanRegressor {
    pub value: f64,
    pub samples_seen: usize,
}

impl MeanRegressor {
    /// A regressor that always answers `value`
    pub fn constant(value: f64) -> Self {
        Self {
            value,
            samples_seen: 0,
        }
    }

    pub fn fit(targets: &[f64]) -> Result<Self> {
        if targets.is_empty() {
            bail!("cannot fit on an empty batch");
        }
        let value = targets.iter().sum::<f64>() / targets.len() as f64;
        let model = Self {
            value,
            samples_seen: targets.len(),
        };
        model.validate()?;
        Ok(model)
    }

    /// Running mean weighted by the number of samples already seen
    pub fn continue_fit(&self, targets: &[f64]) -> Result<Self> {
        if targets.is_empty() {
            bail!("cannot fit on an empty batch");
        }
        let seen = self.samples_seen as f64;
        let total = seen + targets.len() as f64;
        let value = (self.value * seen + targets.iter().sum::<f64>()) / total;
        let model = Self {
            value,
            samples_seen: self.samples_seen + targets.len(),
        };
        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.value.is_finite() {
            bail!("mean regressor value is not finite");
        }
        Ok(())
    }
}

impl Regressor for MeanRegressor {
    fn predict(&self, _row: &FeatureRow) -> Result<f64> {
        Ok(self.value)
    }
}
