use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::features::AlignedRow;

/// Scoring capability behind the trend predictor.
pub trait Scorer: Send + Sync {
    fn score(&self, row: &AlignedRow) -> Result<f64>;

    /// Feature schema the scorer was trained on, if it declares one.
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    fn describe(&self) -> String {
        "custom scorer".to_string()
    }
}

/// Linear model artifact stored as JSON.
///
/// ```json
/// { "feature_names": ["heart_rate", "bp_systolic"], "weights": [0.6, 0.4], "intercept": 1.5 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub feature_names: Vec<String>,
    pub weights: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
}

impl LinearModel {
    pub fn new(feature_names: Vec<String>, weights: Vec<f64>, intercept: f64) -> Result<Self> {
        let model = Self {
            feature_names,
            weights,
            intercept,
        };
        model.check()?;
        Ok(model)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read model artifact {}", path.display()))?;
        let model: LinearModel = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse model artifact {}", path.display()))?;
        model.check()?;
        Ok(model)
    }

    fn check(&self) -> Result<()> {
        if self.feature_names.is_empty() {
            bail!("model declares no features");
        }
        if self.feature_names.len() != self.weights.len() {
            bail!(
                "model declares {} features but {} weights",
                self.feature_names.len(),
                self.weights.len()
            );
        }
        if !self.intercept.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            bail!("model contains non-finite coefficients");
        }
        Ok(())
    }
}

impl Scorer for LinearModel {
    fn score(&self, row: &AlignedRow) -> Result<f64> {
        let mut total = self.intercept;
        for (name, weight) in self.feature_names.iter().zip(&self.weights) {
            let value = row
                .get(name)
                .with_context(|| format!("row is missing feature '{name}'"))?;
            total += weight * value;
        }
        Ok(total)
    }

    fn feature_names(&self) -> Option<&[String]> {
        Some(&self.feature_names)
    }

    fn describe(&self) -> String {
        format!("linear model over {} features", self.feature_names.len())
    }
}
