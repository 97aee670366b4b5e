use std::collections::HashMap;

use log::debug;
use serde::Serialize;

use crate::db::models::ReadingValue;

use super::canonical::CanonicalFeature;
use super::composite::parse_blood_pressure_lenient;

/// Loosely shaped feature values keyed by feature name.
pub type FeatureRow = HashMap<String, ReadingValue>;

/// Key under which an unsplit "sys/dia" value may arrive in a feature row.
pub const BLOOD_PRESSURE_KEY: &str = "blood_pressure";

/// Model input: exactly the required features, in declared order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedRow {
    pub names: Vec<String>,
    pub values: Vec<f64>,
}

impl AlignedRow {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|idx| self.values.get(idx).copied())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.names.iter().map(String::as_str).zip(self.values.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Maps loosely shaped rows onto the feature schema a model expects.
#[derive(Debug, Clone)]
pub struct FeatureAligner {
    required: Vec<String>,
}

impl Default for FeatureAligner {
    fn default() -> Self {
        Self {
            required: CanonicalFeature::ALL
                .iter()
                .map(|feature| feature.as_str().to_string())
                .collect(),
        }
    }
}

impl FeatureAligner {
    /// Uses the model's declared schema when there is a non-empty one.
    pub fn for_schema(schema: Option<&[String]>) -> Self {
        match schema {
            Some(names) if !names.is_empty() => Self {
                required: names.to_vec(),
            },
            _ => Self::default(),
        }
    }

    pub fn required_features(&self) -> &[String] {
        &self.required
    }

    pub fn align(&self, row: &FeatureRow) -> AlignedRow {
        let values = self
            .required
            .iter()
            .map(|name| {
                row.get(name)
                    .and_then(|value| resolve(name, value))
                    .or_else(|| from_combined_pressure(name, row))
                    .unwrap_or_else(|| neutral_default(name))
            })
            .collect();

        AlignedRow {
            names: self.required.clone(),
            values,
        }
    }
}

fn resolve(name: &str, value: &ReadingValue) -> Option<f64> {
    if let Some(number) = value.as_number() {
        return Some(number);
    }
    let ReadingValue::Composite(raw) = value else {
        return None;
    };
    if !raw.contains('/') {
        return None;
    }
    let bp = parse_blood_pressure_lenient(raw);
    match CanonicalFeature::from_name(name) {
        Some(CanonicalFeature::BpSystolic) => Some(bp.systolic),
        Some(CanonicalFeature::BpDiastolic) => Some(bp.diastolic),
        _ => None,
    }
}

fn from_combined_pressure(name: &str, row: &FeatureRow) -> Option<f64> {
    let feature = CanonicalFeature::from_name(name)?;
    if !matches!(feature, CanonicalFeature::BpSystolic | CanonicalFeature::BpDiastolic) {
        return None;
    }
    match row.get(BLOOD_PRESSURE_KEY)? {
        value @ ReadingValue::Composite(_) => resolve(name, value),
        ReadingValue::Number(_) => None,
    }
}

fn neutral_default(name: &str) -> f64 {
    match CanonicalFeature::from_name(name) {
        Some(feature) => feature.neutral_default(),
        None => {
            // Features outside the canonical set have no physiological baseline.
            debug!("no neutral default for model feature '{name}', using 0");
            0.0
        }
    }
}
