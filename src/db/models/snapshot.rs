//! Per-patient feature snapshot.
//!
//! One row per patient holding the latest value of each canonical feature.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::features::{CanonicalFeature, FeatureRow, SensorKind};

use super::ReadingValue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub patient_id: String,
    pub heart_rate: Option<f64>,
    pub bp_systolic: Option<f64>,
    pub bp_diastolic: Option<f64>,
    pub oxygen_saturation: Option<f64>,
    pub temperature: Option<f64>,
    /// Timestamp of the reading that last changed a column.
    pub updated_at: Option<DateTime<Utc>>,
    /// Sensor of the reading that last changed a column.
    pub last_sensor: Option<SensorKind>,
}

impl FeatureSnapshot {
    pub fn empty(patient_id: impl Into<String>) -> Self {
        Self {
            patient_id: patient_id.into(),
            heart_rate: None,
            bp_systolic: None,
            bp_diastolic: None,
            oxygen_saturation: None,
            temperature: None,
            updated_at: None,
            last_sensor: None,
        }
    }

    pub fn get(&self, feature: CanonicalFeature) -> Option<f64> {
        match feature {
            CanonicalFeature::HeartRate => self.heart_rate,
            CanonicalFeature::BpSystolic => self.bp_systolic,
            CanonicalFeature::BpDiastolic => self.bp_diastolic,
            CanonicalFeature::OxygenSaturation => self.oxygen_saturation,
            CanonicalFeature::Temperature => self.temperature,
        }
    }

    pub fn set(&mut self, feature: CanonicalFeature, value: Option<f64>) {
        let slot = match feature {
            CanonicalFeature::HeartRate => &mut self.heart_rate,
            CanonicalFeature::BpSystolic => &mut self.bp_systolic,
            CanonicalFeature::BpDiastolic => &mut self.bp_diastolic,
            CanonicalFeature::OxygenSaturation => &mut self.oxygen_saturation,
            CanonicalFeature::Temperature => &mut self.temperature,
        };
        *slot = value;
    }

    /// Features with a value, in canonical order.
    pub fn present(&self) -> impl Iterator<Item = (CanonicalFeature, f64)> + '_ {
        CanonicalFeature::ALL
            .into_iter()
            .filter_map(|feature| self.get(feature).map(|value| (feature, value)))
    }

    pub fn to_feature_row(&self) -> FeatureRow {
        self.present()
            .map(|(feature, value)| (feature.as_str().to_string(), ReadingValue::Number(value)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_row_contains_only_present_columns() {
        let mut snapshot = FeatureSnapshot::empty("p1");
        snapshot.set(CanonicalFeature::HeartRate, Some(72.0));
        snapshot.set(CanonicalFeature::Temperature, Some(37.1));

        let row = snapshot.to_feature_row();
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("heart_rate"), Some(&ReadingValue::Number(72.0)));
        assert!(row.get("bp_systolic").is_none());
    }
}
