use std::{
    collections::{BTreeMap, HashMap},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::db::models::FeatureSnapshot;
use crate::features::CanonicalFeature;

use super::bands::{default_band, Band, Severity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEntry {
    pub feature: CanonicalFeature,
    pub observed_value: f64,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub patient_id: String,
    pub entries: Vec<AlertEntry>,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    pub fn is_active(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn highest_severity(&self) -> Option<Severity> {
        self.entries.iter().map(|entry| entry.severity).max()
    }

    /// One line per entry, e.g. `heart_rate out of range: 112 (critical)`.
    pub fn describe(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| {
                let severity = match entry.severity {
                    Severity::Warning => "warning",
                    Severity::Critical => "critical",
                };
                format!(
                    "{} out of range: {} ({severity})",
                    entry.feature.as_str(),
                    entry.observed_value
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlertStatistics {
    pub active_alerts: usize,
    pub patients_evaluated: usize,
}

/// Compares snapshots against fixed bands and keeps the latest alert set
/// per patient.
pub struct AlertEvaluator {
    bands: BTreeMap<CanonicalFeature, Band>,
    latest: RwLock<HashMap<String, Alert>>,
}

impl Default for AlertEvaluator {
    fn default() -> Self {
        Self::with_bands(
            CanonicalFeature::ALL
                .into_iter()
                .map(|feature| (feature, default_band(feature)))
                .collect(),
        )
    }
}

impl AlertEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bands(bands: BTreeMap<CanonicalFeature, Band>) -> Self {
        Self {
            bands,
            latest: RwLock::new(HashMap::new()),
        }
    }

    pub fn band(&self, feature: CanonicalFeature) -> Option<&Band> {
        self.bands.get(&feature)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Alert>> {
        match self.latest.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Alert>> {
        match self.latest.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Classifies every present feature; the result replaces the patient's
    /// previous alert set even when it has no entries.
    pub fn evaluate(&self, snapshot: &FeatureSnapshot) -> Alert {
        let entries: Vec<AlertEntry> = snapshot
            .present()
            .filter_map(|(feature, value)| {
                let severity = self.bands.get(&feature)?.classify(value)?;
                Some(AlertEntry {
                    feature,
                    observed_value: value,
                    severity,
                })
            })
            .collect();

        let alert = Alert {
            patient_id: snapshot.patient_id.clone(),
            entries,
            raised_at: Utc::now(),
        };

        match alert.highest_severity() {
            Some(Severity::Critical) => warn!(
                "Critical vitals for patient {}: {}",
                alert.patient_id,
                alert.describe().join("; ")
            ),
            Some(Severity::Warning) => info!(
                "Borderline vitals for patient {}: {}",
                alert.patient_id,
                alert.describe().join("; ")
            ),
            None => {}
        }

        self.write()
            .insert(alert.patient_id.clone(), alert.clone());
        alert
    }

    pub fn latest(&self, patient_id: &str) -> Option<Alert> {
        self.read().get(patient_id).cloned()
    }

    pub fn get_statistics(&self) -> AlertStatistics {
        let latest = self.read();
        AlertStatistics {
            active_alerts: latest.values().filter(|alert| alert.is_active()).count(),
            patients_evaluated: latest.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(patient_id: &str, values: &[(CanonicalFeature, f64)]) -> FeatureSnapshot {
        let mut snapshot = FeatureSnapshot::empty(patient_id);
        for (feature, value) in values {
            snapshot.set(*feature, Some(*value));
        }
        snapshot
    }

    #[test]
    fn heart_rate_band_edges() {
        let evaluator = AlertEvaluator::new();
        for (value, expected) in [
            (100.0, None),
            (101.0, Some(Severity::Warning)),
            (111.0, Some(Severity::Critical)),
        ] {
            let alert =
                evaluator.evaluate(&snapshot_with("p1", &[(CanonicalFeature::HeartRate, value)]));
            assert_eq!(alert.highest_severity(), expected, "heart_rate={value}");
        }
    }

    #[test]
    fn missing_features_raise_nothing() {
        let evaluator = AlertEvaluator::new();
        let alert = evaluator.evaluate(&FeatureSnapshot::empty("p1"));
        assert!(alert.entries.is_empty());
    }

    #[test]
    fn entries_follow_canonical_order() {
        let evaluator = AlertEvaluator::new();
        let alert = evaluator.evaluate(&snapshot_with(
            "p1",
            &[
                (CanonicalFeature::Temperature, 39.5),
                (CanonicalFeature::HeartRate, 105.0),
                (CanonicalFeature::OxygenSaturation, 97.0),
            ],
        ));
        let features: Vec<_> = alert.entries.iter().map(|e| e.feature).collect();
        assert_eq!(
            features,
            vec![CanonicalFeature::HeartRate, CanonicalFeature::Temperature]
        );
        assert_eq!(alert.entries[1].severity, Severity::Critical);
        assert_eq!(alert.describe()[0], "heart_rate out of range: 105 (warning)");
    }

    #[test]
    fn latest_evaluation_replaces_previous() {
        let evaluator = AlertEvaluator::new();
        evaluator.evaluate(&snapshot_with("p1", &[(CanonicalFeature::HeartRate, 130.0)]));
        evaluator.evaluate(&snapshot_with("p2", &[(CanonicalFeature::HeartRate, 45.0)]));
        assert_eq!(evaluator.get_statistics().active_alerts, 2);

        evaluator.evaluate(&snapshot_with("p1", &[(CanonicalFeature::HeartRate, 75.0)]));
        let stats = evaluator.get_statistics();
        assert_eq!(stats.active_alerts, 1);
        assert_eq!(stats.patients_evaluated, 2);
        assert!(evaluator.latest("p1").unwrap().entries.is_empty());
    }
}
