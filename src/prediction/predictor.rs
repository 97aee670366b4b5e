use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Result;
use log::{debug, error, info, warn};

use crate::db::models::{RawReading, ReadingValue};
use crate::error::VitalsError;
use crate::features::{
    parse_blood_pressure_partial, AlignedRow, CanonicalFeature, FeatureAligner, FeatureRow,
    SensorKind,
};

use super::scorer::{LinearModel, Scorer};
use super::types::{ModelStatus, Prediction};

/// Value reported for every prediction while no scorer is available.
pub const NEUTRAL_PREDICTION: f64 = 0.0;

/// Latest value per canonical feature across the whole history window.
///
/// `history` is oldest-first; a composite pressure reading contributes each
/// half that parses on its own.
pub fn merge_history(history: &[RawReading]) -> FeatureRow {
    let mut row = FeatureRow::new();
    let mut put = |feature: CanonicalFeature, value: Option<f64>| {
        if let Some(value) = value {
            row.entry(feature.as_str().to_string())
                .or_insert(ReadingValue::Number(value));
        }
    };

    for reading in history.iter().rev() {
        match (reading.sensor_kind, &reading.value) {
            (SensorKind::BpCombined, ReadingValue::Composite(raw)) => {
                let (systolic, diastolic) = parse_blood_pressure_partial(raw);
                put(CanonicalFeature::BpSystolic, systolic);
                put(CanonicalFeature::BpDiastolic, diastolic);
            }
            (SensorKind::BpCombined, ReadingValue::Number(_)) => {}
            (kind, value) => {
                for feature in kind.features() {
                    put(*feature, value.as_number());
                }
            }
        }
    }

    row
}

pub struct TrendPredictor {
    scorer: Option<Arc<dyn Scorer>>,
    aligner: FeatureAligner,
    status: ModelStatus,
    model_path: Option<PathBuf>,
}

impl TrendPredictor {
    pub fn new(scorer: Option<Arc<dyn Scorer>>) -> Self {
        match scorer {
            Some(scorer) => Self {
                aligner: FeatureAligner::for_schema(scorer.feature_names()),
                status: ModelStatus::Loaded {
                    source: scorer.describe(),
                },
                scorer: Some(scorer),
                model_path: None,
            },
            None => Self::degraded("no scorer configured"),
        }
    }

    pub fn degraded(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        warn!("Trend predictor running in degraded mode: {reason}");
        Self {
            scorer: None,
            aligner: FeatureAligner::default(),
            status: ModelStatus::Degraded { reason },
            model_path: None,
        }
    }

    /// Loads the model artifact; a missing or unreadable artifact is not
    /// fatal and leaves the predictor degraded.
    pub fn from_model_path(path: &Path) -> Self {
        let mut predictor = if !path.exists() {
            Self::degraded(format!("model file not found at {}", path.display()))
        } else {
            match LinearModel::load(path) {
                Ok(model) => {
                    info!("Loaded model artifact from {}", path.display());
                    Self::new(Some(Arc::new(model)))
                }
                Err(err) => Self::degraded(format!("{err:#}")),
            }
        };
        predictor.model_path = Some(path.to_path_buf());
        predictor
    }

    pub fn status(&self) -> &ModelStatus {
        &self.status
    }

    pub fn is_degraded(&self) -> bool {
        self.scorer.is_none()
    }

    /// `ModelUnavailable` for callers that need to warn an operator.
    pub fn model_unavailable(&self) -> Option<VitalsError> {
        match &self.status {
            ModelStatus::Loaded { .. } => None,
            ModelStatus::Degraded { reason } => Some(VitalsError::ModelUnavailable {
                path: self.model_path.clone().unwrap_or_default(),
                reason: reason.clone(),
            }),
        }
    }

    pub fn aligner(&self) -> &FeatureAligner {
        &self.aligner
    }

    pub fn required_features(&self) -> &[String] {
        self.aligner.required_features()
    }

    /// Scores each row; the flag is true when the value is the neutral output.
    pub fn score_rows(&self, rows: &[AlignedRow]) -> Vec<(f64, bool)> {
        let Some(scorer) = &self.scorer else {
            debug!("No model loaded, returning neutral output for {} rows", rows.len());
            return vec![(NEUTRAL_PREDICTION, true); rows.len()];
        };

        rows.iter()
            .map(|row| match scorer.score(row) {
                Ok(value) if value.is_finite() => (value, false),
                Ok(value) => {
                    error!("Scorer returned non-finite value {value}; using neutral output");
                    (NEUTRAL_PREDICTION, true)
                }
                Err(err) => {
                    error!("Scorer failed: {err:#}; using neutral output");
                    (NEUTRAL_PREDICTION, true)
                }
            })
            .collect()
    }

    pub fn predict(&self, rows: &[AlignedRow]) -> Result<Vec<f64>> {
        Ok(self.score_rows(rows).into_iter().map(|(value, _)| value).collect())
    }

    pub fn predict_row(&self, patient_id: &str, row: &FeatureRow) -> Prediction {
        let aligned = self.aligner.align(row);
        let (value, degraded) = self
            .score_rows(std::slice::from_ref(&aligned))
            .into_iter()
            .next()
            .unwrap_or((NEUTRAL_PREDICTION, true));
        Prediction::trend(patient_id, value, degraded)
    }

    /// `None` when there is no history to predict from.
    pub fn predict_trend(&self, patient_id: &str, history: &[RawReading]) -> Option<Prediction> {
        if history.is_empty() {
            debug!("No history for patient {patient_id}; skipping prediction");
            return None;
        }
        let merged = merge_history(history);
        Some(self.predict_row(patient_id, &merged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::types::RiskLevel;

    struct FixedScorer(f64);

    impl Scorer for FixedScorer {
        fn score(&self, _row: &AlignedRow) -> Result<f64> {
            Ok(self.0)
        }
    }

    struct FailingScorer;

    impl Scorer for FailingScorer {
        fn score(&self, _row: &AlignedRow) -> Result<f64> {
            anyhow::bail!("model exploded")
        }
    }

    fn reading(kind: SensorKind, value: impl Into<ReadingValue>) -> RawReading {
        RawReading::new("p1", "dev", kind, value, "")
    }

    #[test]
    fn empty_history_yields_nothing() {
        let predictor = TrendPredictor::new(None);
        assert!(predictor.predict_trend("p1", &[]).is_none());
    }

    #[test]
    fn degraded_mode_is_neutral_and_observable() {
        let predictor = TrendPredictor::new(None);
        assert!(predictor.is_degraded());
        assert!(matches!(predictor.status(), ModelStatus::Degraded { .. }));
        assert!(matches!(
            predictor.model_unavailable(),
            Some(VitalsError::ModelUnavailable { .. })
        ));

        let prediction = predictor
            .predict_trend("p1", &[reading(SensorKind::Ecg, 180.0)])
            .unwrap();
        assert_eq!(prediction.predicted_value, 0.0);
        assert_eq!(prediction.risk, RiskLevel::Normal);
        assert!(prediction.degraded);
    }

    #[test]
    fn risk_follows_scored_value() {
        let at_edge = TrendPredictor::new(Some(Arc::new(FixedScorer(100.0))));
        let above = TrendPredictor::new(Some(Arc::new(FixedScorer(100.01))));
        let history = [reading(SensorKind::Ecg, 75.0)];

        assert_eq!(at_edge.predict_trend("p1", &history).unwrap().risk, RiskLevel::Normal);
        let high = above.predict_trend("p1", &history).unwrap();
        assert_eq!(high.risk, RiskLevel::High);
        assert!(!high.degraded);
    }

    #[test]
    fn scorer_failure_falls_back_to_neutral() {
        let predictor = TrendPredictor::new(Some(Arc::new(FailingScorer)));
        let prediction = predictor
            .predict_trend("p1", &[reading(SensorKind::Ecg, 75.0)])
            .unwrap();
        assert_eq!(prediction.predicted_value, 0.0);
        assert!(prediction.degraded);
    }

    #[test]
    fn merge_takes_latest_value_per_feature_across_sensors() {
        let history = vec![
            reading(SensorKind::Ecg, 65.0),
            reading(SensorKind::BpCombined, "130/85"),
            reading(SensorKind::SpO2, 96.0),
            reading(SensorKind::Ecg, 88.0),
            reading(SensorKind::BpCombined, "abc/79"),
            reading(SensorKind::Other, 4.2),
        ];
        let row = merge_history(&history);
        assert_eq!(row.get("heart_rate"), Some(&ReadingValue::Number(88.0)));
        assert_eq!(row.get("bp_systolic"), Some(&ReadingValue::Number(130.0)));
        assert_eq!(row.get("bp_diastolic"), Some(&ReadingValue::Number(79.0)));
        assert_eq!(row.get("oxygen_saturation"), Some(&ReadingValue::Number(96.0)));
        assert!(row.get("temperature").is_none());
    }

    #[test]
    fn linear_model_sees_aligned_history() {
        let model = LinearModel::new(
            vec!["heart_rate".into(), "temperature".into()],
            vec![1.0, 1.0],
            0.0,
        )
        .unwrap();
        let predictor = TrendPredictor::new(Some(Arc::new(model)));
        assert_eq!(predictor.required_features(), &["heart_rate", "temperature"]);

        let prediction = predictor
            .predict_trend("p1", &[reading(SensorKind::Ecg, 72.0)])
            .unwrap();
        assert!((prediction.predicted_value - 108.5).abs() < 1e-9);
        assert_eq!(prediction.risk, RiskLevel::High);
    }

    #[test]
    fn missing_artifact_degrades_instead_of_failing() {
        let dir = tempfile::tempdir().unwrap();
        let predictor = TrendPredictor::from_model_path(&dir.path().join("absent.json"));
        assert!(predictor.is_degraded());
        match predictor.model_unavailable() {
            Some(VitalsError::ModelUnavailable { path, .. }) => {
                assert!(path.ends_with("absent.json"))
            }
            other => panic!("expected ModelUnavailable, got {other:?}"),
        }
    }
}
