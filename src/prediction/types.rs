use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Predicted values strictly above this are classified as high risk.
pub const HIGH_RISK_THRESHOLD: f64 = 100.0;
pub const BASELINE_CONFIDENCE: f64 = 0.85;
pub const BASELINE_UNCERTAINTY: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Normal,
    High,
}

impl RiskLevel {
    pub fn classify(predicted_value: f64) -> Self {
        if predicted_value > HIGH_RISK_THRESHOLD {
            RiskLevel::High
        } else {
            RiskLevel::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Normal => "normal",
            RiskLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub patient_id: String,
    pub prediction_type: String,
    pub predicted_value: f64,
    pub confidence: f64,
    pub uncertainty: f64,
    pub risk: RiskLevel,
    pub produced_at: DateTime<Utc>,
    /// Set when no scorer produced this value and it is the neutral output.
    pub degraded: bool,
}

impl Prediction {
    pub fn trend(patient_id: impl Into<String>, predicted_value: f64, degraded: bool) -> Self {
        Self {
            patient_id: patient_id.into(),
            prediction_type: "trend".to_string(),
            predicted_value,
            confidence: BASELINE_CONFIDENCE,
            uncertainty: BASELINE_UNCERTAINTY,
            risk: RiskLevel::classify(predicted_value),
            produced_at: Utc::now(),
            degraded,
        }
    }

    pub fn is_high_risk(&self) -> bool {
        self.risk == RiskLevel::High
    }
}

/// Whether predictions come from a real model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum ModelStatus {
    Loaded { source: String },
    Degraded { reason: String },
}
