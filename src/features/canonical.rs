use serde::{Deserialize, Serialize};

/// Sensor families that can report a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    #[serde(rename = "ECG")]
    Ecg,
    #[serde(rename = "SpO2")]
    SpO2,
    #[serde(rename = "BP_SYS")]
    BpSystolic,
    #[serde(rename = "BP_DIA")]
    BpDiastolic,
    #[serde(rename = "BP_COMBINED")]
    BpCombined,
    #[serde(rename = "Temp")]
    Temp,
    #[serde(rename = "Other")]
    Other,
}

impl SensorKind {
    pub const ALL: [SensorKind; 7] = [
        SensorKind::Ecg,
        SensorKind::SpO2,
        SensorKind::BpSystolic,
        SensorKind::BpDiastolic,
        SensorKind::BpCombined,
        SensorKind::Temp,
        SensorKind::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::Ecg => "ECG",
            SensorKind::SpO2 => "SpO2",
            SensorKind::BpSystolic => "BP_SYS",
            SensorKind::BpDiastolic => "BP_DIA",
            SensorKind::BpCombined => "BP_COMBINED",
            SensorKind::Temp => "Temp",
            SensorKind::Other => "Other",
        }
    }

    /// Labels nobody recognises become `Other` instead of failing; they are
    /// still logged, they just never touch a feature column.
    pub fn from_label(label: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(label.trim()))
            .unwrap_or(SensorKind::Other)
    }

    /// Feature columns written by a reading of this kind.
    pub fn features(&self) -> &'static [CanonicalFeature] {
        match self {
            SensorKind::Ecg => &[CanonicalFeature::HeartRate],
            SensorKind::SpO2 => &[CanonicalFeature::OxygenSaturation],
            SensorKind::BpSystolic => &[CanonicalFeature::BpSystolic],
            SensorKind::BpDiastolic => &[CanonicalFeature::BpDiastolic],
            SensorKind::BpCombined => &[CanonicalFeature::BpSystolic, CanonicalFeature::BpDiastolic],
            SensorKind::Temp => &[CanonicalFeature::Temperature],
            SensorKind::Other => &[],
        }
    }
}

/// Fixed model-input vital dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalFeature {
    HeartRate,
    BpSystolic,
    BpDiastolic,
    OxygenSaturation,
    Temperature,
}

impl CanonicalFeature {
    pub const ALL: [CanonicalFeature; 5] = [
        CanonicalFeature::HeartRate,
        CanonicalFeature::BpSystolic,
        CanonicalFeature::BpDiastolic,
        CanonicalFeature::OxygenSaturation,
        CanonicalFeature::Temperature,
    ];

    /// Column name in the snapshot table and feature name in model schemas.
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalFeature::HeartRate => "heart_rate",
            CanonicalFeature::BpSystolic => "bp_systolic",
            CanonicalFeature::BpDiastolic => "bp_diastolic",
            CanonicalFeature::OxygenSaturation => "oxygen_saturation",
            CanonicalFeature::Temperature => "temperature",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|feature| feature.as_str() == name)
    }

    /// Physiologically neutral value used when a feature is missing.
    pub fn neutral_default(&self) -> f64 {
        match self {
            CanonicalFeature::HeartRate => 70.0,
            CanonicalFeature::BpSystolic => 120.0,
            CanonicalFeature::BpDiastolic => 80.0,
            CanonicalFeature::OxygenSaturation => 98.0,
            CanonicalFeature::Temperature => 36.5,
        }
    }
}
