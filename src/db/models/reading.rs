//! Raw reading data model.
//!
//! A `RawReading` is one observation from one sensor. Sensor collaborators
//! send loosely shaped `SensorRecord`s; conversion into `RawReading` is the
//! only place where field presence and ranges are checked.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::VitalsError;
use crate::features::SensorKind;

/// Either a plain number or a composite string such as `"120/80"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReadingValue {
    Number(f64),
    Composite(String),
}

impl ReadingValue {
    /// Numeric view; composite strings count only if the whole string is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ReadingValue::Number(value) => Some(*value).filter(|v| v.is_finite()),
            ReadingValue::Composite(raw) => raw.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }
}

impl fmt::Display for ReadingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadingValue::Number(value) => write!(f, "{value}"),
            ReadingValue::Composite(raw) => f.write_str(raw),
        }
    }
}

impl From<f64> for ReadingValue {
    fn from(value: f64) -> Self {
        ReadingValue::Number(value)
    }
}

impl From<&str> for ReadingValue {
    fn from(value: &str) -> Self {
        ReadingValue::Composite(value.to_string())
    }
}

/// Immutable observation as stored in the reading log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    /// Assigned by the store; reflects arrival order.
    pub id: Option<i64>,
    pub patient_id: String,
    pub device_id: String,
    pub sensor_kind: SensorKind,
    pub value: ReadingValue,
    pub unit: String,
    pub quality_score: f64,
    pub timestamp: DateTime<Utc>,
}

impl RawReading {
    pub fn new(
        patient_id: impl Into<String>,
        device_id: impl Into<String>,
        sensor_kind: SensorKind,
        value: impl Into<ReadingValue>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            patient_id: patient_id.into(),
            device_id: device_id.into(),
            sensor_kind,
            value: value.into(),
            unit: unit.into(),
            quality_score: 1.0,
            timestamp: Utc::now(),
        }
    }

    pub fn with_quality(mut self, quality_score: f64) -> Self {
        self.quality_score = quality_score;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn validate(&self) -> Result<(), VitalsError> {
        if self.patient_id.trim().is_empty() {
            return Err(VitalsError::validation("patient_id", "is missing"));
        }
        match &self.value {
            ReadingValue::Number(value) if !value.is_finite() => {
                return Err(VitalsError::validation("value", format!("is not finite ({value})")));
            }
            ReadingValue::Composite(raw) if raw.trim().is_empty() => {
                return Err(VitalsError::validation("value", "is empty"));
            }
            _ => {}
        }
        if !(0.0..=1.0).contains(&self.quality_score) {
            return Err(VitalsError::validation(
                "quality_score",
                format!("{} is outside [0, 1]", self.quality_score),
            ));
        }
        Ok(())
    }
}

/// Reading as delivered by a sensor collaborator, before normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorRecord {
    pub patient_id: Option<String>,
    pub device_id: Option<String>,
    #[serde(alias = "sensor_type")]
    pub sensor_kind: Option<String>,
    pub value: Option<ReadingValue>,
    pub unit: Option<String>,
    pub quality_score: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl SensorRecord {
    pub fn new(
        patient_id: &str,
        device_id: &str,
        sensor_kind: SensorKind,
        value: impl Into<ReadingValue>,
        unit: &str,
    ) -> Self {
        Self {
            patient_id: Some(patient_id.to_string()),
            device_id: Some(device_id.to_string()),
            sensor_kind: Some(sensor_kind.as_str().to_string()),
            value: Some(value.into()),
            unit: Some(unit.to_string()),
            quality_score: None,
            timestamp: None,
        }
    }
}

impl TryFrom<SensorRecord> for RawReading {
    type Error = VitalsError;

    fn try_from(record: SensorRecord) -> Result<Self, Self::Error> {
        let patient_id = record
            .patient_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| VitalsError::validation("patient_id", "is missing"))?;
        let sensor_kind = record
            .sensor_kind
            .filter(|label| !label.trim().is_empty())
            .map(|label| SensorKind::from_label(&label))
            .ok_or_else(|| VitalsError::validation("sensor_kind", "is missing"))?;
        let value = record
            .value
            .ok_or_else(|| VitalsError::validation("value", "is missing"))?;

        let reading = RawReading {
            id: None,
            patient_id,
            device_id: record.device_id.unwrap_or_else(|| "unknown".to_string()),
            sensor_kind,
            value,
            unit: record.unit.unwrap_or_default(),
            quality_score: record.quality_score.unwrap_or(1.0),
            timestamp: record.timestamp.unwrap_or_else(Utc::now),
        };
        reading.validate()?;
        Ok(reading)
    }
}
