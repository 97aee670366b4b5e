use serde::{Deserialize, Serialize};

use crate::features::CanonicalFeature;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

/// Inclusive numeric range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub low: f64,
    pub high: f64,
}

impl Range {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value <= self.high
    }
}

/// Safe and borderline ranges for one feature. Both ends of both ranges are
/// inclusive: a value sitting exactly on an edge belongs to the range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub safe: Range,
    pub borderline: Range,
}

impl Band {
    pub const fn new(safe: (f64, f64), borderline: (f64, f64)) -> Self {
        Self {
            safe: Range::new(safe.0, safe.1),
            borderline: Range::new(borderline.0, borderline.1),
        }
    }

    /// `None` means the value is safe.
    pub fn classify(&self, value: f64) -> Option<Severity> {
        if self.safe.contains(value) {
            None
        } else if self.borderline.contains(value) {
            Some(Severity::Warning)
        } else {
            Some(Severity::Critical)
        }
    }
}

pub fn default_band(feature: CanonicalFeature) -> Band {
    match feature {
        CanonicalFeature::HeartRate => Band::new((60.0, 100.0), (50.0, 110.0)),
        CanonicalFeature::BpSystolic => Band::new((90.0, 120.0), (80.0, 140.0)),
        CanonicalFeature::BpDiastolic => Band::new((60.0, 80.0), (50.0, 90.0)),
        CanonicalFeature::OxygenSaturation => Band::new((95.0, 100.0), (90.0, 100.0)),
        CanonicalFeature::Temperature => Band::new((36.1, 37.5), (35.0, 38.5)),
    }
}
