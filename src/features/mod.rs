pub mod aligner;
pub mod canonical;
pub mod composite;

pub use aligner::{AlignedRow, FeatureAligner, FeatureRow, BLOOD_PRESSURE_KEY};
pub use canonical::{CanonicalFeature, SensorKind};
pub use composite::{parse_blood_pressure, parse_blood_pressure_partial, BloodPressure};
