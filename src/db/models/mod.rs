pub mod reading;
pub mod snapshot;

pub use reading::{RawReading, ReadingValue, SensorRecord};
pub use snapshot::FeatureSnapshot;
