pub mod bands;
pub mod evaluator;

pub use bands::{default_band, Band, Range, Severity};
pub use evaluator::{Alert, AlertEntry, AlertEvaluator, AlertStatistics};
