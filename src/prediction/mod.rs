pub mod predictor;
pub mod scorer;
pub mod types;

pub use predictor::{merge_history, TrendPredictor, NEUTRAL_PREDICTION};
pub use scorer::{LinearModel, Scorer};
pub use types::{ModelStatus, Prediction, RiskLevel};
