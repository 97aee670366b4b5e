//! Error taxonomy for the vitals core.
//!
//! Validation and parse problems are recovered close to where they happen.
//! Model and store problems are surfaced to the caller as explicit status.

use std::path::PathBuf;

pub type VitalsResult<T> = Result<T, VitalsError>;

#[derive(Debug, thiserror::Error)]
pub enum VitalsError {
    /// Reading rejected at the ingestion boundary; nothing was stored.
    #[error("invalid reading: {field} {reason}")]
    Validation { field: &'static str, reason: String },

    /// Composite value could not be split into numeric halves.
    #[error("malformed value '{value}': {reason}")]
    Parse { value: String, reason: String },

    #[error("model unavailable at {}: {reason}", path.display())]
    ModelUnavailable { path: PathBuf, reason: String },

    #[error("store at {} was unreadable and has been reset: {reason}", path.display())]
    StoreCorruption { path: PathBuf, reason: String },

    #[error("store operation failed: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl VitalsError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn parse(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// True for problems confined to a single reading.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::Parse { .. })
    }
}
