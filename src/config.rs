//! Runtime configuration.
//!
//! Values come from an optional JSON settings file and are then overridden
//! by environment variables:
//! - `VITALTWIN_MODEL_PATH` (default: models/model.json)
//! - `VITALTWIN_DB_PATH` (default: data/vitals.sqlite3)
//! - `VITALTWIN_POLL_INTERVAL_SECS` (default: 10)
//! - `VITALTWIN_HISTORY_LIMIT` (default: 30)
//! - `VITALTWIN_MAX_CYCLES` (default: unset, run until cancelled)
//! - `VITALTWIN_SENSOR_LATENCY_MS` (default: 200)
//! - `VITALTWIN_SENSOR_TIMEOUT_SECS` (default: 5)
//! - `VITALTWIN_PATIENT_ID` (default: patient_001)
//! - `VITALTWIN_DEVICE_ID` (default: edge_001)
//! - `VITALTWIN_UPLOAD_PATH` (default: unset)

use std::{env, fs, path::Path, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub model_path: PathBuf,
    pub db_path: PathBuf,
    pub poll_interval_secs: u64,
    pub history_limit: usize,
    pub max_cycles: Option<u32>,
    pub sensor_latency_ms: u64,
    pub sensor_timeout_secs: u64,
    pub patient_id: String,
    pub device_id: String,
    pub upload_path: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/model.json"),
            db_path: PathBuf::from("data/vitals.sqlite3"),
            poll_interval_secs: 10,
            history_limit: 30,
            max_cycles: None,
            sensor_latency_ms: 200,
            sensor_timeout_secs: 5,
            patient_id: "patient_001".into(),
            device_id: "edge_001".into(),
            upload_path: None,
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {key}={raw}: not a valid value");
            None
        }
    }
}

impl MonitorConfig {
    /// Reads the settings file if it exists, then applies environment
    /// overrides. A settings file that does not parse is replaced by defaults.
    pub fn load(settings_path: Option<&Path>) -> Result<Self> {
        let mut config = match settings_path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read settings from {}", path.display()))?;
                serde_json::from_str(&contents).unwrap_or_else(|err| {
                    warn!("Invalid settings in {}: {err}; using defaults", path.display());
                    MonitorConfig::default()
                })
            }
            _ => MonitorConfig::default(),
        };
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("VITALTWIN_MODEL_PATH") {
            self.model_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("VITALTWIN_DB_PATH") {
            self.db_path = PathBuf::from(path);
        }
        if let Some(secs) = parsed(&lookup, "VITALTWIN_POLL_INTERVAL_SECS") {
            self.poll_interval_secs = secs;
        }
        if let Some(limit) = parsed(&lookup, "VITALTWIN_HISTORY_LIMIT") {
            self.history_limit = limit;
        }
        if let Some(cycles) = parsed(&lookup, "VITALTWIN_MAX_CYCLES") {
            self.max_cycles = Some(cycles);
        }
        if let Some(ms) = parsed(&lookup, "VITALTWIN_SENSOR_LATENCY_MS") {
            self.sensor_latency_ms = ms;
        }
        if let Some(secs) = parsed(&lookup, "VITALTWIN_SENSOR_TIMEOUT_SECS") {
            self.sensor_timeout_secs = secs;
        }
        if let Some(patient_id) = lookup("VITALTWIN_PATIENT_ID") {
            self.patient_id = patient_id;
        }
        if let Some(device_id) = lookup("VITALTWIN_DEVICE_ID") {
            self.device_id = device_id;
        }
        if let Some(path) = lookup("VITALTWIN_UPLOAD_PATH") {
            self.upload_path = Some(PathBuf::from(path));
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn sensor_latency(&self) -> Duration {
        Duration::from_millis(self.sensor_latency_ms)
    }

    pub fn sensor_timeout(&self) -> Duration {
        Duration::from_secs(self.sensor_timeout_secs.max(1))
    }
}
