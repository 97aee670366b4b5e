use std::{
    collections::HashMap,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use serde::Serialize;

use crate::alerts::Alert;
use crate::db::models::RawReading;
use crate::prediction::Prediction;

/// Last known state of one patient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TwinState {
    pub patient_id: String,
    pub latest_readings: Vec<RawReading>,
    pub latest_prediction: Option<Prediction>,
    pub latest_alert: Option<Alert>,
}

impl TwinState {
    pub fn empty(patient_id: impl Into<String>) -> Self {
        Self {
            patient_id: patient_id.into(),
            latest_readings: Vec::new(),
            latest_prediction: None,
            latest_alert: None,
        }
    }

    pub fn is_high_risk(&self) -> bool {
        self.latest_prediction
            .as_ref()
            .is_some_and(Prediction::is_high_risk)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TwinSummary {
    pub total_patients: usize,
    pub high_risk_patients: Vec<String>,
}

/// Cache of the current state per patient. Not a history: every update
/// replaces the previous entry.
#[derive(Default)]
pub struct TwinRegistry {
    twins: RwLock<HashMap<String, TwinState>>,
}

impl TwinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, TwinState>> {
        match self.twins.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, TwinState>> {
        match self.twins.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn update(
        &self,
        patient_id: &str,
        readings: Vec<RawReading>,
        prediction: Option<Prediction>,
        alert: Option<Alert>,
    ) {
        let state = TwinState {
            patient_id: patient_id.to_string(),
            latest_readings: readings,
            latest_prediction: prediction,
            latest_alert: alert,
        };
        self.write().insert(patient_id.to_string(), state);
    }

    pub fn get(&self, patient_id: &str) -> TwinState {
        self.read()
            .get(patient_id)
            .cloned()
            .unwrap_or_else(|| TwinState::empty(patient_id))
    }

    pub fn summary(&self) -> TwinSummary {
        let twins = self.read();
        let mut high_risk_patients: Vec<String> = twins
            .values()
            .filter(|twin| twin.is_high_risk())
            .map(|twin| twin.patient_id.clone())
            .collect();
        high_risk_patients.sort();

        TwinSummary {
            total_patients: twins.len(),
            high_risk_patients,
        }
    }
}
