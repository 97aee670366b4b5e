//! One monitoring cycle: ingest, predict, evaluate, cache.

use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex},
};

use anyhow::Result;
use log::{info, warn};
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;

use crate::alerts::{Alert, AlertEvaluator};
use crate::db::{Database, FeatureSnapshot, IngestOutcome, RawReading, SensorRecord, SnapshotUpdate};
use crate::error::VitalsError;
use crate::features::SensorKind;
use crate::prediction::{Prediction, TrendPredictor};
use crate::twin::{TwinRegistry, TwinState};
use crate::upload::{score_upload, UploadScores};

#[derive(Debug, Clone, Serialize)]
pub struct RejectedRecord {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub patient_id: String,
    pub accepted: Vec<RawReading>,
    pub rejected: Vec<RejectedRecord>,
    /// Readings that were logged but left the snapshot unchanged.
    pub log_only: usize,
    pub prediction: Option<Prediction>,
    pub alert: Option<Alert>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SummaryStatistics {
    pub total_patients: usize,
    pub active_alerts: usize,
    pub high_risk_count: usize,
}

pub struct VitalsPipeline {
    db: Database,
    predictor: TrendPredictor,
    alerts: AlertEvaluator,
    twins: TwinRegistry,
    history_limit: usize,
    /// One lock per patient so overlapping cycles finish in order and an
    /// older snapshot never replaces a newer alert or twin.
    cycle_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl VitalsPipeline {
    pub fn new(db: Database, predictor: TrendPredictor, history_limit: usize) -> Self {
        if let Some(err) = db.corruption() {
            warn!("{err}");
        }
        if let Some(err) = predictor.model_unavailable() {
            warn!("{err}; predictions will be neutral");
        }
        Self {
            db,
            predictor,
            alerts: AlertEvaluator::new(),
            twins: TwinRegistry::new(),
            history_limit: history_limit.max(1),
            cycle_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn predictor(&self) -> &TrendPredictor {
        &self.predictor
    }

    pub fn alerts(&self) -> &AlertEvaluator {
        &self.alerts
    }

    pub fn twins(&self) -> &TwinRegistry {
        &self.twins
    }

    fn cycle_lock(&self, patient_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = match self.cycle_locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(locks.entry(patient_id.to_string()).or_default())
    }

    /// Normalizes a collaborator record and stores it.
    pub async fn ingest(&self, record: SensorRecord) -> Result<(RawReading, IngestOutcome), VitalsError> {
        let reading = RawReading::try_from(record)?;
        let outcome = self.db.ingest_reading(reading.clone()).await?;
        let stored = RawReading {
            id: Some(outcome.reading_id),
            ..reading
        };
        Ok((stored, outcome))
    }

    /// Stores every record of the batch, then recomputes prediction, alerts
    /// and the twin for the patient. A bad record is reported, not fatal, and
    /// so is a record addressed to a different patient.
    pub async fn process_batch(
        &self,
        patient_id: &str,
        records: Vec<SensorRecord>,
    ) -> Result<CycleReport, VitalsError> {
        let lock = self.cycle_lock(patient_id);
        let _cycle = lock.lock().await;

        let mut accepted = Vec::with_capacity(records.len());
        let mut rejected = Vec::new();
        let mut log_only = 0;

        for (index, mut record) in records.into_iter().enumerate() {
            let foreign = record
                .patient_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty() && *id != patient_id)
                .map(str::to_string);
            let outcome = match foreign {
                Some(other) => Err(VitalsError::validation(
                    "patient_id",
                    format!("belongs to {other}, not {patient_id}"),
                )),
                None => {
                    record.patient_id = Some(patient_id.to_string());
                    self.ingest(record).await
                }
            };
            match outcome {
                Ok((reading, outcome)) => {
                    if !matches!(outcome.update, SnapshotUpdate::Applied(_)) {
                        log_only += 1;
                    }
                    accepted.push(reading);
                }
                Err(err) if err.is_recoverable() => {
                    warn!("Rejected record {index} for patient {patient_id}: {err}");
                    rejected.push(RejectedRecord {
                        index,
                        reason: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        let (prediction, alert) = self.evaluate(patient_id).await?;

        self.twins
            .update(patient_id, accepted.clone(), prediction.clone(), alert.clone());

        info!(
            "Cycle for patient {patient_id}: {} stored, {} rejected, {} log-only, risk={}",
            accepted.len(),
            rejected.len(),
            log_only,
            prediction
                .as_ref()
                .map(|p| p.risk.as_str())
                .unwrap_or("n/a")
        );

        Ok(CycleReport {
            patient_id: patient_id.to_string(),
            accepted,
            rejected,
            log_only,
            prediction,
            alert,
        })
    }

    /// Prediction from the history window and alerts from the snapshot.
    pub async fn evaluate(
        &self,
        patient_id: &str,
    ) -> Result<(Option<Prediction>, Option<Alert>), VitalsError> {
        let history = self
            .db
            .get_history(patient_id, None, self.history_limit)
            .await?;
        let prediction = self.predictor.predict_trend(patient_id, &history);

        let alert = self
            .db
            .get_snapshot(patient_id)
            .await?
            .map(|snapshot| self.alerts.evaluate(&snapshot));

        Ok((prediction, alert))
    }

    pub async fn snapshot(&self, patient_id: &str) -> Result<Option<FeatureSnapshot>> {
        self.db.get_snapshot(patient_id).await
    }

    pub async fn history(
        &self,
        patient_id: &str,
        sensor_kind: Option<SensorKind>,
        limit: usize,
    ) -> Result<Vec<RawReading>> {
        self.db.get_history(patient_id, sensor_kind, limit).await
    }

    pub fn twin(&self, patient_id: &str) -> TwinState {
        self.twins.get(patient_id)
    }

    pub async fn statistics(&self) -> Result<SummaryStatistics> {
        let total_patients = self.db.count_patients().await? as usize;
        Ok(SummaryStatistics {
            total_patients,
            active_alerts: self.alerts.get_statistics().active_alerts,
            high_risk_count: self.twins.summary().high_risk_patients.len(),
        })
    }

    pub fn score_upload(&self, path: &Path) -> Result<UploadScores> {
        score_upload(path, &self.predictor)
    }
}
