use anyhow::{Context, Result};
use log::{debug, info, warn};
use rusqlite::{params, params_from_iter, types::Value, Transaction};
use serde::Serialize;

use crate::db::{
    helpers::{parse_datetime, reading_value_from_sql, reading_value_to_sql, limit_to_i64},
    models::{RawReading, ReadingValue},
    Database,
};
use crate::error::VitalsError;
use crate::features::{parse_blood_pressure, CanonicalFeature, SensorKind};

/// Effect a reading had on its patient's snapshot row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SnapshotUpdate {
    /// Columns overwritten by this reading.
    Applied(Vec<CanonicalFeature>),
    /// Sensor kind maps to no feature; the reading is only in the log.
    Unmapped,
    /// Value could not be interpreted; the reading is only in the log.
    Malformed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestOutcome {
    pub reading_id: i64,
    pub update: SnapshotUpdate,
}

/// Appends the reading to the log and returns its arrival id.
pub(crate) fn append(tx: &Transaction<'_>, reading: &RawReading) -> Result<i64> {
    tx.execute(
        "INSERT INTO raw_readings (
            patient_id,
            device_id,
            timestamp,
            sensor,
            value,
            unit,
            quality_score
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            reading.patient_id,
            reading.device_id,
            reading.timestamp.to_rfc3339(),
            reading.sensor_kind.as_str(),
            reading_value_to_sql(&reading.value),
            reading.unit,
            reading.quality_score,
        ],
    )
    .with_context(|| "failed to append raw reading")?;
    Ok(tx.last_insert_rowid())
}

fn feature_values(reading: &RawReading) -> Result<Vec<(CanonicalFeature, f64)>, VitalsError> {
    match (reading.sensor_kind, &reading.value) {
        (SensorKind::BpCombined, ReadingValue::Composite(raw)) => {
            let bp = parse_blood_pressure(raw)?;
            Ok(vec![
                (CanonicalFeature::BpSystolic, bp.systolic),
                (CanonicalFeature::BpDiastolic, bp.diastolic),
            ])
        }
        (SensorKind::BpCombined, ReadingValue::Number(value)) => Err(VitalsError::parse(
            value.to_string(),
            "combined pressure needs '<systolic>/<diastolic>'",
        )),
        (kind, value) => {
            let number = value
                .as_number()
                .ok_or_else(|| VitalsError::parse(value.to_string(), "not a number"))?;
            Ok(kind.features().iter().map(|feature| (*feature, number)).collect())
        }
    }
}

/// Writes the reading's feature columns into the snapshot row.
///
/// Only the mapped columns are touched, so concurrent readings for other
/// features of the same patient are never overwritten. A composite reading
/// writes both pressure columns in the same statement or neither.
pub(crate) fn update_snapshot(tx: &Transaction<'_>, reading: &RawReading) -> Result<SnapshotUpdate> {
    tx.execute(
        "INSERT OR IGNORE INTO feature_snapshots (patient_id) VALUES (?1)",
        params![reading.patient_id],
    )
    .with_context(|| "failed to create snapshot row")?;

    if reading.sensor_kind.features().is_empty() {
        info!(
            "Reading from unmapped sensor {} for patient {} logged without feature update",
            reading.sensor_kind.as_str(),
            reading.patient_id
        );
        return Ok(SnapshotUpdate::Unmapped);
    }

    let assignments = match feature_values(reading) {
        Ok(assignments) => assignments,
        Err(err) => {
            warn!(
                "Malformed {} value '{}' for patient {}: {err}",
                reading.sensor_kind.as_str(),
                reading.value,
                reading.patient_id
            );
            return Ok(SnapshotUpdate::Malformed {
                reason: err.to_string(),
            });
        }
    };

    let columns: Vec<&str> = assignments.iter().map(|(feature, _)| feature.as_str()).collect();
    let placeholders: Vec<String> = (0..columns.len()).map(|idx| format!("?{}", idx + 4)).collect();
    let updates: Vec<String> = columns
        .iter()
        .map(|column| format!("{column} = excluded.{column}"))
        .collect();

    let sql = format!(
        "INSERT INTO feature_snapshots (patient_id, timestamp, sensor, {columns})
         VALUES (?1, ?2, ?3, {placeholders})
         ON CONFLICT(patient_id) DO UPDATE SET
            {updates},
            timestamp = excluded.timestamp,
            sensor = excluded.sensor",
        columns = columns.join(", "),
        placeholders = placeholders.join(", "),
        updates = updates.join(", "),
    );

    let mut values = vec![
        Value::Text(reading.patient_id.clone()),
        Value::Text(reading.timestamp.to_rfc3339()),
        Value::Text(reading.sensor_kind.as_str().to_string()),
    ];
    values.extend(assignments.iter().map(|(_, value)| Value::Real(*value)));

    tx.execute(&sql, params_from_iter(values))
        .with_context(|| "failed to update feature snapshot")?;

    Ok(SnapshotUpdate::Applied(
        assignments.into_iter().map(|(feature, _)| feature).collect(),
    ))
}

impl Database {
    /// Validates, appends and folds one reading into the snapshot as a single
    /// transaction.
    pub async fn ingest_reading(&self, reading: RawReading) -> Result<IngestOutcome, VitalsError> {
        reading.validate()?;

        let patient_id = reading.patient_id.clone();
        let outcome = self
            .execute(move |conn| {
                let tx = conn.transaction()?;
                let reading_id = append(&tx, &reading)?;
                let update = update_snapshot(&tx, &reading)?;
                tx.commit().context("failed to commit reading")?;
                Ok(IngestOutcome { reading_id, update })
            })
            .await?;

        debug!(
            "Ingested reading {} for patient {}: {:?}",
            outcome.reading_id, patient_id, outcome.update
        );
        Ok(outcome)
    }

    /// Last `limit` readings for the patient, oldest first.
    pub async fn get_history(
        &self,
        patient_id: &str,
        sensor_kind: Option<SensorKind>,
        limit: usize,
    ) -> Result<Vec<RawReading>> {
        let patient_id = patient_id.to_string();
        let sensor = sensor_kind.map(|kind| kind.as_str());
        let limit = limit_to_i64(limit);

        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT
                    id,
                    patient_id,
                    device_id,
                    timestamp,
                    sensor,
                    value,
                    unit,
                    quality_score
                FROM raw_readings
                WHERE patient_id = ?1 AND (?2 IS NULL OR sensor = ?2)
                ORDER BY id DESC
                LIMIT ?3",
            )?;

            let mut rows = stmt.query(params![patient_id, sensor, limit])?;
            let mut readings = Vec::new();
            while let Some(row) = rows.next()? {
                readings.push(RawReading {
                    id: row.get(0)?,
                    patient_id: row.get(1)?,
                    device_id: row.get(2)?,
                    timestamp: parse_datetime(&row.get::<_, String>(3)?, "timestamp")?,
                    sensor_kind: SensorKind::from_label(&row.get::<_, String>(4)?),
                    value: reading_value_from_sql(row.get_ref(5)?, "value")?,
                    unit: row.get(6)?,
                    quality_score: row.get(7)?,
                });
            }

            readings.reverse();
            Ok(readings)
        })
        .await
    }

    pub async fn count_readings(&self, patient_id: &str) -> Result<u64> {
        let patient_id = patient_id.to_string();
        self.execute(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM raw_readings WHERE patient_id = ?1",
                params![patient_id],
                |row| row.get(0),
            )?;
            Ok(count.max(0) as u64)
        })
        .await
    }
}
