use anyhow::Result;
use rusqlite::{params, Row};

use crate::db::{
    helpers::parse_optional_datetime,
    models::FeatureSnapshot,
    Database,
};
use crate::features::SensorKind;

const SNAPSHOT_COLUMNS: &str = "patient_id,
    heart_rate,
    bp_systolic,
    bp_diastolic,
    oxygen_saturation,
    temperature,
    timestamp,
    sensor";

fn row_to_snapshot(row: &Row<'_>) -> Result<FeatureSnapshot> {
    Ok(FeatureSnapshot {
        patient_id: row.get("patient_id")?,
        heart_rate: row.get("heart_rate")?,
        bp_systolic: row.get("bp_systolic")?,
        bp_diastolic: row.get("bp_diastolic")?,
        oxygen_saturation: row.get("oxygen_saturation")?,
        temperature: row.get("temperature")?,
        updated_at: parse_optional_datetime(row.get("timestamp")?, "timestamp")?,
        last_sensor: row
            .get::<_, Option<String>>("sensor")?
            .map(|label| SensorKind::from_label(&label)),
    })
}

impl Database {
    pub async fn get_snapshot(&self, patient_id: &str) -> Result<Option<FeatureSnapshot>> {
        let patient_id = patient_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SNAPSHOT_COLUMNS} FROM feature_snapshots WHERE patient_id = ?1"
            ))?;
            let mut rows = stmt.query(params![patient_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_snapshot(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn list_snapshots(&self) -> Result<Vec<FeatureSnapshot>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SNAPSHOT_COLUMNS} FROM feature_snapshots ORDER BY patient_id ASC"
            ))?;
            let mut rows = stmt.query([])?;
            let mut snapshots = Vec::new();
            while let Some(row) = rows.next()? {
                snapshots.push(row_to_snapshot(row)?);
            }
            Ok(snapshots)
        })
        .await
    }

    pub async fn count_patients(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM feature_snapshots", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
        .await
    }
}
