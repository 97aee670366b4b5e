//! Scoring of uploaded tabular vitals.
//!
//! Unlike live readings, uploaded tables are zero-filled: a required column
//! that is missing from the file becomes 0 for every row, and columns the
//! model does not use are dropped before scoring.

use std::{fs::File, io::Read, path::Path};

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;

use crate::features::AlignedRow;
use crate::prediction::{RiskLevel, TrendPredictor};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadTable {
    pub rows: Vec<AlignedRow>,
    pub missing_columns: Vec<String>,
    pub dropped_columns: Vec<String>,
    /// Cells that were present but not numeric, scored as 0.
    pub invalid_cells: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadScores {
    pub predictions: Vec<f64>,
    pub risks: Vec<RiskLevel>,
    pub missing_columns: Vec<String>,
    pub dropped_columns: Vec<String>,
    pub degraded: bool,
}

pub fn read_upload<R: Read>(reader: R, required: &[String]) -> Result<UploadTable> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers: Vec<String> = csv_reader
        .headers()
        .context("failed to read upload header")?
        .iter()
        .map(str::to_string)
        .collect();

    let positions: Vec<Option<usize>> = required
        .iter()
        .map(|name| headers.iter().position(|header| header == name))
        .collect();
    let missing_columns: Vec<String> = required
        .iter()
        .zip(&positions)
        .filter(|(_, position)| position.is_none())
        .map(|(name, _)| name.clone())
        .collect();
    let dropped_columns: Vec<String> = headers
        .iter()
        .filter(|header| !required.contains(*header))
        .cloned()
        .collect();

    let mut rows = Vec::new();
    let mut invalid_cells = 0;
    for (line, record) in csv_reader.records().enumerate() {
        let record = record.with_context(|| format!("failed to read upload row {}", line + 1))?;
        let values = positions
            .iter()
            .map(|position| {
                let Some(cell) = position.and_then(|idx| record.get(idx)) else {
                    return 0.0;
                };
                match cell.parse::<f64>() {
                    Ok(value) if value.is_finite() => value,
                    _ => {
                        invalid_cells += 1;
                        0.0
                    }
                }
            })
            .collect();
        rows.push(AlignedRow {
            names: required.to_vec(),
            values,
        });
    }

    Ok(UploadTable {
        rows,
        missing_columns,
        dropped_columns,
        invalid_cells,
    })
}

pub fn score_upload(path: &Path, predictor: &TrendPredictor) -> Result<UploadScores> {
    let file = File::open(path)
        .with_context(|| format!("failed to open upload {}", path.display()))?;
    let table = read_upload(file, predictor.required_features())?;

    if !table.missing_columns.is_empty() {
        warn!(
            "Upload {} lacks columns {:?}; filled with 0",
            path.display(),
            table.missing_columns
        );
    }
    if table.invalid_cells > 0 {
        warn!("Upload {} has {} non-numeric cells", path.display(), table.invalid_cells);
    }

    let scored = predictor.score_rows(&table.rows);
    let predictions: Vec<f64> = scored.iter().map(|(value, _)| *value).collect();
    info!("Scored {} uploaded rows from {}", predictions.len(), path.display());

    Ok(UploadScores {
        risks: predictions.iter().map(|value| RiskLevel::classify(*value)).collect(),
        degraded: scored.iter().any(|(_, degraded)| *degraded),
        predictions,
        missing_columns: table.missing_columns,
        dropped_columns: table.dropped_columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::prediction::LinearModel;

    fn required() -> Vec<String> {
        ["heart_rate", "bp_systolic", "temperature"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn missing_columns_are_zero_filled_and_extras_dropped() {
        let csv = "patient,heart_rate,temperature,notes\np1,72,36.6,ok\np2,110, 38.1 ,fever\n";
        let table = read_upload(csv.as_bytes(), &required()).unwrap();

        assert_eq!(table.missing_columns, vec!["bp_systolic".to_string()]);
        assert_eq!(table.dropped_columns, vec!["patient".to_string(), "notes".to_string()]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].values, vec![72.0, 0.0, 36.6]);
        assert_eq!(table.rows[1].values, vec![110.0, 0.0, 38.1]);
    }

    #[test]
    fn non_numeric_cells_count_as_zero() {
        let csv = "heart_rate,bp_systolic,temperature\nfast,120,36.5\n";
        let table = read_upload(csv.as_bytes(), &required()).unwrap();
        assert_eq!(table.invalid_cells, 1);
        assert_eq!(table.rows[0].values, vec![0.0, 120.0, 36.5]);
    }

    #[test]
    fn scores_file_with_model_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.csv");
        std::fs::write(&path, "heart_rate,extra\n90,1\n40,2\n").unwrap();

        let model = LinearModel::new(vec!["heart_rate".into()], vec![1.2], 0.0).unwrap();
        let predictor = TrendPredictor::new(Some(Arc::new(model)));
        let scores = score_upload(&path, &predictor).unwrap();

        assert_eq!(scores.dropped_columns, vec!["extra".to_string()]);
        assert!((scores.predictions[0] - 108.0).abs() < 1e-9);
        assert_eq!(scores.risks, vec![RiskLevel::High, RiskLevel::Normal]);
        assert!(!scores.degraded);
    }

    #[test]
    fn degraded_predictor_scores_upload_as_neutral() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.csv");
        std::fs::write(&path, "heart_rate\n150\n").unwrap();

        let scores = score_upload(&path, &TrendPredictor::new(None)).unwrap();
        assert_eq!(scores.predictions, vec![0.0]);
        assert!(scores.degraded);
    }
}
