//! End-to-end tests of the ingestion, prediction and alerting path against a
//! real SQLite store in a temporary directory.

use std::sync::Arc;

use tempfile::TempDir;
use vitaltwin_lib::db::SnapshotUpdate;
use vitaltwin_lib::{
    CanonicalFeature, Database, RawReading, ReadingValue, RiskLevel, SensorKind, SensorRecord,
    Severity, TrendPredictor, VitalsError, VitalsPipeline,
};

fn open_store() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(dir.path().join("vitals.sqlite3")).unwrap();
    (dir, db)
}

fn degraded_pipeline() -> (TempDir, Arc<VitalsPipeline>) {
    let (dir, db) = open_store();
    let predictor = TrendPredictor::from_model_path(&dir.path().join("missing-model.json"));
    (dir, VitalsPipeline::new(db, predictor, 30).into_shared())
}

#[tokio::test]
async fn test_appended_reading_comes_back_unchanged() {
    let (_dir, db) = open_store();
    let reading = RawReading::new("p1", "edge_001", SensorKind::Ecg, 72.0, "bpm").with_quality(0.9);

    let outcome = db.ingest_reading(reading.clone()).await.unwrap();
    let history = db.get_history("p1", Some(SensorKind::Ecg), 1).await.unwrap();

    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, Some(outcome.reading_id));
    assert_eq!(RawReading { id: None, ..history[0].clone() }, reading);
}

#[tokio::test]
async fn test_malformed_pressure_keeps_previous_snapshot() {
    let (_dir, db) = open_store();
    db.ingest_reading(RawReading::new("p1", "dev", SensorKind::BpCombined, "120/80", "mmHg"))
        .await
        .unwrap();

    let outcome = db
        .ingest_reading(RawReading::new("p1", "dev", SensorKind::BpCombined, "abc/80", "mmHg"))
        .await
        .unwrap();
    assert!(matches!(outcome.update, SnapshotUpdate::Malformed { .. }));

    let snapshot = db.get_snapshot("p1").await.unwrap().unwrap();
    assert_eq!(snapshot.bp_systolic, Some(120.0));
    assert_eq!(snapshot.bp_diastolic, Some(80.0));
    assert_eq!(db.count_readings("p1").await.unwrap(), 2);
}

#[tokio::test]
async fn test_concurrent_writers_do_not_lose_features() {
    let (_dir, db) = open_store();
    let (heart, oxygen) = tokio::join!(
        db.ingest_reading(RawReading::new("p1", "ecg", SensorKind::Ecg, 81.0, "bpm")),
        db.ingest_reading(RawReading::new("p1", "oxi", SensorKind::SpO2, 96.0, "%")),
    );
    heart.unwrap();
    oxygen.unwrap();

    let snapshot = db.get_snapshot("p1").await.unwrap().unwrap();
    assert_eq!(snapshot.heart_rate, Some(81.0));
    assert_eq!(snapshot.oxygen_saturation, Some(96.0));
}

#[tokio::test]
async fn test_single_cycle_end_to_end() {
    let (_dir, pipeline) = degraded_pipeline();
    let records = vec![
        SensorRecord::new("p1", "edge_001", SensorKind::Ecg, 72.0, "bpm"),
        SensorRecord::new("p1", "edge_001", SensorKind::SpO2, 98.5, "%"),
        SensorRecord::new("p1", "edge_001", SensorKind::BpCombined, "118/76", "mmHg"),
    ];

    let report = pipeline.process_batch("p1", records).await.unwrap();
    assert_eq!(report.accepted.len(), 3);
    assert!(report.rejected.is_empty());

    let snapshot = pipeline.snapshot("p1").await.unwrap().unwrap();
    assert_eq!(snapshot.heart_rate, Some(72.0));
    assert_eq!(snapshot.bp_systolic, Some(118.0));
    assert_eq!(snapshot.bp_diastolic, Some(76.0));
    assert_eq!(snapshot.oxygen_saturation, Some(98.5));
    assert_eq!(snapshot.temperature, None);

    let aligned = pipeline
        .predictor()
        .aligner()
        .align(&snapshot.to_feature_row());
    assert_eq!(aligned.values, vec![72.0, 118.0, 76.0, 98.5, 36.5]);

    let prediction = report.prediction.unwrap();
    assert_eq!(prediction.predicted_value, 0.0);
    assert_eq!(prediction.risk, RiskLevel::Normal);
    assert_eq!(prediction.confidence, 0.85);
    assert!(prediction.degraded);

    assert!(report.alert.unwrap().entries.is_empty());

    let twin = pipeline.twin("p1");
    assert_eq!(twin.latest_readings.len(), 3);
    assert_eq!(twin.latest_readings[2].value, ReadingValue::Composite("118/76".into()));
    assert!(!twin.is_high_risk());
}

#[tokio::test]
async fn test_bad_record_does_not_block_batch() {
    let (_dir, pipeline) = degraded_pipeline();
    let mut missing_value = SensorRecord::new("p1", "dev", SensorKind::Temp, 36.6, "C");
    missing_value.value = None;
    let mut unattributed = SensorRecord::new("p1", "dev", SensorKind::Temp, 39.2, "C");
    unattributed.patient_id = None;

    let report = pipeline
        .process_batch(
            "p1",
            vec![
                missing_value,
                unattributed,
                SensorRecord::new("p1", "dev", SensorKind::Ecg, 58.0, "bpm"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(report.accepted.len(), 2);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].index, 0);

    let alert = report.alert.unwrap();
    let flagged: Vec<_> = alert.entries.iter().map(|e| (e.feature, e.severity)).collect();
    assert_eq!(
        flagged,
        vec![
            (CanonicalFeature::HeartRate, Severity::Warning),
            (CanonicalFeature::Temperature, Severity::Critical),
        ]
    );
}

#[tokio::test]
async fn test_direct_ingest_rejects_invalid_reading() {
    let (_dir, pipeline) = degraded_pipeline();
    let mut record = SensorRecord::new("p1", "dev", SensorKind::Ecg, f64::NAN, "bpm");
    record.quality_score = Some(0.5);

    let err = pipeline.ingest(record).await.unwrap_err();
    assert!(matches!(err, VitalsError::Validation { .. }));
    assert_eq!(pipeline.db().count_readings("p1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_statistics_across_patients() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("model.json");
    std::fs::write(
        &model_path,
        r#"{"feature_names": ["heart_rate"], "weights": [1.5], "intercept": 0.0}"#,
    )
    .unwrap();
    let db = Database::new(dir.path().join("vitals.sqlite3")).unwrap();
    let predictor = TrendPredictor::from_model_path(&model_path);
    assert!(!predictor.is_degraded());
    let pipeline = VitalsPipeline::new(db, predictor, 30);

    pipeline
        .process_batch("calm", vec![SensorRecord::new("calm", "dev", SensorKind::Ecg, 62.0, "bpm")])
        .await
        .unwrap();
    let report = pipeline
        .process_batch("racing", vec![SensorRecord::new("racing", "dev", SensorKind::Ecg, 130.0, "bpm")])
        .await
        .unwrap();

    let prediction = report.prediction.unwrap();
    assert!((prediction.predicted_value - 195.0).abs() < 1e-9);
    assert_eq!(prediction.risk, RiskLevel::High);

    let statistics = pipeline.statistics().await.unwrap();
    assert_eq!(statistics.total_patients, 2);
    assert_eq!(statistics.active_alerts, 1);
    assert_eq!(statistics.high_risk_count, 1);
}

#[tokio::test]
async fn test_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vitals.sqlite3");
    {
        let db = Database::new(path.clone()).unwrap();
        db.ingest_reading(RawReading::new("p1", "dev", SensorKind::Temp, 37.0, "C"))
            .await
            .unwrap();
    }

    let db = Database::new(path).unwrap();
    assert!(db.corruption().is_none());
    let snapshot = db.get_snapshot("p1").await.unwrap().unwrap();
    assert_eq!(snapshot.temperature, Some(37.0));
}

#[tokio::test]
async fn test_record_for_other_patient_is_rejected() {
    let (_dir, pipeline) = degraded_pipeline();
    let report = pipeline
        .process_batch(
            "p1",
            vec![
                SensorRecord::new("p2", "dev", SensorKind::Ecg, 140.0, "bpm"),
                SensorRecord::new("p1", "dev", SensorKind::SpO2, 97.0, "%"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(report.accepted.len(), 1);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].index, 0);
    assert!(report.rejected[0].reason.contains("p2"));

    let twin = pipeline.twin("p1");
    assert!(twin.latest_readings.iter().all(|r| r.patient_id == "p1"));
    assert_eq!(pipeline.db().count_readings("p2").await.unwrap(), 0);
    assert!(pipeline.snapshot("p2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_overlapping_cycles_leave_latest_alert() {
    let (_dir, pipeline) = degraded_pipeline();
    let (racing, calm) = tokio::join!(
        pipeline.process_batch("p1", vec![SensorRecord::new("p1", "ecg", SensorKind::Ecg, 130.0, "bpm")]),
        pipeline.process_batch("p1", vec![SensorRecord::new("p1", "oxi", SensorKind::SpO2, 97.0, "%")]),
    );
    racing.unwrap();
    calm.unwrap();

    let snapshot = pipeline.snapshot("p1").await.unwrap().unwrap();
    assert_eq!(snapshot.heart_rate, Some(130.0));
    assert_eq!(snapshot.oxygen_saturation, Some(97.0));

    let alert = pipeline.alerts().latest("p1").unwrap();
    let flagged: Vec<_> = alert.entries.iter().map(|e| (e.feature, e.severity)).collect();
    assert_eq!(flagged, vec![(CanonicalFeature::HeartRate, Severity::Critical)]);
    assert_eq!(pipeline.twin("p1").latest_alert, Some(alert));
}
