//! Sensor collaborators.
//!
//! The simulated sources stand in for real devices: they wait a fixed
//! latency and emit one plausible reading each.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;

use crate::db::models::{ReadingValue, SensorRecord};
use crate::features::SensorKind;

#[async_trait]
pub trait SensorSource: Send + Sync {
    fn name(&self) -> &str;

    async fn read(&self, patient_id: &str, device_id: &str) -> Result<Vec<SensorRecord>>;
}

fn record(
    patient_id: &str,
    device_id: &str,
    kind: SensorKind,
    value: ReadingValue,
    unit: &str,
    quality_score: f64,
) -> SensorRecord {
    SensorRecord {
        quality_score: Some(quality_score),
        timestamp: Some(Utc::now()),
        ..SensorRecord::new(patient_id, device_id, kind, value, unit)
    }
}

pub struct SimulatedEcg {
    latency: Duration,
}

impl SimulatedEcg {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl SensorSource for SimulatedEcg {
    fn name(&self) -> &str {
        "ecg"
    }

    async fn read(&self, patient_id: &str, device_id: &str) -> Result<Vec<SensorRecord>> {
        tokio::time::sleep(self.latency).await;
        let mut rng = rand::thread_rng();
        let heart_rate = f64::from(rng.gen_range(60..=100));
        let quality = rng.gen_range(0.85..=1.0);
        Ok(vec![record(
            patient_id,
            device_id,
            SensorKind::Ecg,
            ReadingValue::Number(heart_rate),
            "bpm",
            quality,
        )])
    }
}

pub struct SimulatedPulseOximeter {
    latency: Duration,
}

impl SimulatedPulseOximeter {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl SensorSource for SimulatedPulseOximeter {
    fn name(&self) -> &str {
        "pulse_oximeter"
    }

    async fn read(&self, patient_id: &str, device_id: &str) -> Result<Vec<SensorRecord>> {
        tokio::time::sleep(self.latency).await;
        let mut rng = rand::thread_rng();
        let saturation = (rng.gen_range(95.0..=100.0_f64) * 10.0).round() / 10.0;
        let quality = rng.gen_range(0.85..=1.0);
        Ok(vec![record(
            patient_id,
            device_id,
            SensorKind::SpO2,
            ReadingValue::Number(saturation),
            "%",
            quality,
        )])
    }
}

/// Emits a single composite `"sys/dia"` reading.
pub struct SimulatedBloodPressureMonitor {
    latency: Duration,
}

impl SimulatedBloodPressureMonitor {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl SensorSource for SimulatedBloodPressureMonitor {
    fn name(&self) -> &str {
        "blood_pressure"
    }

    async fn read(&self, patient_id: &str, device_id: &str) -> Result<Vec<SensorRecord>> {
        tokio::time::sleep(self.latency).await;
        let mut rng = rand::thread_rng();
        let systolic: u32 = rng.gen_range(110..=130);
        let diastolic: u32 = rng.gen_range(70..=85);
        let quality = rng.gen_range(0.85..=1.0);
        Ok(vec![record(
            patient_id,
            device_id,
            SensorKind::BpCombined,
            ReadingValue::Composite(format!("{systolic}/{diastolic}")),
            "mmHg",
            quality,
        )])
    }
}

pub fn simulated_sources(latency: Duration) -> Vec<std::sync::Arc<dyn SensorSource>> {
    vec![
        std::sync::Arc::new(SimulatedEcg::new(latency)),
        std::sync::Arc::new(SimulatedPulseOximeter::new(latency)),
        std::sync::Arc::new(SimulatedBloodPressureMonitor::new(latency)),
    ]
}
