use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::db::SensorRecord;
use crate::pipeline::{CycleReport, VitalsPipeline};

use super::sources::SensorSource;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    pub interval: Duration,
    pub sensor_timeout: Duration,
    /// Stop on its own after this many cycles.
    pub max_cycles: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MonitorRunSummary {
    pub run_id: String,
    pub cycles: u32,
    pub failed_cycles: u32,
    pub readings_stored: usize,
    pub readings_rejected: usize,
    pub last_report: Option<CycleReport>,
}

/// Polls every source concurrently and waits for all of them, so the batch
/// is complete before anything downstream runs. A source that errors or
/// exceeds `timeout` contributes nothing to this cycle.
pub async fn acquire_batch(
    sources: &[Arc<dyn SensorSource>],
    patient_id: &str,
    device_id: &str,
    timeout: Duration,
) -> Vec<SensorRecord> {
    let mut tasks = JoinSet::new();
    for (position, source) in sources.iter().enumerate() {
        let source = Arc::clone(source);
        let patient_id = patient_id.to_string();
        let device_id = device_id.to_string();
        tasks.spawn(async move {
            let outcome =
                tokio::time::timeout(timeout, source.read(&patient_id, &device_id)).await;
            (position, source.name().to_string(), outcome)
        });
    }

    let mut collected: Vec<(usize, Vec<SensorRecord>)> = Vec::with_capacity(sources.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((position, _, Ok(Ok(records)))) => collected.push((position, records)),
            Ok((_, name, Ok(Err(err)))) => log_warn!("sensor {name} failed: {err:#}"),
            Ok((_, name, Err(_))) => {
                log_warn!("sensor {name} timed out (> {}ms)", timeout.as_millis())
            }
            Err(err) => log_error!("sensor task failed to join: {err}"),
        }
    }

    collected.sort_by_key(|(position, _)| *position);
    collected
        .into_iter()
        .flat_map(|(_, records)| records)
        .collect()
}

pub async fn monitoring_loop(
    patient_id: String,
    device_id: String,
    pipeline: Arc<VitalsPipeline>,
    sources: Vec<Arc<dyn SensorSource>>,
    settings: LoopSettings,
    cancel_token: CancellationToken,
) -> MonitorRunSummary {
    let mut summary = MonitorRunSummary {
        run_id: Uuid::new_v4().to_string(),
        ..MonitorRunSummary::default()
    };
    log_info!(
        "monitoring run {} started for patient {} ({} sources, every {}ms)",
        summary.run_id,
        patient_id,
        sources.len(),
        settings.interval.as_millis()
    );

    let mut ticker = tokio::time::interval(settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if settings
            .max_cycles
            .is_some_and(|max_cycles| summary.cycles >= max_cycles)
        {
            log_info!("monitoring run {} reached {} cycles", summary.run_id, summary.cycles);
            break;
        }

        tokio::select! {
            _ = cancel_token.cancelled() => {
                log_info!("monitoring loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                let batch = acquire_batch(&sources, &patient_id, &device_id, settings.sensor_timeout).await;
                summary.cycles += 1;
                if batch.is_empty() {
                    log_warn!("cycle {} for patient {} produced no readings", summary.cycles, patient_id);
                }

                match pipeline.process_batch(&patient_id, batch).await {
                    Ok(report) => {
                        summary.readings_stored += report.accepted.len();
                        summary.readings_rejected += report.rejected.len();
                        summary.last_report = Some(report);
                    }
                    Err(err) => {
                        summary.failed_cycles += 1;
                        log_error!("cycle {} for patient {} failed: {err}", summary.cycles, patient_id);
                    }
                }
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;

    use crate::db::models::ReadingValue;
    use crate::features::SensorKind;

    struct Fixed(SensorKind, f64);

    #[async_trait]
    impl SensorSource for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn read(&self, patient_id: &str, device_id: &str) -> Result<Vec<SensorRecord>> {
            Ok(vec![SensorRecord::new(
                patient_id,
                device_id,
                self.0,
                ReadingValue::Number(self.1),
                "",
            )])
        }
    }

    struct Stuck;

    #[async_trait]
    impl SensorSource for Stuck {
        fn name(&self) -> &str {
            "stuck"
        }

        async fn read(&self, _patient_id: &str, _device_id: &str) -> Result<Vec<SensorRecord>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
    }

    struct Broken;

    #[async_trait]
    impl SensorSource for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn read(&self, _patient_id: &str, _device_id: &str) -> Result<Vec<SensorRecord>> {
            anyhow::bail!("device unplugged")
        }
    }

    #[tokio::test]
    async fn batch_keeps_source_order_and_skips_failures() {
        let sources: Vec<Arc<dyn SensorSource>> = vec![
            Arc::new(Stuck),
            Arc::new(Fixed(SensorKind::SpO2, 97.0)),
            Arc::new(Broken),
            Arc::new(Fixed(SensorKind::Ecg, 71.0)),
        ];
        let batch = acquire_batch(&sources, "p1", "dev", Duration::from_millis(50)).await;

        let kinds: Vec<_> = batch.iter().map(|r| r.sensor_kind.clone()).collect();
        assert_eq!(kinds, vec![Some("SpO2".to_string()), Some("ECG".to_string())]);
    }
}
