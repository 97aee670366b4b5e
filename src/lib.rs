pub mod alerts;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod pipeline;
pub mod prediction;
pub mod sensing;
pub mod twin;
pub mod upload;
mod utils;

use std::{env, path::PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};

pub use alerts::{Alert, AlertEntry, AlertEvaluator, Severity};
pub use config::MonitorConfig;
pub use db::{Database, FeatureSnapshot, RawReading, ReadingValue, SensorRecord, StoreStatus};
pub use error::{VitalsError, VitalsResult};
pub use features::{AlignedRow, CanonicalFeature, FeatureAligner, SensorKind};
pub use pipeline::{CycleReport, SummaryStatistics, VitalsPipeline};
pub use prediction::{Prediction, RiskLevel, TrendPredictor};
pub use sensing::{LoopSettings, MonitorController, MonitorRunSummary};
pub use twin::{TwinRegistry, TwinState};

fn settings_path() -> Option<PathBuf> {
    env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| env::var_os("VITALTWIN_SETTINGS").map(PathBuf::from))
}

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("VitalTwin starting up...");

    let config = MonitorConfig::load(settings_path().as_deref())?;
    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(monitor(config))
}

async fn monitor(config: MonitorConfig) -> Result<()> {
    let database = Database::new(config.db_path.clone())?;
    let predictor = TrendPredictor::from_model_path(&config.model_path);
    let pipeline = VitalsPipeline::new(database, predictor, config.history_limit).into_shared();

    if let Some(upload_path) = &config.upload_path {
        match pipeline.score_upload(upload_path) {
            Ok(scores) => info!(
                "Upload {}: {} rows scored, {} high risk",
                upload_path.display(),
                scores.predictions.len(),
                scores.risks.iter().filter(|risk| **risk == RiskLevel::High).count()
            ),
            Err(err) => warn!("Skipping upload {}: {err:#}", upload_path.display()),
        }
    }

    let mut controller = MonitorController::new();
    controller.start_monitoring(
        config.patient_id.clone(),
        config.device_id.clone(),
        pipeline.clone(),
        sensing::simulated_sources(config.sensor_latency()),
        LoopSettings {
            interval: config.poll_interval(),
            sensor_timeout: config.sensor_timeout(),
            max_cycles: config.max_cycles,
        },
    )?;

    let run = controller
        .run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for ctrl-c: {err}");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    let statistics = pipeline.statistics().await?;
    info!(
        "Run {} finished after {} cycles ({} failed): {} readings stored, {} rejected",
        run.run_id, run.cycles, run.failed_cycles, run.readings_stored, run.readings_rejected
    );
    info!(
        "Patients: {}, active alerts: {}, high risk: {}",
        statistics.total_patients, statistics.active_alerts, statistics.high_risk_count
    );

    let twin = pipeline.twin(&config.patient_id);
    info!("Twin for {}: {}", config.patient_id, serde_json::to_string(&twin)?);
    Ok(())
}
