use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::pipeline::VitalsPipeline;

use super::loop_worker::{monitoring_loop, LoopSettings, MonitorRunSummary};
use super::sources::SensorSource;

#[derive(Default)]
pub struct MonitorController {
    handle: Option<JoinHandle<MonitorRunSummary>>,
    cancel_token: Option<CancellationToken>,
}

impl MonitorController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn start_monitoring(
        &mut self,
        patient_id: String,
        device_id: String,
        pipeline: Arc<VitalsPipeline>,
        sources: Vec<Arc<dyn SensorSource>>,
        settings: LoopSettings,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("monitoring already active");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(monitoring_loop(
            patient_id,
            device_id,
            pipeline,
            sources,
            settings,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Waits for the loop to end on its own (cycle cap) or until `shutdown`
    /// resolves, whichever happens first.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<MonitorRunSummary>
    where
        F: std::future::Future<Output = ()>,
    {
        let Some(handle) = self.handle.as_mut() else {
            bail!("monitoring is not active");
        };

        tokio::select! {
            joined = handle => {
                self.handle = None;
                self.cancel_token = None;
                joined.context("monitoring loop task failed to join")
            }
            _ = shutdown => {
                info!("Shutdown requested, stopping monitoring loop");
                self.stop_monitoring().await
            }
        }
    }

    pub async fn stop_monitoring(&mut self) -> Result<MonitorRunSummary> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        match self.handle.take() {
            Some(handle) => handle.await.context("monitoring loop task failed to join"),
            None => Ok(MonitorRunSummary::default()),
        }
    }
}
