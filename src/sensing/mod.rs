pub mod controller;
pub mod loop_worker;
pub mod sources;

pub use controller::MonitorController;
pub use loop_worker::{acquire_batch, monitoring_loop, LoopSettings, MonitorRunSummary};
pub use sources::{
    simulated_sources, SensorSource, SimulatedBloodPressureMonitor, SimulatedEcg,
    SimulatedPulseOximeter,
};
