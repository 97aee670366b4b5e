pub mod state;

pub use state::{TwinRegistry, TwinState, TwinSummary};
