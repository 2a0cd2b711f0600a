//! C7: the pipeline orchestrator and the state it coordinates (§4.7, §5).

pub mod candidate;
pub mod metrics;
pub mod orchestrator;
pub mod queue;
pub mod state;

pub use metrics::ScanMetrics;
pub use orchestrator::Orchestrator;
pub use state::{ScanControl, ScanSignals, ScanState};
