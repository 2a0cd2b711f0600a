#![forbid(unsafe_code)]

pub mod codec;
pub mod config;
pub mod error;
pub mod net;
pub mod pipeline;
pub mod proxyrun;
pub mod sink;
pub mod telemetry;

pub use config::{LoadOptions, ScanConfig};
pub use error::{Result, ScanError};
pub use pipeline::orchestrator::Orchestrator;
