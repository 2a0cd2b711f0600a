pub mod tracing;

pub use tracing::{init_tracing, shutdown_tracing};
