use std::fs::File;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::error::{Result, ScanError};

/// Initializes the global subscriber: a human-readable console layer whose
/// default level follows `--debug`, plus a non-blocking file layer that
/// re-creates `log_path` (`scanner_error.log`, §6 "Outputs") on every run.
///
/// The returned [`WorkerGuard`] must be held for the process lifetime —
/// dropping it stops the background log-writer thread.
pub fn init_tracing(debug: bool, log_path: &Path) -> Result<WorkerGuard> {
    let default_level = if debug { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let console_layer = tracing_subscriber::fmt::layer().with_target(debug);

    let log_file = File::create(log_path)
        .map_err(|e| ScanError::Fatal(format!("cannot create {}: {e}", log_path.display())))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    let subscriber = Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ScanError::Fatal(format!("failed to set global tracing subscriber: {e}")))?;

    Ok(guard)
}

pub fn shutdown_tracing() {
    use std::io::Write;
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();
}
