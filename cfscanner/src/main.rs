#![forbid(unsafe_code)]

use std::path::PathBuf;

use cfscanner_lib::config::LoadOptions;
use cfscanner_lib::{config, telemetry, Orchestrator};
use clap::Parser;
use tracing::{error, info};

/// Scans Cloudflare's edge IP space for addresses that serve a user's
/// VLESS/Trojan proxy configuration, ranking the survivors by measured
/// throughput (§4.9).
#[derive(Parser, Debug)]
#[command(author, version, about = "Cloudflare edge IP scanner for VLESS/Trojan proxy configs")]
struct Cli {
    /// Directory containing ipv4.txt, ipv6.txt, cloudflare-domains.txt,
    /// config.json/config.txt, and (unless --out is set) where outputs land.
    #[arg(value_name = "DIR", default_value = ".")]
    working_dir: PathBuf,

    /// Worker-pool scaling knob, 1-100 (§4.7).
    #[arg(short, long, default_value_t = 50, value_parser = clap::value_parser!(u8).range(1..=100))]
    power: u8,

    /// Stop automatically once this many IPs have been verified.
    #[arg(short, long)]
    target: Option<u64>,

    /// Lower the console log level to debug.
    #[arg(long)]
    debug: bool,

    /// Path to the external proxy binary that serves C6's probe. Omit to
    /// disable the proxy-verification stage.
    #[arg(long, value_name = "PATH")]
    proxy_bin: Option<PathBuf>,

    /// Output directory for output_configs/, clean_ips.csv, and
    /// scanner_error.log. Defaults to the working directory.
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match config::load(
        &cli.working_dir,
        LoadOptions {
            power: cli.power,
            target: cli.target,
            debug: cli.debug,
            proxy_bin: cli.proxy_bin,
            out_dir: cli.out,
        },
    ) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load scan configuration: {e}");
            std::process::exit(1);
        }
    };

    let log_path = config.scanner_log_path();
    let _guard = match telemetry::init_tracing(config.debug, &log_path) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to initialize logging at {}: {e}", log_path.display());
            std::process::exit(1);
        }
    };

    if !config.proxy_stage_enabled() {
        info!("proxy stage disabled, terminal stage is the direct speed probe (C5)");
    }

    let orchestrator = Orchestrator::new(config);
    let mut run_handle = tokio::spawn(orchestrator.clone().run());

    tokio::select! {
        res = &mut run_handle => { let _ = res; }
        _ = tokio::signal::ctrl_c() => {
            info!("received interrupt, stopping scan");
            orchestrator.stop();
            let _ = run_handle.await;
        }
    }

    let mut exit_code = 0;
    if let Err(e) = orchestrator.sink().save_csv() {
        error!(%e, "failed to write clean_ips.csv");
        exit_code = 1;
    }

    info!(verified = orchestrator.sink().len(), "scan complete");
    telemetry::shutdown_tracing();
    std::process::exit(exit_code);
}
