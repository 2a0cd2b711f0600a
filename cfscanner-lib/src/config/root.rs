use std::path::PathBuf;

use ipnet::{Ipv4Net, Ipv6Net};

use crate::config::template::ProxyTemplate;

/// Everything the orchestrator (C7) needs to start a scan, assembled by
/// [`super::loader::load`] from the working directory's input files plus
/// CLI overrides (§6 "Configuration precedence").
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Directory containing `ipv4.txt`, `ipv6.txt`, `cloudflare-domains.txt`,
    /// `config.json`/`config.txt`, and under which outputs are written
    /// unless `out_dir` is set.
    pub working_dir: PathBuf,
    /// Power knob, 1-100 (§4.7 capacity computation).
    pub power: u8,
    /// Target verified-entry count; `None` means run until stopped.
    pub target: Option<u64>,
    /// Lowers the console log level and enables extra detail (§4.10).
    pub debug: bool,
    /// Path to the external proxy binary. `None` disables the C6 stage
    /// (`SetupError`, §7).
    pub proxy_bin: Option<PathBuf>,
    /// Output directory for `output_configs/`, `clean_ips.csv`,
    /// `scanner_error.log` (§6 "Outputs").
    pub out_dir: PathBuf,
    pub v4_ranges: Vec<Ipv4Net>,
    pub v6_ranges: Vec<Ipv6Net>,
    pub domains: Vec<String>,
    /// The mounted proxy template, derived from whichever of
    /// `config.json`/`config.txt` was present (§6). `None` disables C6
    /// (`TemplateError`, §7) even if `proxy_bin` is set.
    pub template: Option<ProxyTemplate>,
    /// The original URI's fragment, when the template was mounted from
    /// `config.txt`. C6's rewritten output carries it forward (§4.6
    /// "Rewritten output"); `None` when mounted from `config.json` or when
    /// the original URI had no fragment.
    pub original_fragment: Option<String>,
}

impl ScanConfig {
    /// True when both a template and a proxy binary are available, i.e.
    /// the pipeline runs C6 instead of terminating after C5 (§4.5, §6).
    pub fn proxy_stage_enabled(&self) -> bool {
        self.template.is_some() && self.proxy_bin.is_some()
    }

    pub fn output_configs_dir(&self) -> PathBuf {
        self.out_dir.join("output_configs")
    }

    pub fn clean_ips_csv_path(&self) -> PathBuf {
        self.out_dir.join("clean_ips.csv")
    }

    pub fn vless_links_path(&self) -> PathBuf {
        self.output_configs_dir().join("vless_links.txt")
    }

    pub fn scanner_log_path(&self) -> PathBuf {
        self.out_dir.join("scanner_error.log")
    }
}
