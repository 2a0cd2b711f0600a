use std::fs;
use std::path::{Path, PathBuf};

use ipnet::{Ipv4Net, Ipv6Net};
use tracing::warn;

use crate::codec;
use crate::config::defaults::{DEFAULT_DOMAINS, DEFAULT_V4_CIDR};
use crate::config::root::ScanConfig;
use crate::config::template::ProxyTemplate;
use crate::error::{Result, ScanError};

/// CLI-supplied overrides layered on top of the working directory's input
/// files (§6 "Configuration precedence").
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub power: u8,
    pub target: Option<u64>,
    pub debug: bool,
    pub proxy_bin: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
}

/// Assembles a [`ScanConfig`] from `working_dir`'s input files, falling back
/// to built-in defaults for anything missing or malformed (§6, §7
/// `SetupError`/`TemplateError`).
pub fn load(working_dir: &Path, opts: LoadOptions) -> Result<ScanConfig> {
    let out_dir = opts.out_dir.unwrap_or_else(|| working_dir.to_path_buf());
    fs::create_dir_all(&out_dir)
        .map_err(|e| ScanError::Fatal(format!("cannot create output directory: {e}")))?;
    fs::create_dir_all(out_dir.join("output_configs"))
        .map_err(|e| ScanError::Fatal(format!("cannot create output_configs directory: {e}")))?;

    let v4_ranges = load_v4_ranges(working_dir);
    let v6_ranges = load_v6_ranges(working_dir);
    let domains = load_domains(working_dir);

    let proxy_bin = match opts.proxy_bin {
        Some(path) if path.exists() => Some(path),
        Some(path) => {
            warn!(path = %path.display(), "proxy binary not found, proxy stage disabled");
            None
        }
        None => None,
    };

    let (template, original_fragment) = load_template(working_dir);

    Ok(ScanConfig {
        working_dir: working_dir.to_path_buf(),
        power: opts.power,
        target: opts.target,
        debug: opts.debug,
        proxy_bin,
        out_dir,
        v4_ranges,
        v6_ranges,
        domains,
        template,
        original_fragment,
    })
}

fn load_v4_ranges(working_dir: &Path) -> Vec<Ipv4Net> {
    let ranges = read_lines(&working_dir.join("ipv4.txt"))
        .into_iter()
        .filter_map(|line| match line.parse::<Ipv4Net>() {
            Ok(net) => Some(net),
            Err(e) => {
                warn!(line, %e, "skipping malformed IPv4 range");
                None
            }
        })
        .collect::<Vec<_>>();

    if ranges.is_empty() {
        warn!(default = DEFAULT_V4_CIDR, "no IPv4 ranges found, using built-in default");
        vec![DEFAULT_V4_CIDR.parse().expect("default v4 CIDR is valid")]
    } else {
        ranges
    }
}

fn load_v6_ranges(working_dir: &Path) -> Vec<Ipv6Net> {
    read_lines(&working_dir.join("ipv6.txt"))
        .into_iter()
        .filter_map(|line| match line.parse::<Ipv6Net>() {
            Ok(net) => Some(net),
            Err(e) => {
                warn!(line, %e, "skipping malformed IPv6 range");
                None
            }
        })
        .collect()
}

fn load_domains(working_dir: &Path) -> Vec<String> {
    let domains = read_lines(&working_dir.join("cloudflare-domains.txt"));
    if domains.is_empty() {
        DEFAULT_DOMAINS.iter().map(|s| s.to_string()).collect()
    } else {
        domains
    }
}

/// When exactly one of `config.json`/`config.txt` is present, the other is
/// derived via the C2 codec (§6). `config.json` wins when both are present.
/// Returns the original fragment alongside the template so C6 can carry it
/// into its rewritten output (§4.6).
fn load_template(working_dir: &Path) -> (Option<ProxyTemplate>, Option<String>) {
    let json_path = working_dir.join("config.json");
    let txt_path = working_dir.join("config.txt");

    let json_text = fs::read_to_string(&json_path).ok();
    let txt_text = fs::read_to_string(&txt_path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    if let Some(json) = json_text {
        match ProxyTemplate::from_json_str(&json) {
            Ok(tpl) => return (Some(tpl), None),
            Err(e) => warn!(%e, "config.json malformed, proxy stage degraded"),
        }
    }

    if let Some(uri) = txt_text {
        match codec::parse(&uri) {
            Ok(tpl) => {
                let fragment = url::Url::parse(&uri)
                    .ok()
                    .and_then(|u| u.fragment().map(str::to_string));
                return (Some(tpl), fragment);
            }
            Err(e) => warn!(%e, "config.txt malformed, proxy stage degraded"),
        }
    }

    (None, None)
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .map(|s| {
            s.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_default_v4_range_when_file_absent() {
        let dir = tempfile::tempdir().unwrap();
        let ranges = load_v4_ranges(dir.path());
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].to_string(), DEFAULT_V4_CIDR);
    }

    #[test]
    fn falls_back_to_default_domains_when_file_absent() {
        let dir = tempfile::tempdir().unwrap();
        let domains = load_domains(dir.path());
        assert_eq!(domains, vec!["speed.cloudflare.com", "zula.ir"]);
    }

    #[test]
    fn derives_template_from_config_txt_when_json_absent() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.txt"),
            "vless://abc-uuid@1.2.3.4:443?type=ws&security=tls&sni=example.com&path=/ws&host=example.com#orig\n",
        )
        .unwrap();
        let (tpl, _fragment) = load_template(dir.path());
        let tpl = tpl.expect("template should derive from config.txt");
        let ob = tpl.primary_outbound().unwrap();
        assert_eq!(ob.protocol, crate::config::template::Protocol::Vless);
    }

    #[test]
    fn missing_inputs_disable_proxy_stage() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load(
            dir.path(),
            LoadOptions {
                power: 50,
                target: None,
                debug: false,
                proxy_bin: None,
                out_dir: None,
            },
        )
        .unwrap();
        assert!(!cfg.proxy_stage_enabled());
    }
}
