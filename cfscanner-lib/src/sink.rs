//! C8: the result sink (§4.8).

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::warn;

use crate::config::template::ProxyTemplate;
use crate::net::Speed;

/// A candidate that passed its terminal stage (§3 "Verified entry"): C5
/// direct (`speed` in Mbps, `proxy_latency_ms == 0`) or C6 proxy (`speed`
/// in KB/s, `proxy_latency_ms > 0`).
#[derive(Debug, Clone)]
pub struct VerifiedEntry {
    pub ip: String,
    pub speed: Speed,
    pub tls_latency_ms: u64,
    pub proxy_latency_ms: u64,
    pub config: Option<ProxyTemplate>,
    pub rewritten_uri: Option<String>,
}

impl VerifiedEntry {
    pub fn new(
        ip: String,
        speed: Speed,
        tls_latency_ms: u64,
        proxy_latency_ms: u64,
        config: Option<ProxyTemplate>,
        rewritten_uri: Option<String>,
    ) -> Self {
        Self { ip, speed, tls_latency_ms, proxy_latency_ms, config, rewritten_uri }
    }

    /// `speed*1000/max(tls_latency_ms,1)` for the C5 direct path
    /// (`Speed::Mbps`); `speed/max(proxy_latency_ms,1)` for the C6 proxy
    /// path (`Speed::KiloBytesPerSecond`) — the two score shapes of §4.6,
    /// selected by the unit the speed itself carries rather than by a
    /// separate flag (§9 "Unit decision").
    pub fn score(&self) -> f64 {
        match self.speed {
            Speed::Mbps(v) => v * 1000.0 / (self.tls_latency_ms.max(1) as f64),
            Speed::KiloBytesPerSecond(v) => v / (self.proxy_latency_ms.max(1) as f64),
        }
    }
}

/// Append-only, re-sorted-on-write result store (§4.8). One per scan
/// session; file writes land under the paths it was built with
/// ([`crate::config::ScanConfig::output_configs_dir`] etc).
pub struct Sink {
    entries: Mutex<Vec<VerifiedEntry>>,
    output_configs_dir: PathBuf,
    vless_links_path: PathBuf,
    clean_ips_csv_path: PathBuf,
}

impl Sink {
    pub fn new(
        output_configs_dir: PathBuf,
        vless_links_path: PathBuf,
        clean_ips_csv_path: PathBuf,
    ) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            output_configs_dir,
            vless_links_path,
            clean_ips_csv_path,
        }
    }

    /// Appends `entry`, keeping at most one entry per IP (§3 "Verified
    /// entry", "entries are unique by `ip`"): a repeat IP replaces its
    /// existing entry only if the new one scores higher, otherwise it is
    /// dropped and neither its config nor its URI line is written. Returns
    /// the deduped entry count observed immediately after, under the same
    /// lock as the insert/replace and the re-sort — the atomic half of
    /// target-reached auto-stop (§5).
    pub fn append(&self, entry: VerifiedEntry) -> usize {
        let mut guard = self.entries.lock();

        let written = if let Some(existing) = guard.iter_mut().find(|e| e.ip == entry.ip) {
            if entry.score() <= existing.score() {
                None
            } else {
                *existing = entry;
                Some(existing.clone())
            }
        } else {
            guard.push(entry);
            guard.last().cloned()
        };

        guard.sort_by(|a, b| b.score().partial_cmp(&a.score()).unwrap_or(std::cmp::Ordering::Equal));
        let count = guard.len();
        drop(guard);

        if let Some(entry) = written {
            self.write_entry_files(&entry);
        }
        count
    }

    fn write_entry_files(&self, entry: &VerifiedEntry) {
        if let Some(config) = &entry.config {
            let filename = format!("config_{}.json", entry.ip.replace(':', "_"));
            if let Err(e) =
                fs::write(self.output_configs_dir.join(filename), config.to_json_pretty())
            {
                warn!(ip = %entry.ip, %e, "failed to write specialized config");
            }
        }
        if let Some(uri) = &entry.rewritten_uri {
            if let Err(e) = append_line(&self.vless_links_path, uri) {
                warn!(ip = %entry.ip, %e, "failed to append vless link");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ranked(&self) -> Vec<VerifiedEntry> {
        self.entries.lock().clone()
    }

    /// Writes the full ranked table on demand (§6 "Outputs").
    pub fn save_csv(&self) -> io::Result<()> {
        let mut writer = csv::Writer::from_path(&self.clean_ips_csv_path)?;
        writer.write_record(["Rank", "IP", "Speed", "TLS Latency (ms)", "Proxy Latency (ms)", "Score"])?;
        for (i, entry) in self.ranked().iter().enumerate() {
            writer.write_record([
                (i + 1).to_string(),
                entry.ip.clone(),
                format!("{:.2} {}", entry.speed.value(), entry.speed.unit_label()),
                entry.tls_latency_ms.to_string(),
                entry.proxy_latency_ms.to_string(),
                format!("{:.4}", entry.score()),
            ])?;
        }
        writer.flush()
    }
}

fn append_line(path: &Path, line: &str) -> io::Result<()> {
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_formula_is_selected_by_speed_unit() {
        let direct = VerifiedEntry::new("1.2.3.4".into(), Speed::Mbps(10.0), 100, 0, None, None);
        assert!((direct.score() - 100.0).abs() < 1e-9);

        let proxied =
            VerifiedEntry::new("1.2.3.4".into(), Speed::KiloBytesPerSecond(500.0), 100, 50, None, None);
        assert!((proxied.score() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn append_reorders_by_descending_score() {
        let dir = tempfile::tempdir().unwrap();
        let configs_dir = dir.path().join("output_configs");
        fs::create_dir_all(&configs_dir).unwrap();
        let sink = Sink::new(
            configs_dir,
            dir.path().join("vless_links.txt"),
            dir.path().join("clean_ips.csv"),
        );
        sink.append(VerifiedEntry::new("1.1.1.1".into(), Speed::Mbps(5.0), 100, 0, None, None));
        let count = sink.append(VerifiedEntry::new("2.2.2.2".into(), Speed::Mbps(50.0), 100, 0, None, None));
        assert_eq!(count, 2);
        let ranked = sink.ranked();
        assert_eq!(ranked[0].ip, "2.2.2.2");
        assert_eq!(ranked[1].ip, "1.1.1.1");
    }

    #[test]
    fn a_repeat_ip_replaces_rather_than_duplicates_when_it_scores_higher() {
        let dir = tempfile::tempdir().unwrap();
        let configs_dir = dir.path().join("output_configs");
        fs::create_dir_all(&configs_dir).unwrap();
        let sink = Sink::new(
            configs_dir,
            dir.path().join("vless_links.txt"),
            dir.path().join("clean_ips.csv"),
        );
        sink.append(VerifiedEntry::new("1.1.1.1".into(), Speed::Mbps(5.0), 100, 0, None, None));
        let count = sink.append(VerifiedEntry::new("1.1.1.1".into(), Speed::Mbps(50.0), 100, 0, None, None));
        assert_eq!(count, 1);
        let ranked = sink.ranked();
        assert_eq!(ranked.len(), 1);
        assert!((ranked[0].speed.value() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn a_repeat_ip_is_dropped_when_it_scores_no_better() {
        let dir = tempfile::tempdir().unwrap();
        let configs_dir = dir.path().join("output_configs");
        fs::create_dir_all(&configs_dir).unwrap();
        let sink = Sink::new(
            configs_dir,
            dir.path().join("vless_links.txt"),
            dir.path().join("clean_ips.csv"),
        );
        sink.append(VerifiedEntry::new("1.1.1.1".into(), Speed::Mbps(50.0), 100, 0, None, None));
        let count = sink.append(VerifiedEntry::new("1.1.1.1".into(), Speed::Mbps(5.0), 100, 0, None, None));
        assert_eq!(count, 1);
        let ranked = sink.ranked();
        assert!((ranked[0].speed.value() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn save_csv_writes_the_header_and_one_row_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let configs_dir = dir.path().join("output_configs");
        fs::create_dir_all(&configs_dir).unwrap();
        let csv_path = dir.path().join("clean_ips.csv");
        let sink = Sink::new(configs_dir, dir.path().join("vless_links.txt"), csv_path.clone());
        sink.append(VerifiedEntry::new("1.1.1.1".into(), Speed::Mbps(5.0), 100, 0, None, None));
        sink.save_csv().unwrap();
        let contents = fs::read_to_string(csv_path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.starts_with("Rank,IP,Speed"));
    }
}
