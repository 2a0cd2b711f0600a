//! C6 steps 2-4 and 7: launching the external proxy binary and guaranteeing
//! its cleanup (§4.6, §9 "Subprocess lifetime").

use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tempfile::NamedTempFile;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::debug;

use crate::config::template::ProxyTemplate;
use crate::pipeline::candidate::ProxyProbeError;

const WARMUP: Duration = Duration::from_millis(1500);
const GRACEFUL_SHUTDOWN: Duration = Duration::from_secs(1);

/// RAII guard over one C6 probe's subprocess and temp config file.
///
/// `.cleanup().await` is the guaranteed path: SIGTERM, wait up to 1s,
/// SIGKILL if still alive, delete the temp file. `Drop` is a kill-on-drop
/// backstop for a probe cancelled before reaching it — `kill_on_drop` on
/// the underlying `Command` already arms tokio's own reap, so the guard
/// only needs to force-kill, not wait.
pub struct ProxyProcessGuard {
    child: Option<Child>,
    temp_file: Option<NamedTempFile>,
    local_port: u16,
}

impl ProxyProcessGuard {
    pub async fn spawn(
        proxy_bin: &Path,
        specialized: &ProxyTemplate,
        local_port: u16,
    ) -> Result<Self, ProxyProbeError> {
        let temp_file = Self::write_temp_config(specialized)?;
        let args = ["run", "-c", temp_file.path().to_str().unwrap_or_default()];
        Self::spawn_child(proxy_bin, &args, temp_file, local_port).await
    }

    /// Like [`Self::spawn`] but with caller-supplied argv, the temp config
    /// path substituted nowhere — used by tests to stand in for the real
    /// proxy binary with a plain shell command (§8 S6).
    #[doc(hidden)]
    pub async fn spawn_with_args(
        bin: &Path,
        args: &[&str],
        specialized: &ProxyTemplate,
        local_port: u16,
    ) -> Result<Self, ProxyProbeError> {
        let temp_file = Self::write_temp_config(specialized)?;
        Self::spawn_child(bin, args, temp_file, local_port).await
    }

    fn write_temp_config(specialized: &ProxyTemplate) -> Result<NamedTempFile, ProxyProbeError> {
        let mut temp_file =
            NamedTempFile::new().map_err(|e| ProxyProbeError::WriteConfigFailed(e.to_string()))?;
        temp_file
            .write_all(specialized.to_json_pretty().as_bytes())
            .map_err(|e| ProxyProbeError::WriteConfigFailed(e.to_string()))?;
        temp_file
            .flush()
            .map_err(|e| ProxyProbeError::WriteConfigFailed(e.to_string()))?;
        Ok(temp_file)
    }

    async fn spawn_child(
        bin: &Path,
        args: &[&str],
        temp_file: NamedTempFile,
        local_port: u16,
    ) -> Result<Self, ProxyProbeError> {
        let child = Command::new(bin)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProxyProbeError::SpawnFailed(e.to_string()))?;

        tokio::time::sleep(WARMUP).await;

        Ok(Self { child: Some(child), temp_file: Some(temp_file), local_port })
    }

    pub fn local_proxy_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.local_port)
    }

    /// The path of the temp config file backing this probe, for tests that
    /// need to assert it is gone after cleanup (§8 S6).
    #[doc(hidden)]
    pub fn temp_config_path(&self) -> &Path {
        self.temp_file.as_ref().expect("temp file lives until cleanup").path()
    }

    pub async fn cleanup(&mut self) {
        if let Some(mut child) = self.child.take() {
            send_sigterm(&child);
            if timeout(GRACEFUL_SHUTDOWN, child.wait()).await.is_err() {
                debug!(timeout = ?GRACEFUL_SHUTDOWN, "proxy subprocess ignored SIGTERM, sending SIGKILL");
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
        }
        self.temp_file.take();
    }
}

fn send_sigterm(child: &Child) {
    let Some(pid) = child.id() else { return };
    let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
}

impl Drop for ProxyProcessGuard {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
        }
    }
}
