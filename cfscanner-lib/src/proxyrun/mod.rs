//! C6: the proxy verifier (§4.6).

pub mod specialize;
pub mod subprocess;
pub mod verify;

use std::path::Path;

use crate::codec;
use crate::config::template::ProxyTemplate;
use crate::net::Speed;
use crate::pipeline::candidate::ProxyProbeError;
use subprocess::ProxyProcessGuard;

pub struct ProxyRunOutcome {
    pub proxy_latency_ms: u64,
    pub speed: Speed,
    pub rewritten_uri: String,
}

/// Runs the full C6 probe for one candidate: specialize, spawn, verify,
/// cleanup. Cleanup runs on every exit path, including the error paths
/// below, before the result is returned (§4.6 step 7).
pub async fn run_probe(
    proxy_bin: &Path,
    template: &ProxyTemplate,
    ip: &str,
    original_fragment: Option<&str>,
) -> Result<ProxyRunOutcome, ProxyProbeError> {
    let specialized = specialize::specialize(template, ip)
        .map_err(|e| ProxyProbeError::SpecializeFailed(e.to_string()))?;
    let local_port = specialize::local_port(&specialized).unwrap_or(0);

    let mut guard = ProxyProcessGuard::spawn(proxy_bin, &specialized, local_port).await?;

    let verified = verify::verify(&guard.local_proxy_url()).await;
    guard.cleanup().await;
    let outcome = verified?;

    let rewritten_uri = codec::serialize(&specialized, original_fragment)
        .map_err(|e| ProxyProbeError::SpecializeFailed(e.to_string()))?;

    Ok(ProxyRunOutcome {
        proxy_latency_ms: outcome.proxy_latency_ms,
        speed: outcome.speed,
        rewritten_uri,
    })
}
