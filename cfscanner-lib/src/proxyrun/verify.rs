//! C6 steps 5-6: the verify request through the local proxy (§4.6).
//!
//! The variant-A `generate_204` round trip is a cheap accept/reject
//! precheck; the variant-B `/__down` download is what gets timed and
//! scored, so a candidate that cannot even complete the 204 round trip
//! never pays for the full download timeout (§4.6).

use std::time::{Duration, Instant};

use reqwest::{Client, Proxy};

use crate::net::Speed;
use crate::pipeline::candidate::ProxyProbeError;

const PRECHECK_URL: &str = "http://cp.cloudflare.com/generate_204";
const DOWNLOAD_URL: &str = "https://speed.cloudflare.com/__down?bytes=500000";
const DOWNLOAD_MIN_BYTES: u64 = 100_000;
const PRECHECK_TIMEOUT: Duration = Duration::from_secs(5);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ProxyVerifyOutcome {
    pub proxy_latency_ms: u64,
    pub speed: Speed,
}

pub async fn verify(proxy_url: &str) -> Result<ProxyVerifyOutcome, ProxyProbeError> {
    let precheck_client = build_client(proxy_url, PRECHECK_TIMEOUT)?;
    let precheck = precheck_client
        .get(PRECHECK_URL)
        .send()
        .await
        .map_err(|e| ProxyProbeError::RequestFailed(e.to_string()))?;
    let precheck_status = precheck.status().as_u16();
    if precheck_status != 200 && precheck_status != 204 {
        return Err(ProxyProbeError::NotAccepted { status: Some(precheck_status) });
    }

    let download_client = build_client(proxy_url, DOWNLOAD_TIMEOUT)?;
    let started = Instant::now();
    let mut response = download_client
        .get(DOWNLOAD_URL)
        .send()
        .await
        .map_err(|e| ProxyProbeError::RequestFailed(e.to_string()))?;
    let ttfb = started.elapsed();

    let status = response.status().as_u16();
    if status != 200 {
        return Err(ProxyProbeError::NotAccepted { status: Some(status) });
    }

    let mut total: u64 = 0;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| ProxyProbeError::RequestFailed(e.to_string()))?
    {
        total += chunk.len() as u64;
    }

    if total < DOWNLOAD_MIN_BYTES {
        return Err(ProxyProbeError::NotAccepted { status: Some(status) });
    }

    let seconds = started.elapsed().as_secs_f64().max(0.001);
    let kbps = (total as f64 / 1024.0) / seconds;

    Ok(ProxyVerifyOutcome {
        proxy_latency_ms: ttfb.as_millis() as u64,
        speed: Speed::KiloBytesPerSecond(kbps),
    })
}

fn build_client(proxy_url: &str, request_timeout: Duration) -> Result<Client, ProxyProbeError> {
    let proxy =
        Proxy::all(proxy_url).map_err(|e| ProxyProbeError::RequestFailed(e.to_string()))?;
    Client::builder()
        .proxy(proxy)
        .danger_accept_invalid_certs(true)
        .timeout(request_timeout)
        .build()
        .map_err(|e| ProxyProbeError::RequestFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_min_is_below_the_requested_size() {
        assert!(DOWNLOAD_MIN_BYTES < 500_000);
    }
}
