//! C5: the speed prober (§4.5).

use std::net::IpAddr;
use std::time::{Duration, Instant};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::net::tls_client::insecure_client_config;
use crate::net::{DownloadVariant, Speed};
use crate::pipeline::candidate::CandidateReject;

const SPEED_SNI: &str = "speed.cloudflare.com";
const DIAL_TIMEOUT: Duration = Duration::from_secs(3);
const CHUNK_TIMEOUT: Duration = Duration::from_secs(2);
const CHUNK_SIZE: usize = 8 * 1024;

pub struct SpeedProbeOutcome {
    pub direct_speed: Speed,
}

/// Downloads `variant.n_bytes` from Cloudflare's speed-test endpoint
/// through direct TLS to the candidate and computes Mbps throughput
/// (§4.5). Rejects if the accumulated byte count falls short of
/// `variant.b_min`.
pub async fn probe(ip: IpAddr, variant: DownloadVariant) -> Result<SpeedProbeOutcome, CandidateReject> {
    let connector = tokio_rustls::TlsConnector::from(insecure_client_config());
    let server_name = ServerName::try_from(SPEED_SNI).expect("static SNI is valid");

    let tcp = timeout(DIAL_TIMEOUT, TcpStream::connect((ip, 443)))
        .await
        .map_err(|_| CandidateReject::SpeedDialFailed)?
        .map_err(|_| CandidateReject::SpeedDialFailed)?;

    let mut tls = timeout(DIAL_TIMEOUT, connector.connect(server_name, tcp))
        .await
        .map_err(|_| CandidateReject::SpeedDialFailed)?
        .map_err(|_| CandidateReject::SpeedDialFailed)?;

    let request = format!(
        "GET /__down?bytes={} HTTP/1.1\r\nHost: {SPEED_SNI}\r\nConnection: close\r\n\r\n",
        variant.n_bytes
    );
    timeout(DIAL_TIMEOUT, tls.write_all(request.as_bytes()))
        .await
        .map_err(|_| CandidateReject::SpeedDialFailed)?
        .map_err(|_| CandidateReject::SpeedDialFailed)?;

    let started = Instant::now();
    let mut total: u64 = 0;
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        match timeout(CHUNK_TIMEOUT, tls.read(&mut buf)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => total += n as u64,
            Ok(Err(_)) => break,
            Err(_) => return Err(CandidateReject::SpeedReadTimedOut),
        }
    }
    let elapsed = started.elapsed();
    let _ = tls.shutdown().await;

    if !accepts(total, variant) {
        return Err(CandidateReject::SpeedBelowThreshold);
    }

    let seconds = elapsed.as_secs_f64().max(0.001);
    let mbps = (total as f64 * 8.0) / seconds / 1_000_000.0;
    Ok(SpeedProbeOutcome { direct_speed: Speed::Mbps(mbps) })
}

/// The accept criterion of §4.5: `B >= B_min`, pulled out as a pure
/// function so it is testable without a live download (§8 S3).
fn accepts(total_bytes: u64, variant: DownloadVariant) -> bool {
    total_bytes >= variant.b_min
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_thresholds_are_half_of_n() {
        assert_eq!(DownloadVariant::HUNDRED_K.b_min, 50_000);
        assert_eq!(DownloadVariant::ONE_MILLION.b_min, 500_000);
    }

    #[test]
    fn s3_40k_against_100k_rejects_80k_accepts() {
        assert!(!accepts(40_000, DownloadVariant::HUNDRED_K));
        assert!(accepts(80_000, DownloadVariant::HUNDRED_K));
    }
}
