//! C4: the TLS prober (§4.4).

use std::net::IpAddr;
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::net::tls_client::insecure_client_config;
use crate::pipeline::candidate::CandidateReject;

const DIAL_TIMEOUT: Duration = Duration::from_secs(2);
const READ_TIMEOUT: Duration = Duration::from_secs(2);
const READ_CAP: usize = 1024;

pub struct TlsProbeOutcome {
    pub tls_latency_ms: u64,
}

/// Opens TLS to `<ip>:443` under a uniformly-chosen SNI from `domains`,
/// certificate verification disabled, and checks the response for the
/// Cloudflare accept markers (§4.4).
pub async fn probe(ip: IpAddr, domains: &[String]) -> Result<TlsProbeOutcome, CandidateReject> {
    let sni = domains
        .choose(&mut rand::thread_rng())
        .cloned()
        .unwrap_or_else(|| "speed.cloudflare.com".to_string());

    let started = Instant::now();

    let connector = tokio_rustls::TlsConnector::from(insecure_client_config());
    let server_name =
        ServerName::try_from(sni.clone()).map_err(|_| CandidateReject::TlsHandshakeFailed)?;

    let tcp = timeout(DIAL_TIMEOUT, TcpStream::connect((ip, 443)))
        .await
        .map_err(|_| CandidateReject::TlsHandshakeFailed)?
        .map_err(|_| CandidateReject::TlsHandshakeFailed)?;

    let mut tls = timeout(DIAL_TIMEOUT, connector.connect(server_name, tcp))
        .await
        .map_err(|_| CandidateReject::TlsHandshakeFailed)?
        .map_err(|_| CandidateReject::TlsHandshakeFailed)?;

    let request = format!("GET / HTTP/1.1\r\nHost: {sni}\r\nConnection: close\r\n\r\n");
    timeout(DIAL_TIMEOUT, tls.write_all(request.as_bytes()))
        .await
        .map_err(|_| CandidateReject::TlsHandshakeFailed)?
        .map_err(|_| CandidateReject::TlsHandshakeFailed)?;

    let mut buf = vec![0u8; READ_CAP];
    let n = match timeout(READ_TIMEOUT, tls.read(&mut buf)).await {
        Ok(Ok(n)) => n,
        Ok(Err(_)) | Err(_) => return Err(CandidateReject::TlsResponseTimedOut),
    };
    let _ = tls.shutdown().await;

    let tls_latency_ms = started.elapsed().as_millis() as u64;

    if accept(&buf[..n]) {
        Ok(TlsProbeOutcome { tls_latency_ms })
    } else {
        Err(CandidateReject::TlsResponseNotAccepted)
    }
}

/// Either marker suffices, matched logical OR (§9 "Accept-disjunction
/// decision"). `cloudflare` is case-insensitive; `403 Forbidden` is literal.
fn accept(body: &[u8]) -> bool {
    let lower = String::from_utf8_lossy(body).to_ascii_lowercase();
    lower.contains("cloudflare") || String::from_utf8_lossy(body).contains("403 Forbidden")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_cloudflare_marker_case_insensitively() {
        assert!(accept(b"HTTP/1.1 200 OK\r\nServer: CloudFlare\r\n\r\n"));
    }

    #[test]
    fn accepts_403_forbidden_literal() {
        assert!(accept(b"HTTP/1.1 403 Forbidden\r\n\r\n"));
    }

    #[test]
    fn rejects_unrelated_response() {
        assert!(!accept(b"HTTP/1.1 200 OK\r\nServer: nginx\r\n\r\n"));
    }
}
