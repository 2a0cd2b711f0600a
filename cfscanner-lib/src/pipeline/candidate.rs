//! Per-candidate record and reject taxonomy (§3 "Candidate record", §7).
//!
//! These never cross a stage boundary as an `Err` that aborts anything —
//! a reject just means the candidate is dropped, silently (C3-C5) or with a
//! debug log (C6). Contrast with [`crate::error::ScanError`], which is for
//! failures that abort or degrade the whole pipeline.

use crate::net::Speed;

/// A candidate IP progressing through C3 → C4 → C5 → (C6 or sink).
/// Fields accumulate; nothing is ever removed.
#[derive(Debug, Clone)]
pub struct CandidateRecord {
    pub ip: String,
    pub tls_latency_ms: Option<u64>,
    pub direct_speed: Option<Speed>,
    pub proxy_latency_ms: Option<u64>,
    pub proxy_speed: Option<Speed>,
}

impl CandidateRecord {
    pub fn new(ip: String) -> Self {
        Self {
            ip,
            tls_latency_ms: None,
            direct_speed: None,
            proxy_latency_ms: None,
            proxy_speed: None,
        }
    }
}

/// Why a candidate was dropped at or before the speed stage (C3-C5).
/// Never logged (§7): these are the overwhelming majority of outcomes and
/// logging them would drown the signal from real problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateReject {
    TcpDialFailed,
    TcpDialTimedOut,
    TlsHandshakeFailed,
    TlsResponseTimedOut,
    TlsResponseNotAccepted,
    SpeedDialFailed,
    SpeedReadTimedOut,
    SpeedBelowThreshold,
    QueueTimedOut,
}

/// Why a candidate failed C6 specifically. Logged at `debug` (§4.10, §7);
/// still just a per-candidate drop, never propagated as a [`crate::error::ScanError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyProbeError {
    SpecializeFailed(String),
    WriteConfigFailed(String),
    SpawnFailed(String),
    RequestFailed(String),
    RequestTimedOut,
    NotAccepted { status: Option<u16> },
}

impl std::fmt::Display for ProxyProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProxyProbeError::SpecializeFailed(e) => write!(f, "config specialization failed: {e}"),
            ProxyProbeError::WriteConfigFailed(e) => write!(f, "writing temp config failed: {e}"),
            ProxyProbeError::SpawnFailed(e) => write!(f, "spawning proxy binary failed: {e}"),
            ProxyProbeError::RequestFailed(e) => write!(f, "proxy verify request failed: {e}"),
            ProxyProbeError::RequestTimedOut => write!(f, "proxy verify request timed out"),
            ProxyProbeError::NotAccepted { status } => {
                write!(f, "proxy verify request not accepted (status={status:?})")
            }
        }
    }
}
