//! C1, C3, C4, C5: range sampling and the direct-connection probe chain.

pub mod hotring;
pub mod ranges;
pub mod speed_probe;
pub mod tcp_probe;
pub mod tls_client;
pub mod tls_probe;

pub use hotring::HotSubnetRing;
pub use ranges::RangeSampler;

/// A throughput measurement tagged with its unit, so `Mbps` (the C5
/// direct-only path) and `KB/s` (the C6 proxy path) never get compared or
/// summed without going through an explicit conversion (§4.5).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Speed {
    Mbps(f64),
    KiloBytesPerSecond(f64),
}

impl Speed {
    pub fn value(self) -> f64 {
        match self {
            Speed::Mbps(v) | Speed::KiloBytesPerSecond(v) => v,
        }
    }

    pub fn unit_label(self) -> &'static str {
        match self {
            Speed::Mbps(_) => "Mbps",
            Speed::KiloBytesPerSecond(_) => "KB/s",
        }
    }
}

/// A size/threshold variant for the `/__down?bytes=N` download probe shared
/// by C5 and C6's variant-B shape (§4.5). The accept threshold always
/// travels with the `N` that produced it so the two can never cross-wire.
#[derive(Debug, Clone, Copy)]
pub struct DownloadVariant {
    pub n_bytes: u64,
    pub b_min: u64,
}

impl DownloadVariant {
    pub const HUNDRED_K: DownloadVariant = DownloadVariant { n_bytes: 100_000, b_min: 50_000 };
    pub const ONE_MILLION: DownloadVariant = DownloadVariant { n_bytes: 1_000_000, b_min: 500_000 };
}
