//! Built-in fallbacks used by the loader when an input file is absent or
//! unreadable (§6 "Inputs", §7 `SetupError`).

/// Used when `ipv4.txt` is missing or empty.
pub const DEFAULT_V4_CIDR: &str = "104.16.0.0/12";

/// Used when `cloudflare-domains.txt` is missing or empty.
pub const DEFAULT_DOMAINS: &[&str] = &["speed.cloudflare.com", "zula.ir"];
