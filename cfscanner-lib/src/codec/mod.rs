//! C2: the VLESS/Trojan URI ↔ [`crate::config::template::ProxyTemplate`] codec.

pub mod params;
pub mod uri;

pub use uri::{parse, serialize};
