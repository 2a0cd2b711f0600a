//! Query-parameter derivation rules for the VLESS/Trojan URI grammar (§4.2).
//!
//! Kept separate from [`super::uri`] because the defaulting rules
//! (`sni`/`host` mutual fallback, `alpn`/`fp` defaults) are applied the same
//! way on both the parse and the rewrite (C6) paths.

use std::collections::BTreeMap;

/// A parsed query-parameter map, order-preserving for unknown keys so
/// `serialize(parse(u))` can still present values in a stable order.
#[derive(Debug, Clone, Default)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    pub fn from_query(query: Option<&str>) -> Self {
        let mut map = BTreeMap::new();
        if let Some(q) = query {
            for pair in q.split('&').filter(|s| !s.is_empty()) {
                let mut it = pair.splitn(2, '=');
                let k = it.next().unwrap_or_default();
                let v = it.next().unwrap_or_default();
                let k = percent_decode(k);
                let v = percent_decode(v);
                map.insert(k, v);
            }
        }
        Params(map)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|s| s.as_str())
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn to_query_string(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

pub fn percent_decode(s: &str) -> String {
    percent_encoding::percent_decode_str(s)
        .decode_utf8_lossy()
        .into_owned()
}

pub fn percent_encode(s: &str) -> String {
    percent_encoding::utf8_percent_encode(s, percent_encoding::NON_ALPHANUMERIC).to_string()
}

/// `sni` defaults to `host` then to the URI's netloc host (§4.2).
pub fn derive_sni(sni_param: Option<&str>, host_param: Option<&str>, netloc_host: &str) -> String {
    sni_param
        .or(host_param)
        .unwrap_or(netloc_host)
        .to_string()
}

/// `host` defaults to `sni` (§4.2).
pub fn derive_host(host_param: Option<&str>, sni: &str) -> String {
    host_param.unwrap_or(sni).to_string()
}

/// `alpn` defaults to `http/1.1` for `ws`, else `h2,http/1.1` (§4.2).
pub fn derive_alpn(alpn_param: Option<&str>, network: &str) -> Vec<String> {
    match alpn_param {
        Some(v) => v.split(',').map(|s| s.trim().to_string()).collect(),
        None if network == "ws" => vec!["http/1.1".to_string()],
        None => vec!["h2".to_string(), "http/1.1".to_string()],
    }
}

/// `fp` defaults to `chrome` (§4.2).
pub fn derive_fingerprint(fp_param: Option<&str>) -> String {
    fp_param.unwrap_or("chrome").to_string()
}
