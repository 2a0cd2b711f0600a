//! The structured proxy config object that C2 parses URIs into and C6
//! specializes per candidate IP (§3 "Proxy template", §9 "Dynamic template
//! mutation").
//!
//! Modeled as a tagged variant on `outbounds[0].protocol` with a sum-typed
//! `streamSettings`, per the REDESIGN FLAGS note: the source treats this tree
//! as opaque JSON, but a typed implementation should make the protocol and
//! transport choice explicit in the type.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProxyTemplate {
    pub inbounds: Vec<Inbound>,
    pub outbounds: Vec<Outbound>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Inbound {
    pub port: u16,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Outbound {
    pub protocol: Protocol,
    pub settings: OutboundSettings,
    #[serde(rename = "streamSettings", skip_serializing_if = "Option::is_none")]
    pub stream_settings: Option<StreamSettings>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Vless,
    Trojan,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Vless => "vless",
            Protocol::Trojan => "trojan",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CodecError> {
        match s {
            "vless" => Ok(Protocol::Vless),
            "trojan" => Ok(Protocol::Trojan),
            other => Err(CodecError::UnsupportedScheme(other.to_string())),
        }
    }
}

/// Authoritative settings subtree, gated by `outbounds[0].protocol` (§3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum OutboundSettings {
    Vless { vnext: Vec<VlessServer> },
    Trojan { servers: Vec<TrojanServer> },
}

impl OutboundSettings {
    /// Address field mutated by C6 when specializing the template for a
    /// candidate IP; the only field stage C6 is allowed to touch (§9).
    pub fn address(&self) -> Option<&str> {
        match self {
            OutboundSettings::Vless { vnext } => vnext.first().map(|v| v.address.as_str()),
            OutboundSettings::Trojan { servers } => servers.first().map(|s| s.address.as_str()),
        }
    }

    pub fn set_address(&mut self, ip: &str) {
        match self {
            OutboundSettings::Vless { vnext } => {
                if let Some(v) = vnext.first_mut() {
                    v.address = ip.to_string();
                }
            }
            OutboundSettings::Trojan { servers } => {
                if let Some(s) = servers.first_mut() {
                    s.address = ip.to_string();
                }
            }
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            OutboundSettings::Vless { vnext } => vnext.first().map(|v| v.port).unwrap_or(443),
            OutboundSettings::Trojan { servers } => {
                servers.first().map(|s| s.port).unwrap_or(443)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VlessServer {
    pub address: String,
    pub port: u16,
    pub users: Vec<VlessUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VlessUser {
    pub id: String,
    #[serde(default = "default_encryption")]
    pub encryption: String,
}

fn default_encryption() -> String {
    "none".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrojanServer {
    pub address: String,
    pub port: u16,
    pub password: String,
}

/// Sum type over the transport set named in §4.2: tcp, ws, xhttp, grpc.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamSettings {
    pub network: Network,
    pub security: Security,
    #[serde(rename = "tlsSettings", skip_serializing_if = "Option::is_none")]
    pub tls_settings: Option<TlsSettings>,
    #[serde(rename = "tcpSettings", skip_serializing_if = "Option::is_none")]
    pub tcp_settings: Option<TcpSettings>,
    #[serde(rename = "wsSettings", skip_serializing_if = "Option::is_none")]
    pub ws_settings: Option<WsSettings>,
    #[serde(rename = "xhttpSettings", skip_serializing_if = "Option::is_none")]
    pub xhttp_settings: Option<XhttpSettings>,
    #[serde(rename = "grpcSettings", skip_serializing_if = "Option::is_none")]
    pub grpc_settings: Option<GrpcSettings>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Tcp,
    Ws,
    Xhttp,
    Grpc,
}

impl Network {
    pub fn as_str(self) -> &'static str {
        match self {
            Network::Tcp => "tcp",
            Network::Ws => "ws",
            Network::Xhttp => "xhttp",
            Network::Grpc => "grpc",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CodecError> {
        match s {
            "tcp" => Ok(Network::Tcp),
            "ws" => Ok(Network::Ws),
            "xhttp" => Ok(Network::Xhttp),
            "grpc" => Ok(Network::Grpc),
            other => Err(CodecError::UnknownTransport(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    None,
    Tls,
}

impl Security {
    pub fn as_str(self) -> &'static str {
        match self {
            Security::None => "none",
            Security::Tls => "tls",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TlsSettings {
    #[serde(rename = "serverName")]
    pub server_name: String,
    pub fingerprint: String,
    pub alpn: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TcpSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<TcpHeader>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TcpHeader {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<TcpHttpRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TcpHttpRequest {
    pub path: Vec<String>,
    pub headers: TcpHttpHeaders,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TcpHttpHeaders {
    #[serde(rename = "Host")]
    pub host: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WsSettings {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<WsHeaders>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WsHeaders {
    #[serde(rename = "Host", default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct XhttpSettings {
    pub host: String,
    pub path: String,
    pub mode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GrpcSettings {
    #[serde(rename = "serviceName")]
    pub service_name: String,
    #[serde(rename = "multiMode")]
    pub multi_mode: bool,
}

/// Raw on-disk / wire shape of `config.json`: close to the JSON the source
/// treats as opaque, including the `routing`/`dns` keys that must be
/// stripped before the template is used (§3).
#[derive(Debug, Clone, Deserialize)]
pub struct RawTemplate {
    pub inbounds: Vec<Inbound>,
    pub outbounds: Vec<Outbound>,
    #[serde(default)]
    #[allow(dead_code)]
    pub routing: Option<serde_json::Value>,
    #[serde(default)]
    #[allow(dead_code)]
    pub dns: Option<serde_json::Value>,
}

impl From<RawTemplate> for ProxyTemplate {
    fn from(raw: RawTemplate) -> Self {
        ProxyTemplate {
            inbounds: raw.inbounds,
            outbounds: raw.outbounds,
        }
    }
}

impl ProxyTemplate {
    pub fn from_json_str(s: &str) -> Result<Self, CodecError> {
        let raw: RawTemplate = serde_json::from_str(s)
            .map_err(|e| CodecError::Malformed(format!("config.json: {e}")))?;
        if raw.inbounds.is_empty() {
            return Err(CodecError::MissingField("inbounds"));
        }
        if raw.outbounds.is_empty() {
            return Err(CodecError::MissingField("outbounds"));
        }
        Ok(raw.into())
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).expect("ProxyTemplate always serializes")
    }

    pub fn primary_outbound(&self) -> Result<&Outbound, CodecError> {
        self.outbounds
            .first()
            .ok_or(CodecError::MissingField("outbounds[0]"))
    }

    pub fn primary_outbound_mut(&mut self) -> Result<&mut Outbound, CodecError> {
        self.outbounds
            .first_mut()
            .ok_or(CodecError::MissingField("outbounds[0]"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_vless() -> ProxyTemplate {
        ProxyTemplate {
            inbounds: vec![Inbound {
                port: 1080,
                protocol: "socks".to_string(),
                settings: None,
            }],
            outbounds: vec![Outbound {
                protocol: Protocol::Vless,
                settings: OutboundSettings::Vless {
                    vnext: vec![VlessServer {
                        address: "1.2.3.4".to_string(),
                        port: 443,
                        users: vec![VlessUser {
                            id: "abc-uuid".to_string(),
                            encryption: "none".to_string(),
                        }],
                    }],
                },
                stream_settings: Some(StreamSettings {
                    network: Network::Ws,
                    security: Security::Tls,
                    tls_settings: Some(TlsSettings {
                        server_name: "example.com".to_string(),
                        fingerprint: "chrome".to_string(),
                        alpn: vec!["http/1.1".to_string()],
                    }),
                    tcp_settings: None,
                    ws_settings: Some(WsSettings {
                        path: "/ws".to_string(),
                        headers: Some(WsHeaders {
                            host: Some("example.com".to_string()),
                        }),
                    }),
                    xhttp_settings: None,
                    grpc_settings: None,
                }),
            }],
        }
    }

    #[test]
    fn set_address_mutates_only_the_address_field() {
        let mut tpl = sample_vless();
        tpl.primary_outbound_mut()
            .unwrap()
            .settings
            .set_address("5.6.7.8");
        assert_eq!(
            tpl.primary_outbound().unwrap().settings.address(),
            Some("5.6.7.8")
        );
        assert_eq!(tpl.primary_outbound().unwrap().settings.port(), 443);
    }

    #[test]
    fn round_trips_through_json() {
        let tpl = sample_vless();
        let json = tpl.to_json_pretty();
        let parsed = ProxyTemplate::from_json_str(&json).unwrap();
        assert_eq!(tpl, parsed);
    }

    #[test]
    fn rejects_missing_outbounds() {
        let err = ProxyTemplate::from_json_str(r#"{"inbounds":[{"port":1,"protocol":"socks"}],"outbounds":[]}"#)
            .unwrap_err();
        assert_eq!(err, CodecError::MissingField("outbounds"));
    }
}
