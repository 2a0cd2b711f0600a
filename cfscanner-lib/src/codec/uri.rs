//! Bidirectional transform between a VLESS/Trojan URI and a [`ProxyTemplate`]
//! (C2, §4.2). This is the component the orchestrator (C7) calls once at
//! startup to mount whichever of `config.json` / `config.txt` is missing,
//! and that C6 calls per-candidate to rewrite the URI for a verified IP.

use url::{Host, Url};

use crate::codec::params::{derive_alpn, derive_fingerprint, derive_host, derive_sni, Params};
use crate::config::template::*;
use crate::error::CodecError;

/// Parse a VLESS/Trojan URI into a structured [`ProxyTemplate`].
///
/// `inbounds` on the returned template is a placeholder: stage C6 always
/// overwrites `inbounds[0]` wholesale when specializing a config, so the
/// value here only needs to satisfy "at least one inbound" for downstream
/// validation.
pub fn parse(uri: &str) -> Result<ProxyTemplate, CodecError> {
    let url = Url::parse(uri).map_err(|e| CodecError::Malformed(e.to_string()))?;

    let protocol = Protocol::parse(url.scheme())?;

    let netloc_host = host_string(&url)?;
    let port = url.port().unwrap_or(443);

    let credential = percent_decode(url.username());
    if credential.is_empty() {
        return Err(CodecError::MissingCredential);
    }

    let params = Params::from_query(url.query());

    let network = Network::parse(params.get("type").unwrap_or("tcp"))?;
    let security = match params.get("security") {
        Some("tls") | None => Security::Tls,
        Some("none") => Security::None,
        Some(other) => return Err(CodecError::Malformed(format!("unknown security: {other}"))),
    };

    let sni = derive_sni(params.get("sni"), params.get("host"), &netloc_host);
    let host = derive_host(params.get("host"), &sni);
    let fp = derive_fingerprint(params.get("fp"));
    let alpn = derive_alpn(params.get("alpn"), network.as_str());

    let tls_settings = matches!(security, Security::Tls).then(|| TlsSettings {
        server_name: sni.clone(),
        fingerprint: fp,
        alpn,
    });

    let path = params.get("path").unwrap_or("/").to_string();

    let (tcp_settings, ws_settings, xhttp_settings, grpc_settings) = match network {
        Network::Tcp => {
            let tcp = if params.get("headerType") == Some("http") {
                Some(TcpSettings {
                    header: Some(TcpHeader {
                        kind: "http".to_string(),
                        request: Some(TcpHttpRequest {
                            path: vec![path.clone()],
                            headers: TcpHttpHeaders { host: vec![host.clone()] },
                        }),
                    }),
                })
            } else {
                None
            };
            (tcp, None, None, None)
        }
        Network::Ws => (
            None,
            Some(WsSettings {
                path: path.clone(),
                headers: Some(WsHeaders { host: Some(host.clone()) }),
            }),
            None,
            None,
        ),
        Network::Xhttp => (
            None,
            None,
            Some(XhttpSettings {
                host: host.clone(),
                path: path.clone(),
                mode: params.get("mode").unwrap_or("auto").to_string(),
            }),
            None,
        ),
        Network::Grpc => (
            None,
            None,
            None,
            Some(GrpcSettings {
                service_name: params
                    .get("serviceName")
                    .unwrap_or(path.as_str())
                    .to_string(),
                multi_mode: params.get("mode") == Some("multi"),
            }),
        ),
    };

    let stream_settings = Some(StreamSettings {
        network,
        security,
        tls_settings,
        tcp_settings,
        ws_settings,
        xhttp_settings,
        grpc_settings,
    });

    let settings = match protocol {
        Protocol::Vless => OutboundSettings::Vless {
            vnext: vec![VlessServer {
                address: netloc_host,
                port,
                users: vec![VlessUser {
                    id: credential,
                    encryption: params.get("encryption").unwrap_or("none").to_string(),
                }],
            }],
        },
        Protocol::Trojan => OutboundSettings::Trojan {
            servers: vec![TrojanServer {
                address: netloc_host,
                port,
                password: credential,
            }],
        },
    };

    Ok(ProxyTemplate {
        inbounds: vec![Inbound {
            port: 10808,
            protocol: "socks".to_string(),
            settings: None,
        }],
        outbounds: vec![Outbound {
            protocol,
            settings,
            stream_settings,
        }],
    })
}

/// Rewrite a [`ProxyTemplate`] back into a URI. `fragment` is supplied by
/// the caller (the template itself carries no remark/label field) — C6
/// passes the original URI's fragment through unchanged (§4.6 "Rewritten
/// output").
pub fn serialize(tpl: &ProxyTemplate, fragment: Option<&str>) -> Result<String, CodecError> {
    let outbound = tpl.primary_outbound()?;
    let address = outbound
        .settings
        .address()
        .ok_or(CodecError::MissingField("outbounds[0].settings address"))?;
    let port = outbound.settings.port();
    let host_for_uri = bracket_if_ipv6(address);

    let credential = match &outbound.settings {
        OutboundSettings::Vless { vnext } => vnext
            .first()
            .and_then(|v| v.users.first())
            .map(|u| u.id.clone())
            .ok_or(CodecError::MissingField("vnext[0].users[0].id"))?,
        OutboundSettings::Trojan { servers } => servers
            .first()
            .map(|s| s.password.clone())
            .ok_or(CodecError::MissingField("servers[0].password"))?,
    };

    let stream = outbound
        .stream_settings
        .as_ref()
        .ok_or(CodecError::MissingField("streamSettings"))?;

    let mut params = Params::default();
    params.set("type", stream.network.as_str());
    params.set("security", stream.security.as_str());

    if let Some(tls) = &stream.tls_settings {
        params.set("sni", tls.server_name.clone());
        params.set("fp", tls.fingerprint.clone());
        params.set("alpn", tls.alpn.join(","));
    }

    match stream.network {
        Network::Tcp => {
            if let Some(tcp) = &stream.tcp_settings {
                if let Some(header) = &tcp.header {
                    params.set("headerType", header.kind.clone());
                    if let Some(req) = &header.request {
                        if let Some(p) = req.path.first() {
                            params.set("path", p.clone());
                        }
                        if let Some(h) = req.headers.host.first() {
                            params.set("host", h.clone());
                        }
                    }
                }
            }
        }
        Network::Ws => {
            if let Some(ws) = &stream.ws_settings {
                params.set("path", ws.path.clone());
                if let Some(h) = ws.headers.as_ref().and_then(|h| h.host.clone()) {
                    params.set("host", h);
                }
            }
        }
        Network::Xhttp => {
            if let Some(x) = &stream.xhttp_settings {
                params.set("path", x.path.clone());
                params.set("host", x.host.clone());
                params.set("mode", x.mode.clone());
            }
        }
        Network::Grpc => {
            if let Some(g) = &stream.grpc_settings {
                params.set("serviceName", g.service_name.clone());
                if g.multi_mode {
                    params.set("mode", "multi");
                }
            }
        }
    }

    if let OutboundSettings::Vless { vnext } = &outbound.settings {
        if let Some(user) = vnext.first().and_then(|v| v.users.first()) {
            if user.encryption != "none" {
                params.set("encryption", user.encryption.clone());
            }
        }
    }

    let mut uri = format!(
        "{}://{}@{}:{}?{}",
        outbound.protocol.as_str(),
        crate::codec::params::percent_encode(&credential),
        host_for_uri,
        port,
        params.to_query_string(),
    );
    if let Some(frag) = fragment {
        uri.push('#');
        uri.push_str(frag);
    }
    Ok(uri)
}

fn host_string(url: &Url) -> Result<String, CodecError> {
    match url.host() {
        Some(Host::Domain(d)) => Ok(d.to_string()),
        Some(Host::Ipv4(ip)) => Ok(ip.to_string()),
        Some(Host::Ipv6(ip)) => Ok(ip.to_string()),
        None => Err(CodecError::MissingHost),
    }
}

fn bracket_if_ipv6(addr: &str) -> String {
    if addr.parse::<std::net::Ipv6Addr>().is_ok() {
        format!("[{addr}]")
    } else {
        addr.to_string()
    }
}

fn percent_decode(s: &str) -> String {
    crate::codec::params::percent_decode(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_vless_ws_tls() {
        let uri = "vless://abc-uuid@1.2.3.4:443?type=ws&security=tls&sni=example.com&path=/ws&host=example.com#orig";
        let tpl = parse(uri).unwrap();
        let ob = tpl.primary_outbound().unwrap();
        assert_eq!(ob.protocol, Protocol::Vless);
        assert_eq!(ob.settings.address(), Some("1.2.3.4"));
        let stream = ob.stream_settings.as_ref().unwrap();
        assert_eq!(stream.network, Network::Ws);
        assert_eq!(stream.ws_settings.as_ref().unwrap().path, "/ws");
        assert_eq!(stream.tls_settings.as_ref().unwrap().server_name, "example.com");
    }

    #[test]
    fn s5_trojan_grpc_ipv6() {
        let uri = "trojan://pass@[2606:4700::1]:443?type=grpc&security=tls&sni=ex.com&serviceName=svc";
        let tpl = parse(uri).unwrap();
        let ob = tpl.primary_outbound().unwrap();
        assert_eq!(ob.protocol, Protocol::Trojan);
        assert_eq!(ob.settings.address(), Some("2606:4700::1"));
        assert_eq!(ob.settings.port(), 443);
        let stream = ob.stream_settings.as_ref().unwrap();
        assert_eq!(stream.grpc_settings.as_ref().unwrap().service_name, "svc");
        assert_eq!(stream.tls_settings.as_ref().unwrap().server_name, "ex.com");

        let back = serialize(&tpl, None).unwrap();
        assert!(back.starts_with("trojan://pass@[2606:4700::1]:443?"));
    }

    #[test]
    fn rejects_unsupported_scheme() {
        let err = parse("ss://abc@1.2.3.4:443").unwrap_err();
        assert_eq!(err, CodecError::UnsupportedScheme("ss".to_string()));
    }

    #[test]
    fn round_trip_parse_serialize_parse() {
        let fixtures = [
            "vless://u1@1.1.1.1:443?type=tcp&security=tls&sni=a.com",
            "vless://u2@1.1.1.1:443?type=ws&security=tls&sni=a.com&path=/p&host=h.com",
            "vless://u3@1.1.1.1:443?type=xhttp&security=tls&sni=a.com&path=/p&host=h.com&mode=multi",
            "vless://u4@1.1.1.1:443?type=grpc&security=tls&sni=a.com&serviceName=svc",
            "trojan://pw1@1.1.1.1:443?type=tcp&security=none",
            "trojan://pw2@1.1.1.1:443?type=ws&security=tls&sni=a.com&path=/p",
        ];
        for uri in fixtures {
            let tpl = parse(uri).unwrap();
            let back = serialize(&tpl, None).unwrap();
            let tpl2 = parse(&back).unwrap();
            assert_eq!(tpl, tpl2, "round trip mismatch for {uri}");
        }
    }

    #[test]
    fn alpn_defaults_differ_by_transport() {
        let ws = parse("vless://u@1.1.1.1:443?type=ws&security=tls&sni=a.com").unwrap();
        let tcp = parse("vless://u@1.1.1.1:443?type=tcp&security=tls&sni=a.com").unwrap();
        assert_eq!(
            ws.primary_outbound().unwrap().stream_settings.as_ref().unwrap().tls_settings.as_ref().unwrap().alpn,
            vec!["http/1.1".to_string()]
        );
        assert_eq!(
            tcp.primary_outbound().unwrap().stream_settings.as_ref().unwrap().tls_settings.as_ref().unwrap().alpn,
            vec!["h2".to_string(), "http/1.1".to_string()]
        );
    }
}
