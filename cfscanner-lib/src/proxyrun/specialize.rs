//! C6 step 1: config specialization (§4.6).

use rand::Rng;

use crate::config::template::ProxyTemplate;
use crate::error::CodecError;

const LOCAL_PORT_RANGE: std::ops::RangeInclusive<u16> = 20000..=50000;

/// Deep-copies `template`, rewrites `inbounds[0]` to a mixed HTTP+SOCKS
/// inbound on a random local port, and sets the candidate `ip` as the
/// outbound server address. `routing`/`dns` are already absent from
/// [`ProxyTemplate`] (stripped when the raw JSON was parsed).
pub fn specialize(template: &ProxyTemplate, ip: &str) -> Result<ProxyTemplate, CodecError> {
    let mut tpl = template.clone();

    let port = rand::thread_rng().gen_range(LOCAL_PORT_RANGE);
    if let Some(inbound) = tpl.inbounds.first_mut() {
        inbound.port = port;
        inbound.protocol = "mixed".to_string();
        inbound.settings = None;
    }

    tpl.primary_outbound_mut()?.settings.set_address(ip);
    Ok(tpl)
}

pub fn local_port(tpl: &ProxyTemplate) -> Option<u16> {
    tpl.inbounds.first().map(|i| i.port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::template::{Inbound, Outbound, OutboundSettings, Protocol, VlessServer, VlessUser};

    fn sample() -> ProxyTemplate {
        ProxyTemplate {
            inbounds: vec![Inbound { port: 1080, protocol: "socks".to_string(), settings: None }],
            outbounds: vec![Outbound {
                protocol: Protocol::Vless,
                settings: OutboundSettings::Vless {
                    vnext: vec![VlessServer {
                        address: "1.2.3.4".to_string(),
                        port: 443,
                        users: vec![VlessUser { id: "u".to_string(), encryption: "none".to_string() }],
                    }],
                },
                stream_settings: None,
            }],
        }
    }

    #[test]
    fn rewrites_inbound_and_address_only() {
        let original = sample();
        let specialized = specialize(&original, "5.6.7.8").unwrap();
        assert_eq!(specialized.inbounds[0].protocol, "mixed");
        assert!(LOCAL_PORT_RANGE.contains(&specialized.inbounds[0].port));
        assert_eq!(specialized.primary_outbound().unwrap().settings.address(), Some("5.6.7.8"));
        assert_eq!(specialized.primary_outbound().unwrap().settings.port(), 443);
        assert_eq!(original.primary_outbound().unwrap().settings.address(), Some("1.2.3.4"));
    }
}
