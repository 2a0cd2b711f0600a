//! C1: the range sampler (§4.1).

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use rand::Rng;

use crate::net::hotring::HotSubnetRing;

/// Mapping from a group key (first IPv4 octet, or first IPv6 hextet, as
/// text) to the CIDR ranges sharing that key (§3 "Network group map").
/// The two-level group-then-list draw keeps sampling even across disparate
/// first-octet families instead of letting large ranges dominate (§4.1).
#[derive(Debug, Clone)]
pub struct NetworkGroupMap {
    groups: HashMap<String, Vec<IpNet>>,
    keys: Vec<String>,
}

impl NetworkGroupMap {
    pub fn build(v4: &[Ipv4Net], v6: &[Ipv6Net]) -> Self {
        let mut groups: HashMap<String, Vec<IpNet>> = HashMap::new();
        for net in v4 {
            groups.entry(v4_group_key(net.network())).or_default().push(IpNet::V4(*net));
        }
        for net in v6 {
            groups.entry(v6_group_key(net.network())).or_default().push(IpNet::V6(*net));
        }
        let keys = groups.keys().cloned().collect();
        Self { groups, keys }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn sample(&self, rng: &mut impl Rng) -> Option<IpNet> {
        if self.keys.is_empty() {
            return None;
        }
        let key = &self.keys[rng.gen_range(0..self.keys.len())];
        let list = self.groups.get(key)?;
        list.get(rng.gen_range(0..list.len())).copied()
    }
}

fn v4_group_key(addr: Ipv4Addr) -> String {
    addr.octets()[0].to_string()
}

fn v6_group_key(addr: Ipv6Addr) -> String {
    format!("{:x}", addr.segments()[0])
}

/// C1. One operation, `next_ip`, drawing uniformly within a CIDR chosen by
/// the two-stage process described in §4.1.
pub struct RangeSampler {
    groups: NetworkGroupMap,
    hot_ring: Arc<HotSubnetRing>,
}

/// With this probability a non-empty hot ring is sampled instead of the
/// full network group map (§4.1, invariant 3).
const HOT_RING_DRAW_PROBABILITY: f64 = 0.30;

impl RangeSampler {
    pub fn new(groups: NetworkGroupMap, hot_ring: Arc<HotSubnetRing>) -> Self {
        Self { groups, hot_ring }
    }

    pub fn next_ip(&self) -> Option<String> {
        self.next_ip_with(&mut rand::thread_rng())
    }

    fn next_ip_with(&self, rng: &mut impl Rng) -> Option<String> {
        let draw_hot = !self.hot_ring.is_empty() && rng.gen_bool(HOT_RING_DRAW_PROBABILITY);
        let net = if draw_hot { self.hot_ring.sample(rng) } else { self.groups.sample(rng) }?;
        Some(sample_address(net, rng).to_string())
    }
}

fn sample_address(net: IpNet, rng: &mut impl Rng) -> IpAddr {
    match net {
        IpNet::V4(v4) => IpAddr::V4(sample_v4(v4, rng)),
        IpNet::V6(v6) => IpAddr::V6(sample_v6(v6, rng)),
    }
}

fn sample_v4(net: Ipv4Net, rng: &mut impl Rng) -> Ipv4Addr {
    let host_bits = 32 - net.prefix_len() as u32;
    let num_addresses: u64 = 1u64 << host_bits;
    let base: u32 = u32::from(net.network());
    let idx: u32 = if num_addresses > 2 {
        rng.gen_range(1..=(num_addresses - 2)) as u32
    } else {
        0
    };
    Ipv4Addr::from(base.wrapping_add(idx))
}

fn sample_v6(net: Ipv6Net, rng: &mut impl Rng) -> Ipv6Addr {
    let host_bits = 128 - net.prefix_len() as u32;
    let base: u128 = u128::from(net.network());
    let offset: u128 = if host_bits == 0 {
        0
    } else if host_bits >= 128 {
        rng.gen()
    } else {
        rng.gen_range(0..(1u128 << host_bits))
    };
    Ipv6Addr::from(base.wrapping_add(offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v4_sample_excludes_network_and_broadcast() {
        let net: Ipv4Net = "192.168.1.0/24".parse().unwrap();
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let addr = sample_v4(net, &mut rng);
            assert_ne!(addr, Ipv4Addr::new(192, 168, 1, 0));
            assert_ne!(addr, Ipv4Addr::new(192, 168, 1, 255));
        }
    }

    #[test]
    fn group_map_splits_by_first_octet() {
        let v4: Vec<Ipv4Net> = vec!["1.0.0.0/8".parse().unwrap(), "104.16.0.0/12".parse().unwrap()];
        let map = NetworkGroupMap::build(&v4, &[]);
        assert_eq!(map.keys.len(), 2);
    }

    #[test]
    fn empty_groups_and_ring_sample_to_nothing() {
        let map = NetworkGroupMap::build(&[], &[]);
        let sampler = RangeSampler::new(map, Arc::new(HotSubnetRing::new()));
        assert_eq!(sampler.next_ip(), None);
    }
}
