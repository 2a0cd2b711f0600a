//! The hot-subnet ring (§3 "Hot-subnet ring", §9 "Mutable shared hot ring").
//!
//! Appended by every successful C4 probe, sampled by C1. Bounded to 50
//! entries behind a single `parking_lot::Mutex`: the ring is small and
//! sampling correctness matters more than lock-free throughput.

use std::collections::VecDeque;
use std::net::IpAddr;

use ipnet::IpNet;
use parking_lot::Mutex;
use rand::seq::IteratorRandom;
use rand::Rng;

const DEFAULT_CAPACITY: usize = 50;

pub struct HotSubnetRing {
    inner: Mutex<VecDeque<IpNet>>,
    capacity: usize,
}

impl Default for HotSubnetRing {
    fn default() -> Self {
        Self::new()
    }
}

impl HotSubnetRing {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { inner: Mutex::new(VecDeque::with_capacity(capacity)), capacity }
    }

    /// Appends `subnet`, trimming the oldest entry when the ring exceeds
    /// capacity (§3, invariant 2).
    pub fn push(&self, subnet: IpNet) {
        let mut guard = self.inner.lock();
        guard.push_back(subnet);
        while guard.len() > self.capacity {
            guard.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sample(&self, rng: &mut impl Rng) -> Option<IpNet> {
        let guard = self.inner.lock();
        guard.iter().copied().choose(rng)
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> Vec<IpNet> {
        self.inner.lock().iter().copied().collect()
    }
}

/// Derives the subnet a successful C4 accept should be remembered as:
/// `/24` for v4, `/48` for v6 (§4.4 step 1).
pub fn subnet_for(ip: IpAddr) -> IpNet {
    match ip {
        IpAddr::V4(v4) => {
            IpNet::V4(ipnet::Ipv4Net::new(v4, 24).expect("prefix 24 is valid for v4").trunc())
        }
        IpAddr::V6(v6) => {
            IpNet::V6(ipnet::Ipv6Net::new(v6, 48).expect("prefix 48 is valid for v6").trunc())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn trims_oldest_beyond_capacity() {
        let ring = HotSubnetRing::with_capacity(3);
        for i in 0..5u8 {
            ring.push(subnet_for(IpAddr::V4(Ipv4Addr::new(1, 2, i, 1))));
        }
        assert_eq!(ring.len(), 3);
        let snapshot = ring.snapshot();
        assert_eq!(snapshot[0], subnet_for(IpAddr::V4(Ipv4Addr::new(1, 2, 2, 1))));
        assert_eq!(snapshot[2], subnet_for(IpAddr::V4(Ipv4Addr::new(1, 2, 4, 1))));
    }

    #[test]
    fn derives_slash_24_for_v4_and_slash_48_for_v6() {
        let v4 = subnet_for(IpAddr::V4(Ipv4Addr::new(104, 16, 5, 9)));
        assert_eq!(v4.to_string(), "104.16.5.0/24");
        let v6 = subnet_for("2606:4700:1234:5678::1".parse().unwrap());
        assert_eq!(v6.to_string(), "2606:4700:1234::/48");
    }
}
