//! Atomic progress counters (§5 "Back-pressure"), following the teacher's
//! `tcp::metrics::ConnectionCount` pattern of plain atomics behind a
//! snapshot struct rather than a lock.

use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct ScanMetrics {
    tcp_inflight: AtomicUsize,
    tls_inflight: AtomicUsize,
    speed_inflight: AtomicUsize,
    proxy_inflight: AtomicUsize,
    verified_total: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub tcp_inflight: usize,
    pub tls_inflight: usize,
    pub speed_inflight: usize,
    pub proxy_inflight: usize,
    pub verified_total: usize,
}

macro_rules! stage_counter {
    ($enter:ident, $leave:ident, $field:ident) => {
        pub fn $enter(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }

        pub fn $leave(&self) {
            self.$field
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1))
                .ok();
        }
    };
}

impl ScanMetrics {
    stage_counter!(enter_tcp, leave_tcp, tcp_inflight);
    stage_counter!(enter_tls, leave_tls, tls_inflight);
    stage_counter!(enter_speed, leave_speed, speed_inflight);
    stage_counter!(enter_proxy, leave_proxy, proxy_inflight);

    pub fn record_verified(&self) {
        self.verified_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tcp_inflight: self.tcp_inflight.load(Ordering::Relaxed),
            tls_inflight: self.tls_inflight.load(Ordering::Relaxed),
            speed_inflight: self.speed_inflight.load(Ordering::Relaxed),
            proxy_inflight: self.proxy_inflight.load(Ordering::Relaxed),
            verified_total: self.verified_total.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inflight_returns_to_zero_after_matched_enter_leave() {
        let metrics = ScanMetrics::default();
        metrics.enter_tcp();
        metrics.enter_tcp();
        metrics.leave_tcp();
        assert_eq!(metrics.snapshot().tcp_inflight, 1);
        metrics.leave_tcp();
        assert_eq!(metrics.snapshot().tcp_inflight, 0);
    }
}
