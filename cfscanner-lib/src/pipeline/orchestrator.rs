//! C7: the pipeline orchestrator (§4.7).

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::config::template::ProxyTemplate;
use crate::config::ScanConfig;
use crate::net::ranges::NetworkGroupMap;
use crate::net::{speed_probe, tcp_probe, tls_probe, DownloadVariant, HotSubnetRing, RangeSampler};
use crate::pipeline::candidate::CandidateRecord;
use crate::pipeline::metrics::ScanMetrics;
use crate::pipeline::queue::{StageQueue, StageQueueReceiver};
use crate::pipeline::state::{ScanControl, ScanSignals, ScanState};
use crate::proxyrun;
use crate::sink::{Sink, VerifiedEntry};

/// Worker-pool and queue-capacity sizing derived from the power knob
/// (§4.7 "Capacity computation").
#[derive(Debug, Clone, Copy)]
struct Capacity {
    tcp: usize,
    tls: usize,
    speed: usize,
    proxy: usize,
}

impl Capacity {
    fn from_power(power: u8) -> Self {
        let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        let (k, cap) = if cfg!(windows) { (150usize, 1000usize) } else { (300usize, 3000usize) };
        Self::from_power_and_bounds(power, cores, k, cap)
    }

    /// The pure half of the §4.7 capacity computation: `active = min(cores
    /// * k, cap) * P/100`, then the 70/20/10 worker split with its floors.
    /// Split out from [`Capacity::from_power`] so the arithmetic is
    /// testable without depending on the host's core count.
    fn from_power_and_bounds(power: u8, cores: usize, k: usize, cap: usize) -> Self {
        let active = (cores * k).min(cap) as f64 * f64::from(power.clamp(1, 100)) / 100.0;
        Self {
            tcp: (active * 0.70).round().max(5.0) as usize,
            tls: (active * 0.20).round().max(2.0) as usize,
            speed: (active * 0.10).round().max(1.0) as usize,
            proxy: 15,
        }
    }

    fn raw_q(&self) -> usize {
        2 * self.tcp
    }

    fn tcp_q(&self) -> usize {
        2 * self.tls
    }

    fn tls_q(&self) -> usize {
        2 * self.speed
    }

    fn xray_q(&self) -> usize {
        3 * self.proxy
    }
}

/// A queue `put` never blocks past this, anywhere in the pipeline (§6
/// "Network deadlines", "Queue put | 0.5-1.5 s").
const QUEUE_PUT_TIMEOUT: Duration = Duration::from_millis(1000);

/// The speed-probe download size used for every candidate in a scan.
/// `HUNDRED_K` trades probe accuracy for more candidates scanned per
/// second; the source's other named variant (`ONE_MILLION`) remains
/// available on [`DownloadVariant`] for a slower, more accurate mode.
const SPEED_VARIANT: DownloadVariant = DownloadVariant::HUNDRED_K;

/// Owns every stage's worker pool and queue for one scan session and the
/// [`ScanControl`]/[`ScanSignals`] pair that drives them (§4.7).
pub struct Orchestrator {
    config: ScanConfig,
    capacity: Capacity,
    control: Mutex<ScanControl>,
    signals: ScanSignals,
    metrics: Arc<ScanMetrics>,
    sink: Arc<Sink>,
    target: Mutex<Option<u64>>,
    sampler: Arc<RangeSampler>,
    hot_ring: Arc<HotSubnetRing>,
    template: Option<Arc<ProxyTemplate>>,
}

impl Orchestrator {
    pub fn new(config: ScanConfig) -> Arc<Self> {
        let (control, signals) = ScanControl::new();
        let capacity = Capacity::from_power(config.power);
        let hot_ring = Arc::new(HotSubnetRing::new());
        let groups = NetworkGroupMap::build(&config.v4_ranges, &config.v6_ranges);
        let sampler = Arc::new(RangeSampler::new(groups, hot_ring.clone()));
        let sink = Arc::new(Sink::new(
            config.output_configs_dir(),
            config.vless_links_path(),
            config.clean_ips_csv_path(),
        ));
        let target = Mutex::new(config.target);
        let template = config.template.clone().map(Arc::new);

        Arc::new(Self {
            config,
            capacity,
            control: Mutex::new(control),
            signals,
            metrics: Arc::new(ScanMetrics::default()),
            sink,
            target,
            sampler,
            hot_ring,
            template,
        })
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    pub fn state(&self) -> ScanState {
        self.control.lock().state()
    }

    pub fn pause(&self) {
        self.control.lock().pause();
    }

    pub fn resume(&self) {
        self.control.lock().resume();
    }

    pub fn stop(&self) {
        self.control.lock().stop();
    }

    /// Raising or lowering the target mid-scan can fire auto-stop
    /// immediately if the new target is already met (§4.7).
    pub fn set_target(&self, target: Option<u64>) {
        *self.target.lock() = target;
        self.maybe_auto_stop(self.sink.len());
    }

    fn maybe_auto_stop(&self, verified_count: usize) {
        if let Some(t) = *self.target.lock() {
            if verified_count as u64 >= t {
                self.control.lock().stop();
            }
        }
    }

    /// Records a verified entry and checks target-reached auto-stop under
    /// the sink's own lock, so the check is atomic with the append (§5
    /// "target-reached atomicity", invariant 6).
    fn record(&self, entry: VerifiedEntry) {
        if self.signals.is_stopping() {
            return;
        }
        let count = self.sink.append(entry);
        self.metrics.record_verified();
        self.maybe_auto_stop(count);
    }

    /// Runs the pipeline to completion: spawns the C1 producer and every
    /// stage's worker pool, waits for Stop (user-issued or target-reached)
    /// to drain through every stage, then returns to IDLE (§4.7).
    pub async fn run(self: Arc<Self>) {
        self.control.lock().start();
        info!(
            tcp = self.capacity.tcp,
            tls = self.capacity.tls,
            speed = self.capacity.speed,
            proxy = self.capacity.proxy,
            "starting scan"
        );

        let (raw_q, raw_rx) = StageQueue::bounded(self.capacity.raw_q(), QUEUE_PUT_TIMEOUT);
        let (tcp_q, tcp_rx) = StageQueue::bounded(self.capacity.tcp_q(), QUEUE_PUT_TIMEOUT);
        let (tls_q, tls_rx) = StageQueue::bounded(self.capacity.tls_q(), QUEUE_PUT_TIMEOUT);
        let (xray_q, xray_rx) = StageQueue::bounded(self.capacity.xray_q(), QUEUE_PUT_TIMEOUT);

        let mut tasks = JoinSet::new();

        {
            let this = self.clone();
            let mut signals = self.signals.clone();
            tasks.spawn(async move {
                loop {
                    if !signals.wait_for_gate().await {
                        break;
                    }
                    let Some(ip) = this.sampler.next_ip() else {
                        break;
                    };
                    raw_q.put(CandidateRecord::new(ip)).await;
                }
            });
        }

        for _ in 0..self.capacity.tcp {
            let rx = raw_rx.clone();
            let tx = tcp_q.clone();
            let mut signals = self.signals.clone();
            let metrics = self.metrics.clone();
            tasks.spawn(async move {
                loop {
                    if !signals.wait_for_gate().await {
                        break;
                    }
                    let Some(candidate) = rx.get().await else { break };
                    let Ok(addr) = candidate.ip.parse::<IpAddr>() else { continue };
                    metrics.enter_tcp();
                    let result = tcp_probe::probe(addr).await;
                    metrics.leave_tcp();
                    if result.is_ok() {
                        tx.put(candidate).await;
                    }
                }
            });
        }

        for _ in 0..self.capacity.tls {
            let rx = tcp_rx.clone();
            let tx = tls_q.clone();
            let mut signals = self.signals.clone();
            let metrics = self.metrics.clone();
            let hot_ring = self.hot_ring.clone();
            let domains = self.config.domains.clone();
            tasks.spawn(async move {
                loop {
                    if !signals.wait_for_gate().await {
                        break;
                    }
                    let Some(mut candidate) = rx.get().await else { break };
                    let Ok(addr) = candidate.ip.parse::<IpAddr>() else { continue };
                    metrics.enter_tls();
                    let result = tls_probe::probe(addr, &domains).await;
                    metrics.leave_tls();
                    if let Ok(outcome) = result {
                        hot_ring.push(crate::net::hotring::subnet_for(addr));
                        candidate.tls_latency_ms = Some(outcome.tls_latency_ms);
                        tx.put(candidate).await;
                    }
                }
            });
        }

        for _ in 0..self.capacity.speed {
            let rx: StageQueueReceiver<CandidateRecord> = tls_rx.clone();
            let tx = xray_q.clone();
            let mut signals = self.signals.clone();
            let metrics = self.metrics.clone();
            let this = self.clone();
            tasks.spawn(async move {
                loop {
                    if !signals.wait_for_gate().await {
                        break;
                    }
                    let Some(mut candidate) = rx.get().await else { break };
                    let Ok(addr) = candidate.ip.parse::<IpAddr>() else { continue };
                    metrics.enter_speed();
                    let result = speed_probe::probe(addr, SPEED_VARIANT).await;
                    metrics.leave_speed();
                    let Ok(outcome) = result else { continue };
                    candidate.direct_speed = Some(outcome.direct_speed);

                    if this.config.proxy_stage_enabled() {
                        tx.put(candidate).await;
                    } else {
                        this.record(VerifiedEntry::new(
                            candidate.ip,
                            outcome.direct_speed,
                            candidate.tls_latency_ms.unwrap_or(0),
                            0,
                            None,
                            None,
                        ));
                    }
                }
            });
        }

        for _ in 0..self.capacity.proxy {
            let rx: StageQueueReceiver<CandidateRecord> = xray_rx.clone();
            let mut signals = self.signals.clone();
            let metrics = self.metrics.clone();
            let this = self.clone();
            tasks.spawn(async move {
                loop {
                    if !signals.wait_for_gate().await {
                        break;
                    }
                    let Some(candidate) = rx.get().await else { break };
                    let (Some(template), Some(proxy_bin)) =
                        (this.template.as_ref(), this.config.proxy_bin.as_ref())
                    else {
                        continue;
                    };

                    metrics.enter_proxy();
                    let result = proxyrun::run_probe(
                        proxy_bin,
                        template,
                        &candidate.ip,
                        this.config.original_fragment.as_deref(),
                    )
                    .await;
                    metrics.leave_proxy();

                    match result {
                        Ok(outcome) => this.record(VerifiedEntry::new(
                            candidate.ip,
                            outcome.speed,
                            candidate.tls_latency_ms.unwrap_or(0),
                            outcome.proxy_latency_ms,
                            None,
                            Some(outcome.rewritten_uri),
                        )),
                        Err(e) => debug!(ip = candidate.ip, %e, "proxy probe rejected candidate"),
                    }
                }
            });
        }

        while tasks.join_next().await.is_some() {}

        self.control.lock().finish_stop();
        info!(verified = self.sink.len(), "scan finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_floors_hold_at_minimum_power() {
        let cap = Capacity::from_power_and_bounds(1, 8, 300, 3000);
        assert!(cap.tcp >= 5);
        assert!(cap.tls >= 2);
        assert!(cap.speed >= 1);
        assert_eq!(cap.proxy, 15);
    }

    #[test]
    fn capacity_splits_roughly_70_20_10_at_full_power() {
        let cap = Capacity::from_power_and_bounds(100, 8, 300, 3000);
        // 8 cores * 300 = 2400, under the 3000 cap, so active == 2400.
        assert_eq!(cap.tcp, 1680);
        assert_eq!(cap.tls, 480);
        assert_eq!(cap.speed, 240);
    }

    #[test]
    fn capacity_respects_the_overall_cap() {
        let cap = Capacity::from_power_and_bounds(100, 64, 300, 3000);
        // 64 cores * 300 = 19200, clamped to the 3000 cap.
        assert_eq!(cap.tcp, 2100);
    }
}
