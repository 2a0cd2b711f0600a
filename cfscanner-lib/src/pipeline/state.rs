//! Scan state machine and the signals workers observe (§4.7).
//!
//! ```text
//! IDLE ──Start──▶ RUNNING ──Pause──▶ PAUSED ──Resume──▶ RUNNING
//!                     │                 │
//!                     └──Stop───────────┴──Stop──▶ STOPPING ──all-workers-exit──▶ IDLE
//! ```

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Running,
    Paused,
    Stopping,
}

/// The two broadcast signals every worker observes at the head of its loop
/// and at every timeout wakeup, following the teacher's
/// `TcpHandler::run`/`watch::Receiver<bool>` shutdown pattern.
#[derive(Clone)]
pub struct ScanSignals {
    /// `true` while RUNNING; `false` while PAUSED. Workers await this
    /// becoming true before picking up new work; in-flight probes are not
    /// interrupted by a pause.
    gate: watch::Receiver<bool>,
    /// Set once on Stop; never cleared. Checked on every loop iteration.
    stop: watch::Receiver<bool>,
}

impl ScanSignals {
    pub fn is_stopping(&self) -> bool {
        *self.stop.borrow()
    }

    /// Waits until the gate is open (RUNNING) or stop fires, whichever
    /// comes first. Returns `false` if stop fired.
    pub async fn wait_for_gate(&mut self) -> bool {
        loop {
            if self.is_stopping() {
                return false;
            }
            if *self.gate.borrow() {
                return true;
            }
            tokio::select! {
                res = self.gate.changed() => if res.is_err() { return false },
                res = self.stop.changed() => if res.is_ok() { return false },
            }
        }
    }
}

pub struct ScanControl {
    state: ScanState,
    gate_tx: watch::Sender<bool>,
    stop_tx: watch::Sender<bool>,
}

impl ScanControl {
    pub fn new() -> (Self, ScanSignals) {
        let (gate_tx, gate_rx) = watch::channel(false);
        let (stop_tx, stop_rx) = watch::channel(false);
        (
            Self { state: ScanState::Idle, gate_tx, stop_tx },
            ScanSignals { gate: gate_rx, stop: stop_rx },
        )
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn start(&mut self) {
        if self.state == ScanState::Idle {
            self.state = ScanState::Running;
            let _ = self.gate_tx.send(true);
        }
    }

    pub fn pause(&mut self) {
        if self.state == ScanState::Running {
            self.state = ScanState::Paused;
            let _ = self.gate_tx.send(false);
        }
    }

    pub fn resume(&mut self) {
        if self.state == ScanState::Paused {
            self.state = ScanState::Running;
            let _ = self.gate_tx.send(true);
        }
    }

    pub fn stop(&mut self) {
        if matches!(self.state, ScanState::Running | ScanState::Paused) {
            self.state = ScanState::Stopping;
            let _ = self.gate_tx.send(false);
            let _ = self.stop_tx.send(true);
        }
    }

    /// Called once all worker tasks have exited after a Stop.
    pub fn finish_stop(&mut self) {
        if self.state == ScanState::Stopping {
            self.state = ScanState::Idle;
        }
    }
}
