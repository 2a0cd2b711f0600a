//! Bounded inter-stage queues with timed, drop-on-timeout put (§3 "Queues",
//! §5 "Back-pressure", invariant 4).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;

/// The sending half of one `rawQ`/`tcpQ`/`tlsQ`/`xrayQ` leg. `put` never
/// blocks past `put_timeout`: a downstream stage held up sheds upstream
/// work instead of growing memory (§5).
#[derive(Clone)]
pub struct StageQueue<T> {
    tx: mpsc::Sender<T>,
    put_timeout: Duration,
}

/// The receiving half. Cloneable so every worker in a stage's pool can pull
/// from the same queue — `tokio::sync::mpsc::Receiver` itself takes only
/// one consumer, so the shared state lives behind an `Arc<Mutex<_>>`; the
/// lock is held only for the duration of one `recv`.
pub struct StageQueueReceiver<T> {
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for StageQueueReceiver<T> {
    fn clone(&self) -> Self {
        Self { rx: self.rx.clone() }
    }
}

impl<T: Send + 'static> StageQueue<T> {
    pub fn bounded(capacity: usize, put_timeout: Duration) -> (Self, StageQueueReceiver<T>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, put_timeout }, StageQueueReceiver { rx: Arc::new(Mutex::new(rx)) })
    }

    /// Attempts to enqueue `item` within `put_timeout`; drops it silently on
    /// timeout or once the receiver side has shut down (§3).
    pub async fn put(&self, item: T) {
        let _ = timeout(self.put_timeout, self.tx.send(item)).await;
    }
}

impl<T> StageQueueReceiver<T> {
    /// Waits for the next item, or `None` once every sender has dropped.
    pub async fn get(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_drops_silently_once_full_and_receiver_is_slow() {
        let (queue, rx) = StageQueue::bounded(1, Duration::from_millis(20));
        queue.put(1u32).await;
        // Second put has nowhere to go until the first is drained, and the
        // receiver side here never drains in time — it must be dropped,
        // not block the caller past put_timeout.
        queue.put(2u32).await;
        assert_eq!(rx.get().await, Some(1));
    }

    #[tokio::test]
    async fn get_returns_none_once_all_senders_drop() {
        let (queue, rx) = StageQueue::<u32>::bounded(4, Duration::from_millis(50));
        drop(queue);
        assert_eq!(rx.get().await, None);
    }
}
