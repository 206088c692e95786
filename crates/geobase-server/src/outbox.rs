//! Per-connection queue of outbound frames.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

/// Creates a connection's outbound queue.
///
/// Clients apply partial updates on top of what they already hold, so a
/// frame is never dropped. Instead, once more than `limit` frames are
/// waiting, the outbox is marked failed and refuses further frames; the
/// connection is then closed and the client resyncs on reconnect.
pub fn outbox(limit: usize) -> (Outbox, OutboxReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared {
        pending: AtomicUsize::new(0),
        limit: limit.max(1),
        failed: AtomicBool::new(false),
        failure: Notify::new(),
    });
    (
        Outbox {
            tx,
            shared: Arc::clone(&shared),
        },
        OutboxReceiver { rx, shared },
    )
}

#[derive(Debug)]
struct Shared {
    pending: AtomicUsize,
    limit: usize,
    failed: AtomicBool,
    failure: Notify,
}

/// Sending half, shared by the connection's subscriber, reply path and
/// keepalive task.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<String>,
    shared: Arc<Shared>,
}

impl Outbox {
    /// Queues `frame` for the client.
    ///
    /// Returns `false` if the frame was refused: the backlog limit was hit
    /// (now or earlier) or the receiving half is gone.
    pub fn push(&self, frame: String) -> bool {
        if self.is_failed() {
            return false;
        }
        let pending = self.shared.pending.fetch_add(1, Ordering::AcqRel);
        if pending >= self.shared.limit {
            self.shared.pending.fetch_sub(1, Ordering::AcqRel);
            if !self.shared.failed.swap(true, Ordering::AcqRel) {
                self.shared.failure.notify_one();
            }
            return false;
        }
        if self.tx.send(frame).is_err() {
            self.shared.pending.fetch_sub(1, Ordering::AcqRel);
            return false;
        }
        true
    }

    /// Frames queued but not yet handed to the socket.
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    pub fn is_failed(&self) -> bool {
        self.shared.failed.load(Ordering::Acquire)
    }

    /// Resolves once the backlog limit has been exceeded.
    pub async fn failed(&self) {
        let notified = self.shared.failure.notified();
        if self.is_failed() {
            return;
        }
        notified.await;
    }
}

/// Receiving half, drained by the connection's send task.
#[derive(Debug)]
pub struct OutboxReceiver {
    rx: mpsc::UnboundedReceiver<String>,
    shared: Arc<Shared>,
}

impl OutboxReceiver {
    /// Next queued frame, or `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<String> {
        let frame = self.rx.recv().await?;
        self.shared.pending.fetch_sub(1, Ordering::AcqRel);
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn frames_arrive_in_order_and_drain_the_backlog() {
        let (outbox, mut rx) = outbox(8);
        assert!(outbox.push("A".to_string()));
        assert!(outbox.push("B".to_string()));
        assert_eq!(outbox.pending(), 2);

        assert_eq!(rx.recv().await.as_deref(), Some("A"));
        assert_eq!(rx.recv().await.as_deref(), Some("B"));
        assert_eq!(outbox.pending(), 0);
        assert!(!outbox.is_failed());
    }

    #[tokio::test]
    async fn exceeding_the_limit_fails_the_outbox_for_good() {
        let (outbox, mut rx) = outbox(3);
        for n in 0..3 {
            assert!(outbox.push(n.to_string()));
        }
        assert!(!outbox.push("overflow".to_string()));
        assert!(outbox.is_failed());

        tokio::time::timeout(Duration::from_secs(1), outbox.failed())
            .await
            .expect("failure should be signalled");

        // Draining does not revive a failed outbox.
        assert_eq!(rx.recv().await.as_deref(), Some("0"));
        assert!(!outbox.push("late".to_string()));
    }

    #[tokio::test]
    async fn failure_wakes_a_waiting_task() {
        let (outbox, _rx) = outbox(1);
        let waiter = {
            let outbox = outbox.clone();
            tokio::spawn(async move { outbox.failed().await })
        };
        tokio::task::yield_now().await;

        assert!(outbox.push("first".to_string()));
        assert!(!outbox.push("second".to_string()));

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn push_after_receiver_is_dropped_is_refused() {
        let (outbox, rx) = outbox(4);
        drop(rx);
        assert!(!outbox.push("gone".to_string()));
        assert_eq!(outbox.pending(), 0);
        assert!(!outbox.is_failed());
    }
}
