//! Per-connection outbound handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use carelink_core::{ConnectionId, OutboundFrame};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::warn;

/// Sink for one connected participant.
///
/// Frames go into a bounded queue drained by the connection's writer task,
/// so sending never blocks and never touches the socket directly.
pub struct ConnectionHandle {
    /// Unique connection ID.
    pub id: ConnectionId,
    tx: mpsc::Sender<Arc<String>>,
    close: CancellationToken,
    is_alive: AtomicBool,
    dropped_messages: AtomicU64,
}

impl ConnectionHandle {
    /// Create a handle feeding `tx`.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id,
            tx,
            close: CancellationToken::new(),
            is_alive: AtomicBool::new(true),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Enqueue pre-serialized text.
    ///
    /// Returns `false` if the queue is full or the connection is gone, and
    /// increments the dropped message counter.
    pub fn send_raw(&self, message: Arc<String>) -> bool {
        if self.close.is_cancelled() {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        if self.tx.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Serialize and enqueue a frame.
    pub fn send(&self, frame: &OutboundFrame) -> bool {
        match frame.to_json() {
            Ok(json) => self.send_raw(Arc::new(json)),
            Err(e) => {
                warn!(conn_id = %self.id, error = %e, "failed to serialize frame");
                false
            }
        }
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Ask the connection's tasks to stop. Idempotent.
    pub fn close(&self) {
        self.close.cancel();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.close.is_cancelled()
    }

    /// Resolves once the connection is asked to close.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.close.cancelled()
    }

    /// Mark the connection as alive (pong or any inbound frame).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
    }

    /// Check and reset the alive flag.
    ///
    /// Returns `true` if the peer showed activity since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .field("dropped", &self.drop_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection(capacity: usize) -> (ConnectionHandle, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity);
        let conn = ConnectionHandle::new(ConnectionId::from_string("conn_1".into()), tx);
        (conn, rx)
    }

    #[test]
    fn create_connection() {
        let (conn, _rx) = make_connection(8);
        assert_eq!(conn.id.as_str(), "conn_1");
        assert!(!conn.is_closed());
        assert_eq!(conn.drop_count(), 0);
    }

    #[tokio::test]
    async fn send_frame_serializes() {
        let (conn, mut rx) = make_connection(8);
        assert!(conn.send(&OutboundFrame::NewPatient { patient_id: 4 }));
        let msg = rx.recv().await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(parsed["type"], "new_patient");
        assert_eq!(parsed["patient_id"], 4);
    }

    #[tokio::test]
    async fn send_to_closed_channel_returns_false() {
        let (conn, rx) = make_connection(8);
        drop(rx);
        assert!(!conn.send_raw(Arc::new("hello".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[tokio::test]
    async fn send_to_full_channel_returns_false() {
        let (conn, _rx) = make_connection(1);
        assert!(conn.send_raw(Arc::new("msg1".into())));
        assert!(!conn.send_raw(Arc::new("msg2".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[tokio::test]
    async fn send_after_close_returns_false() {
        let (conn, mut rx) = make_connection(8);
        conn.close();
        assert!(!conn.send(&OutboundFrame::error("x")));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_future_resolves_after_close() {
        let (conn, _rx) = make_connection(8);
        let conn = Arc::new(conn);
        let waiter = {
            let conn = conn.clone();
            tokio::spawn(async move { conn.closed().await })
        };
        conn.close();
        conn.close();
        waiter.await.unwrap();
        assert!(conn.is_closed());
    }

    #[test]
    fn mark_alive_and_check() {
        let (conn, _rx) = make_connection(8);
        assert!(conn.check_alive());
        assert!(!conn.check_alive());
        conn.mark_alive();
        assert!(conn.check_alive());
    }

    #[tokio::test]
    async fn frames_arrive_in_order() {
        let (conn, mut rx) = make_connection(8);
        for i in 0..5 {
            assert!(conn.send(&OutboundFrame::NewPatient { patient_id: i }));
        }
        for i in 0..5 {
            let msg = rx.recv().await.unwrap();
            let parsed: serde_json::Value = serde_json::from_str(&msg).unwrap();
            assert_eq!(parsed["patient_id"], i);
        }
    }
}
