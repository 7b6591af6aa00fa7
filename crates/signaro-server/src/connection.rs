//! `WebSocket` connection state shared between the reader loop, the writer
//! task and the registry.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use signaro_core::{CloseReason, ConnectionHandle, ConnectionId, SharedHandle};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A live `WebSocket` connection as the router sees it.
///
/// Outbound text goes through a bounded queue drained by the writer task.
/// Closing cancels `closed`; the writer flushes what is queued, sends the
/// close frame and exits.
pub struct WsConnection {
    id: ConnectionId,
    tx: mpsc::Sender<String>,
    open: AtomicBool,
    closed: CancellationToken,
    close_reason: Mutex<Option<CloseReason>>,
    last_activity: Mutex<Instant>,
    connected_at: Instant,
    dropped_messages: AtomicU64,
}

impl WsConnection {
    /// Create a connection backed by `tx`.
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        let now = Instant::now();
        Self {
            id: ConnectionId::new(),
            tx,
            open: AtomicBool::new(true),
            closed: CancellationToken::new(),
            close_reason: Mutex::new(None),
            last_activity: Mutex::new(now),
            connected_at: now,
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Create a connection and the receiving end of its outbound queue.
    pub fn channel(capacity: usize) -> (Arc<Self>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Arc::new(Self::new(tx)), rx)
    }

    /// This connection as a registry handle.
    pub fn shared(self: &Arc<Self>) -> SharedHandle {
        self.clone()
    }

    /// Resolves once [`ConnectionHandle::close`] has been called.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    /// The reason passed to the first `close` call.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason.lock().clone()
    }

    /// Record inbound traffic (any frame, including pongs).
    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Time since the last inbound frame.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Messages refused because the queue was full or closed.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }
}

impl ConnectionHandle for WsConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, text: &str) -> bool {
        if self.is_open() && self.tx.try_send(text.to_owned()).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn close(&self, reason: CloseReason) {
        if self.open.swap(false, Ordering::AcqRel) {
            *self.close_reason.lock() = Some(reason);
        }
        self.closed.cancel();
    }
}
