//! In-memory connection handle for unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::handle::{CloseReason, ConnectionHandle, ConnectionId, SharedHandle};

/// Records everything sent to it.
pub(crate) struct RecordingHandle {
    id: ConnectionId,
    open: AtomicBool,
    accepting: AtomicBool,
    sent: Mutex<Vec<String>>,
    closed_with: Mutex<Option<CloseReason>>,
}

impl RecordingHandle {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::new(),
            open: AtomicBool::new(true),
            accepting: AtomicBool::new(true),
            sent: Mutex::new(Vec::new()),
            closed_with: Mutex::new(None),
        })
    }

    pub(crate) fn shared(self: &Arc<Self>) -> SharedHandle {
        self.clone()
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Flip to closed without going through `close`, like a dropped socket.
    pub(crate) fn drop_connection(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    /// Make `send` refuse messages while staying open.
    pub(crate) fn refuse_sends(&self) {
        self.accepting.store(false, Ordering::SeqCst);
    }

    pub(crate) fn closed_with(&self) -> Option<CloseReason> {
        self.closed_with.lock().clone()
    }
}

impl ConnectionHandle for RecordingHandle {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, text: &str) -> bool {
        if !self.accepting.load(Ordering::SeqCst) {
            return false;
        }
        self.sent.lock().push(text.to_owned());
        true
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn close(&self, reason: CloseReason) {
        self.open.store(false, Ordering::SeqCst);
        *self.closed_with.lock() = Some(reason);
    }
}
