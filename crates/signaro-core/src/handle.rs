//! The connection handle seam between the core and the transport.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::errors::ConnectionRejected;

/// Identity of one physical connection.
///
/// Registry removal compares these ids, never payload or peer identity, so a
/// superseded connection cannot evict its successor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Mint a fresh, time-ordered id.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn_{}", self.0.simple())
    }
}

/// Close code and reason sent to a peer when the relay ends its connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseReason {
    /// WebSocket close code.
    pub code: u16,
    /// Human-readable reason.
    pub reason: Cow<'static, str>,
}

impl CloseReason {
    /// Build a close reason.
    pub fn new(code: u16, reason: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// 1001, sent when the relay shuts down.
    pub fn going_away() -> Self {
        Self::new(1001, "Server shutting down")
    }

    /// 1000, normal closure.
    pub fn normal() -> Self {
        Self::new(1000, "")
    }
}

impl From<&ConnectionRejected> for CloseReason {
    fn from(rejection: &ConnectionRejected) -> Self {
        Self::new(rejection.close_code(), rejection.close_reason())
    }
}

/// A live bidirectional text stream owned by the transport.
///
/// `send` is fire-and-forget: it enqueues and returns whether the text was
/// accepted. Implementations must not block.
pub trait ConnectionHandle: Send + Sync {
    /// Id of the underlying connection.
    fn id(&self) -> ConnectionId;

    /// Enqueue `text` for delivery. Returns `false` if it was not accepted.
    fn send(&self, text: &str) -> bool;

    /// Whether the underlying stream is still open.
    fn is_open(&self) -> bool;

    /// Ask the transport to close the stream.
    fn close(&self, reason: CloseReason);
}

/// Shared reference to a connection handle, as stored by the registry.
pub type SharedHandle = Arc<dyn ConnectionHandle>;
