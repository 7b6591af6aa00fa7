//! Relay error types.
//!
//! Neither enum is ever sent to the peer that triggered it. Rejections end
//! in a close frame; routing failures end in a log line and a counter.

use thiserror::Error;

/// Why a connection was refused before it reached the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionRejected {
    /// A client connection carried no usable identity and no default is configured.
    #[error("missing client identity")]
    MissingIdentity,
    /// The token verifier refused the connection.
    #[error("invalid token")]
    InvalidToken,
}

impl ConnectionRejected {
    /// WebSocket close code sent with the rejection.
    ///
    /// Token failures use 1003 so clients can tell them apart from
    /// malformed connection URLs (1008).
    pub fn close_code(&self) -> u16 {
        match self {
            Self::MissingIdentity => 1008,
            Self::InvalidToken => 1003,
        }
    }

    /// Short reason string sent in the close frame.
    pub fn close_reason(&self) -> &'static str {
        match self {
            Self::MissingIdentity => "Missing client identity",
            Self::InvalidToken => "Invalid token",
        }
    }

    /// Stable label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::MissingIdentity => "missing_identity",
            Self::InvalidToken => "invalid_token",
        }
    }
}

/// Why a message could not be delivered. The message is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingFailure {
    /// Controller payload named no target and no default client is configured.
    #[error("controller message names no target client")]
    NoTarget,
    /// No client is registered under the target identity.
    #[error("client '{0}' is not connected")]
    UnknownClient(String),
    /// The client is registered but its connection is no longer open.
    #[error("client '{0}' connection is closed")]
    ClientClosed(String),
    /// No controller is registered.
    #[error("controller is not connected")]
    NoController,
    /// The controller is registered but its connection is no longer open.
    #[error("controller connection is closed")]
    ControllerClosed,
    /// The destination refused the message (send queue full or closed).
    #[error("destination send queue rejected the message")]
    SendRejected,
}

impl RoutingFailure {
    /// Stable label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoTarget => "no_target",
            Self::UnknownClient(_) => "unknown_client",
            Self::ClientClosed(_) => "client_closed",
            Self::NoController => "no_controller",
            Self::ControllerClosed => "controller_closed",
            Self::SendRejected => "send_rejected",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
