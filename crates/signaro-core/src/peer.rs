//! Peer roles and identities.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::handle::ConnectionId;

/// Identity of a client peer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerIdentity(String);

impl PeerIdentity {
    /// Wrap an identity string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerIdentity {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for PeerIdentity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Role assigned to a connection at connect time. Never changes afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PeerRole {
    /// The single privileged peer.
    Controller,
    /// An addressable client peer.
    Client(PeerIdentity),
}

impl PeerRole {
    /// `"controller"` or `"client"`, for logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Controller => "controller",
            Self::Client(_) => "client",
        }
    }
}

impl fmt::Display for PeerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Controller => f.write_str("controller"),
            Self::Client(id) => write!(f, "client:{id}"),
        }
    }
}

/// What the router needs to know about the sender of a message.
#[derive(Clone, Debug)]
pub struct PeerSession {
    /// Sender's connection.
    pub connection_id: ConnectionId,
    /// Sender's role.
    pub role: PeerRole,
}

impl PeerSession {
    /// Describe a registered connection.
    pub fn new(connection_id: ConnectionId, role: PeerRole) -> Self {
        Self {
            connection_id,
            role,
        }
    }
}
