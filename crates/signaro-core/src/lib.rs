//! # signaro-core
//!
//! Transport-agnostic heart of the signaling relay.
//!
//! - [`registry::SessionRegistry`]: the single controller slot and the
//!   identity → connection map
//! - [`router::MessageRouter`]: resolves the destination of each inbound
//!   payload and hands it to the destination's send path
//! - [`payload`]: `from` stamping and `to` extraction on JSON payloads
//! - [`connect`]: classifies a new connection from its query parameters
//! - [`auth`]: token verification hook
//!
//! Nothing here knows about sockets; the server crate supplies
//! [`handle::ConnectionHandle`] implementations.

#![deny(unsafe_code)]

pub mod auth;
pub mod connect;
pub mod errors;
pub mod handle;
pub mod payload;
pub mod peer;
pub mod registry;
pub mod router;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::{AllowAll, StaticTokens, TokenVerifier};
pub use connect::{ConnectParams, ConnectPolicy};
pub use errors::{ConnectionRejected, RoutingFailure};
pub use handle::{CloseReason, ConnectionHandle, ConnectionId, SharedHandle};
pub use peer::{PeerIdentity, PeerRole, PeerSession};
pub use registry::SessionRegistry;
pub use router::{MessageRouter, RouteOutcome};
