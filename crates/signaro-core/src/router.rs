//! Message routing between the controller and clients.
//!
//! - controller → client: destination named by the payload's `to` field
//!   (or the configured default client); payload forwarded unmodified
//! - client → controller: payload stamped with `from` = sender identity
//!
//! Delivery is best-effort and at-most-once. A message that cannot be
//! delivered is logged, counted and dropped; the sender is never told.

use std::sync::Arc;

use metrics::counter;
use tracing::{trace, warn};

use crate::errors::RoutingFailure;
use crate::handle::{ConnectionHandle, ConnectionId, SharedHandle};
use crate::payload::{stamp_sender, target_of};
use crate::peer::{PeerIdentity, PeerRole, PeerSession};
use crate::registry::SessionRegistry;

/// Messages delivered (counter, labels: direction).
pub const MESSAGES_ROUTED_TOTAL: &str = "relay_messages_routed_total";
/// Messages dropped (counter, labels: reason).
pub const ROUTING_FAILURES_TOTAL: &str = "relay_routing_failures_total";

/// Result of routing one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Handed to the destination's send path.
    Delivered {
        /// Destination connection.
        to: ConnectionId,
    },
    /// Dropped.
    Dropped(RoutingFailure),
}

impl RouteOutcome {
    /// Whether the message reached a destination's send path.
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Routes payloads using a shared [`SessionRegistry`].
pub struct MessageRouter {
    registry: Arc<SessionRegistry>,
    default_client: Option<PeerIdentity>,
}

impl MessageRouter {
    /// Create a router over `registry`.
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            registry,
            default_client: None,
        }
    }

    /// Client that receives controller messages which name no `to`.
    #[must_use]
    pub fn with_default_client(mut self, client: Option<PeerIdentity>) -> Self {
        self.default_client = client;
        self
    }

    /// The registry this router reads from.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Route one inbound payload from `sender`.
    pub fn route(&self, sender: &PeerSession, payload: &str) -> RouteOutcome {
        let direction = match sender.role {
            PeerRole::Controller => "to_client",
            PeerRole::Client(_) => "to_controller",
        };
        let result = match &sender.role {
            PeerRole::Controller => self.route_to_client(payload),
            PeerRole::Client(identity) => self.route_to_controller(identity, payload),
        };

        match result {
            Ok(to) => {
                trace!(from = %sender.connection_id, %to, direction, len = payload.len(), "message routed");
                counter!(MESSAGES_ROUTED_TOTAL, "direction" => direction).increment(1);
                RouteOutcome::Delivered { to }
            }
            Err(failure) => {
                warn!(
                    from = %sender.connection_id,
                    role = sender.role.kind(),
                    reason = failure.label(),
                    "dropping message: {failure}"
                );
                counter!(ROUTING_FAILURES_TOTAL, "reason" => failure.label()).increment(1);
                RouteOutcome::Dropped(failure)
            }
        }
    }

    fn route_to_client(&self, payload: &str) -> Result<ConnectionId, RoutingFailure> {
        let target = target_of(payload)
            .or_else(|| self.default_client.clone())
            .ok_or(RoutingFailure::NoTarget)?;
        let handle = self
            .registry
            .client(&target)
            .ok_or_else(|| RoutingFailure::UnknownClient(target.to_string()))?;
        if !handle.is_open() {
            return Err(RoutingFailure::ClientClosed(target.to_string()));
        }
        deliver(&handle, payload)
    }

    fn route_to_controller(
        &self,
        sender: &PeerIdentity,
        payload: &str,
    ) -> Result<ConnectionId, RoutingFailure> {
        let handle = self
            .registry
            .controller()
            .ok_or(RoutingFailure::NoController)?;
        if !handle.is_open() {
            return Err(RoutingFailure::ControllerClosed);
        }
        let stamped = stamp_sender(payload, sender);
        deliver(&handle, &stamped)
    }
}

fn deliver(handle: &SharedHandle, text: &str) -> Result<ConnectionId, RoutingFailure> {
    if handle.send(text) {
        Ok(handle.id())
    } else {
        Err(RoutingFailure::SendRejected)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
