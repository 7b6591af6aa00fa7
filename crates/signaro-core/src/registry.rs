//! Session registry for routing between the controller and clients.
//!
//! The registry holds:
//! - the single controller slot
//! - a map from client identity to that client's connection
//!
//! Registration is last-writer-wins in both places. A superseded handle is
//! not closed here; its own disconnect later calls [`SessionRegistry::deregister`],
//! which matches by [`ConnectionId`] and therefore leaves the successor alone.

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::handle::{ConnectionHandle, ConnectionId, SharedHandle};
use crate::peer::{PeerIdentity, PeerRole};

/// Live controller and client connections.
pub struct SessionRegistry {
    controller: RwLock<Option<SharedHandle>>,
    clients: DashMap<PeerIdentity, SharedHandle>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            controller: RwLock::new(None),
            clients: DashMap::new(),
        }
    }

    /// Make `handle` the controller. Returns the handle it replaced, if any.
    pub fn register_controller(&self, handle: SharedHandle) -> Option<SharedHandle> {
        let conn_id = handle.id();
        let previous = self.controller.write().replace(handle);
        match &previous {
            Some(old) if old.id() != conn_id => {
                info!(%conn_id, superseded = %old.id(), "controller registered, replacing previous");
            }
            _ => info!(%conn_id, "controller registered"),
        }
        previous
    }

    /// Map `identity` to `handle`. Returns the handle it replaced, if any.
    pub fn register_client(
        &self,
        identity: PeerIdentity,
        handle: SharedHandle,
    ) -> Option<SharedHandle> {
        let conn_id = handle.id();
        let previous = self.clients.insert(identity.clone(), handle);
        match &previous {
            Some(old) if old.id() != conn_id => {
                info!(client_id = %identity, %conn_id, superseded = %old.id(), "client registered, replacing previous");
            }
            _ => info!(client_id = %identity, %conn_id, "client registered"),
        }
        previous
    }

    /// Register `handle` under `role`.
    pub fn register(&self, role: &PeerRole, handle: SharedHandle) -> Option<SharedHandle> {
        match role {
            PeerRole::Controller => self.register_controller(handle),
            PeerRole::Client(identity) => self.register_client(identity.clone(), handle),
        }
    }

    /// The current controller, if one is registered.
    pub fn controller(&self) -> Option<SharedHandle> {
        self.controller.read().clone()
    }

    /// The connection registered for `identity`, if any.
    pub fn client(&self, identity: &PeerIdentity) -> Option<SharedHandle> {
        self.clients.get(identity).map(|entry| entry.value().clone())
    }

    /// Remove the connection `conn_id` from wherever it is registered.
    ///
    /// Checks the controller slot first, then the client map. Returns the
    /// role it was registered under, or `None` if it was not registered
    /// (already removed, or superseded by a newer connection).
    pub fn deregister(&self, conn_id: ConnectionId) -> Option<PeerRole> {
        {
            let mut slot = self.controller.write();
            if slot.as_ref().is_some_and(|h| h.id() == conn_id) {
                *slot = None;
                info!(%conn_id, "controller deregistered");
                return Some(PeerRole::Controller);
            }
        }

        let identity = self
            .clients
            .iter()
            .find(|entry| entry.value().id() == conn_id)
            .map(|entry| entry.key().clone())?;

        // Only remove if the entry still belongs to this connection; a new
        // registration may have landed between the scan and the removal.
        let removed = self
            .clients
            .remove_if(&identity, |_, handle| handle.id() == conn_id);
        if removed.is_some() {
            info!(client_id = %identity, %conn_id, "client deregistered");
            Some(PeerRole::Client(identity))
        } else {
            debug!(client_id = %identity, %conn_id, "client superseded before deregistration");
            None
        }
    }

    /// Whether a controller is registered.
    pub fn has_controller(&self) -> bool {
        self.controller.read().is_some()
    }

    /// Number of registered clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Identities of all registered clients, sorted.
    pub fn client_identities(&self) -> Vec<PeerIdentity> {
        let mut ids: Vec<PeerIdentity> = self.clients.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
