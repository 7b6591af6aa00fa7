//! Connection classification.
//!
//! A connection URL looks like `/stream?client=python` for the controller or
//! `/stream?client=js&id=peer-1&token=...` for a client. Any `client` value
//! other than the controller role, including none at all, means a client.
//! Classification happens once, before the registry sees the connection.

use serde::Deserialize;

use crate::auth::TokenVerifier;
use crate::errors::ConnectionRejected;
use crate::peer::{PeerIdentity, PeerRole};

/// Role value that selects the controller unless configured otherwise.
pub const DEFAULT_CONTROLLER_ROLE: &str = "python";

/// Query parameters of a connection request.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Role selector.
    pub client: Option<String>,
    /// Authentication token.
    pub token: Option<String>,
    /// Client identity.
    pub id: Option<String>,
}

/// Rules for turning [`ConnectParams`] into a [`PeerRole`].
#[derive(Clone, Debug)]
pub struct ConnectPolicy {
    /// `client` value that designates the controller.
    pub controller_role: String,
    /// Identity given to clients that present neither `id` nor `token`.
    pub default_client: Option<PeerIdentity>,
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self {
            controller_role: DEFAULT_CONTROLLER_ROLE.to_string(),
            default_client: None,
        }
    }
}

impl ConnectPolicy {
    /// Classify a connection.
    ///
    /// Order: token verification, then role, then client identity.
    /// Any failure means the connection never reaches the registry.
    pub fn admit(
        &self,
        params: &ConnectParams,
        verifier: &dyn TokenVerifier,
    ) -> Result<PeerRole, ConnectionRejected> {
        let role = non_empty(params.client.as_deref());
        let token = non_empty(params.token.as_deref());

        if !verifier.verify(token) {
            return Err(ConnectionRejected::InvalidToken);
        }

        if role == Some(self.controller_role.as_str()) {
            return Ok(PeerRole::Controller);
        }

        non_empty(params.id.as_deref())
            .or(token)
            .map(PeerIdentity::from)
            .or_else(|| self.default_client.clone())
            .map(PeerRole::Client)
            .ok_or(ConnectionRejected::MissingIdentity)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
