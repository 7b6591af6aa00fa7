//! Payload helpers.
//!
//! Payloads are opaque to the relay except for two top-level keys: `from`,
//! which the relay stamps on everything a client sends, and `to`, which a
//! controller uses to address a client. Anything that is not a JSON object
//! passes through untouched.

use std::borrow::Cow;

use serde_json::Value;
use tracing::debug;

use crate::peer::PeerIdentity;

/// Key stamped with the sender's identity on client payloads.
pub const SENDER_FIELD: &str = "from";

/// Key a controller payload uses to name its destination client.
pub const TARGET_FIELD: &str = "to";

/// Set `from` to `sender` on a JSON object payload.
///
/// Other keys keep their values and their order; an existing `from` is
/// overwritten where it stands. If `payload` is not a JSON object it is
/// returned as-is.
pub fn stamp_sender<'a>(payload: &'a str, sender: &PeerIdentity) -> Cow<'a, str> {
    let mut value: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "payload is not JSON, forwarding unchanged");
            return Cow::Borrowed(payload);
        }
    };

    let Some(object) = value.as_object_mut() else {
        debug!("payload is not a JSON object, forwarding unchanged");
        return Cow::Borrowed(payload);
    };
    let _ = object.insert(
        SENDER_FIELD.to_string(),
        Value::String(sender.as_str().to_owned()),
    );

    match serde_json::to_string(&value) {
        Ok(json) => Cow::Owned(json),
        Err(e) => {
            debug!(error = %e, "failed to re-serialize payload, forwarding unchanged");
            Cow::Borrowed(payload)
        }
    }
}

/// Read the destination client named by a controller payload.
///
/// Returns `None` for non-object payloads and for a missing, empty or
/// non-string `to`.
pub fn target_of(payload: &str) -> Option<PeerIdentity> {
    let value: Value = serde_json::from_str(payload).ok()?;
    value
        .get(TARGET_FIELD)?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(PeerIdentity::from)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
