//! Event ingestion: HTTP webhook receiver and streaming socket client
//!
//! Both transports share the payload classification below and feed the same
//! [`EventQueues`](crate::events::EventQueues).

pub mod backoff;
pub mod stream;
pub mod webhook;

pub use backoff::{BackoffPolicy, ExponentialBackoff};
pub use stream::{RegistrationFrame, StreamClient};
pub use webhook::{router, WebhookState};

use crate::error::{Result, SyncError};
use crate::events::SyncMessage;
use crate::lark::models::{event_types, Envelope};
use crate::lark::{ChangeEvent, DepartmentSnapshot, UserSnapshot};
use serde_json::Value;

const URL_VERIFICATION: &str = "url_verification";

/// What an inbound payload turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Endpoint ownership handshake; the challenge must be echoed back
    Challenge(String),
    Event(SyncMessage),
    /// Event type this service does not mirror
    Ignored(String),
}

/// Parse raw bytes as JSON.
pub fn decode(raw: &[u8]) -> Result<Value> {
    serde_json::from_slice(raw).map_err(|e| SyncError::Transport(format!("invalid json payload: {e}")))
}

/// Verification token carried by a payload. Events carry it in the header;
/// the url verification handshake carries it at the top level.
pub fn payload_token(payload: &Value) -> &str {
    payload
        .pointer("/header/token")
        .or_else(|| payload.get("token"))
        .and_then(Value::as_str)
        .unwrap_or_default()
}

/// Classify an already parsed payload by its event type prefix.
pub fn classify(payload: Value) -> Result<Inbound> {
    if payload.get("type").and_then(Value::as_str) == Some(URL_VERIFICATION) {
        let challenge = payload
            .get("challenge")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Ok(Inbound::Challenge(challenge.to_string()));
    }

    let event_type = payload
        .pointer("/header/event_type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if event_type.contains(event_types::USER_PREFIX) {
        let envelope: Envelope<UserSnapshot> = serde_json::from_value(payload)
            .map_err(|e| SyncError::Transport(format!("malformed user event: {e}")))?;
        return Ok(Inbound::Event(SyncMessage::User(ChangeEvent::from(envelope))));
    }
    if event_type.contains(event_types::DEPARTMENT_PREFIX) {
        let envelope: Envelope<DepartmentSnapshot> = serde_json::from_value(payload)
            .map_err(|e| SyncError::Transport(format!("malformed department event: {e}")))?;
        return Ok(Inbound::Event(SyncMessage::Department(ChangeEvent::from(envelope))));
    }
    Ok(Inbound::Ignored(event_type))
}

/// [`decode`] then [`classify`].
pub fn classify_payload(raw: &[u8]) -> Result<Inbound> {
    classify(decode(raw)?)
}
