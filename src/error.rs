//! Error taxonomy for the synchronization engine

use thiserror::Error;

/// Errors surfaced by transports, REST clients and sync handlers.
///
/// Every variant ends up as one logged failure for a single event; the
/// dispatcher never stops on any of them.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Malformed or undecodable inbound payload.
    #[error("transport error: {0}")]
    Transport(String),

    /// Token acquisition against Lark or Keycloak failed.
    #[error("auth error: {0}")]
    Auth(String),

    /// A source or target entity required by the operation does not exist.
    #[error("lookup error: {0}")]
    Lookup(String),

    /// An event precondition was violated.
    #[error("validation error: {0}")]
    Validation(String),

    /// Non-2xx response not covered by an idempotency exception.
    #[error("{context} failed ({status}): {body}")]
    Remote {
        context: String,
        status: u16,
        body: String,
    },

    /// Event subtype the handlers do not know about.
    #[error("unsupported event type: {0}")]
    UnsupportedEvent(String),

    /// Connection, timeout or body decoding failure of the HTTP client.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SyncError {
    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup(msg.into())
    }

    pub fn remote(context: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Remote {
            context: context.into(),
            status,
            body: body.into(),
        }
    }

    /// True when the error means "the entity is not there".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Lookup(_))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
