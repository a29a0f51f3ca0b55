//! HTTP webhook receiver for Lark event subscriptions

use super::{classify, decode, payload_token, Inbound};
use crate::events::EventQueues;
use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

/// Largest accepted notification body
const MAX_BODY_BYTES: usize = 1024 * 1024;

pub struct WebhookState {
    pub queues: EventQueues,
    pub verification_token: String,
}

/// Webhook error type
#[derive(Debug)]
pub enum WebhookError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            WebhookError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            WebhookError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        let body = Json(serde_json::json!({
            "error": message
        }));
        (status, body).into_response()
    }
}

/// Routes: `/healthz`, and the notification endpoint under both its
/// versioned and short path.
pub fn router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/v1/lark/notifications", post(receive_notification))
        .route("/notifications", post(receive_notification))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn receive_notification(
    State(state): State<Arc<WebhookState>>,
    body: Body,
) -> Result<Response, WebhookError> {
    let raw = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| WebhookError::Internal(format!("failed to read body: {e}")))?;

    let payload = decode(&raw).map_err(|e| {
        warn!("Rejecting notification: {}", e);
        WebhookError::BadRequest(e.to_string())
    })?;

    if payload_token(&payload) != state.verification_token {
        warn!("Rejecting notification with mismatched verification token");
        return Err(WebhookError::BadRequest(
            "verification token mismatch".to_string(),
        ));
    }

    match classify(payload) {
        Ok(Inbound::Challenge(challenge)) => {
            debug!("Answering url verification challenge");
            Ok(Json(serde_json::json!({ "challenge": challenge })).into_response())
        }
        Ok(Inbound::Event(message)) => {
            debug!(event_id = %message.event_id(), event_type = %message.event_type(), "Accepted notification");
            state
                .queues
                .push(message)
                .await
                .map_err(|e| WebhookError::Internal(e.to_string()))?;
            Ok(StatusCode::OK.into_response())
        }
        Ok(Inbound::Ignored(event_type)) => {
            debug!(event_type = %event_type, "Ignoring notification");
            Ok(StatusCode::OK.into_response())
        }
        Err(e) => {
            warn!("Failed to decode notification: {}", e);
            Err(WebhookError::Internal(e.to_string()))
        }
    }
}
