//! Webhook endpoint handlers.
//!
//! The notification handler:
//! 1. Validates the JSON body
//! 2. Unwraps the envelope (verify, then decrypt)
//! 3. Hands the plaintext and header metadata to the usecase
//!
//! Every envelope failure maps to 400. Only a usecase failure is a 500.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::envelope::{fingerprint, EnvelopeOpener};
use crate::notification::{CreateNotificationInput, NotificationHeader, NotificationUsecase};
use crate::Config;

/// Header carrying the sender's event identifier (`X-Stone-Webhook-Event-Id`).
pub const EVENT_ID_HEADER: &str = "x-stone-webhook-event-id";

/// Header carrying the sender's event type (`X-Stone-Webhook-Event-Type`).
pub const EVENT_TYPE_HEADER: &str = "x-stone-webhook-event-type";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub opener: Arc<EnvelopeOpener>,
    pub usecase: Arc<dyn NotificationUsecase>,
}

impl AppState {
    pub fn new(config: Config, opener: EnvelopeOpener, usecase: Arc<dyn NotificationUsecase>) -> Self {
        Self {
            config: Arc::new(config),
            opener: Arc::new(opener),
            usecase,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Notifications
// =============================================================================

/// Notification request body.
#[derive(Debug, Deserialize)]
pub struct CreateNotificationRequest {
    pub encrypted_body: String,
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Notification webhook endpoint.
///
/// The body is taken as raw bytes so that every malformed body gets the same
/// 400 response instead of an extractor-specific rejection.
pub async fn create_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request: CreateNotificationRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, body_length = body.len(), "notification_body_invalid");
            return error_response(
                StatusCode::BAD_REQUEST,
                "body is empty or has no valid fields",
            );
        }
    };

    if request.encrypted_body.is_empty() {
        warn!("notification_body_missing_envelope");
        return error_response(StatusCode::BAD_REQUEST, "encrypted_body is required");
    }

    let header = NotificationHeader {
        event_id: header_value(&headers, EVENT_ID_HEADER),
        event_type: header_value(&headers, EVENT_TYPE_HEADER),
    };

    info!(
        event_id = %header.event_id,
        event_type = %header.event_type,
        fingerprint = %fingerprint(&request.encrypted_body),
        envelope_length = request.encrypted_body.len(),
        "notification_received"
    );

    let payload = match state.opener.open(&request.encrypted_body) {
        Ok(p) => p,
        Err(e) => {
            warn!(
                event_id = %header.event_id,
                kind = %e.kind(),
                "notification_rejected"
            );
            return error_response(StatusCode::BAD_REQUEST, e.kind().message());
        }
    };

    let event_id = header.event_id.clone();
    let input = CreateNotificationInput {
        header,
        body: payload,
    };

    if let Err(e) = state.usecase.create_notification(input).await {
        error!(event_id = %event_id, error = %e, "notification_usecase_failed");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to create notification",
        );
    }

    info!(event_id = %event_id, "notification_accepted");

    StatusCode::NO_CONTENT.into_response()
}
