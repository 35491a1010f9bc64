//! Web server module for receiving notification webhooks.
//!
//! This module provides a thin web server that:
//! - Receives signed-then-encrypted notification envelopes
//! - Verifies and decrypts them
//! - Hands the plaintext to the notification usecase
//! - Returns 204 on success, 400 for any envelope problem

pub mod handlers;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{
    create_notification, health, AppState, CreateNotificationRequest, ErrorResponse,
    HealthResponse, EVENT_ID_HEADER, EVENT_TYPE_HEADER,
};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let max_body_bytes = state.config.max_body_bytes;

    Router::new()
        .route("/health", get(health))
        .route("/notifications", post(create_notification))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
