//! Notification types handed to the business usecase.
//!
//! The usecase is an external collaborator: this crate only guarantees that
//! what it receives has been verified and decrypted. How the payload is
//! interpreted or stored is up to the implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Transport metadata sent alongside the envelope.
///
/// Not covered by the signature; passed through as received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationHeader {
    pub event_id: String,
    pub event_type: String,
}

/// A verified, decrypted notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateNotificationInput {
    pub header: NotificationHeader,
    /// Decrypted payload, uninterpreted.
    pub body: String,
}

/// Business logic that consumes notifications.
#[async_trait]
pub trait NotificationUsecase: Send + Sync {
    async fn create_notification(&self, input: CreateNotificationInput) -> anyhow::Result<()>;
}

/// Usecase that records receipt in the log and nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingUsecase;

#[async_trait]
impl NotificationUsecase for LoggingUsecase {
    async fn create_notification(&self, input: CreateNotificationInput) -> anyhow::Result<()> {
        info!(
            event_id = %input.header.event_id,
            event_type = %input.header.event_type,
            body_length = input.body.len(),
            "notification_created"
        );
        Ok(())
    }
}
