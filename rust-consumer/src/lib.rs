//! Webhook Consumer - receiver for signed-then-encrypted notifications.
//!
//! Senders encrypt a payload to our RSA key (JWE), sign the result with
//! their own key (JWS) and POST the compact JWS. This library provides:
//! - `jose`: compact JWS verification and JWE decryption (plus the sealing
//!   counterparts used by tests and the `notification-seal` tool)
//! - `envelope`: the verify-then-decrypt pipeline and its error taxonomy
//! - `web`: the HTTP endpoint that feeds the pipeline
//! - `notification`: the types handed to the business usecase
//!
//! ## Architecture
//!
//! ```text
//! POST /notifications → verify (JWS) → decrypt (JWE) → NotificationUsecase
//! ```

pub mod config;
pub mod envelope;
pub mod jose;
pub mod notification;
pub mod web;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::Config;
pub use envelope::{unwrap_envelope, EnvelopeOpener, ErrorKind, PipelineError};
pub use jose::{DecryptionKey, VerificationKey};
pub use notification::{
    CreateNotificationInput, LoggingUsecase, NotificationHeader, NotificationUsecase,
};
pub use web::AppState;
