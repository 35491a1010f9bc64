//! Webhook Consumer - HTTP receiver for signed-then-encrypted notifications.
//!
//! This binary:
//! - Loads the verification and decryption keys once at startup
//! - Serves `POST /notifications`
//! - Verifies, decrypts and hands each notification to the usecase
//!
//! Configuration is read from the environment; see `Config`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use webhook_consumer::{
    web, AppState, Config, DecryptionKey, EnvelopeOpener, LoggingUsecase, VerificationKey,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("consumer_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        max_body_bytes = config.max_body_bytes,
        "config_loaded"
    );

    // Load keys
    let verification_key_path = config
        .verification_key_path
        .as_deref()
        .context("VERIFICATION_KEY_PATH is not set")?;
    let verification_key =
        VerificationKey::load(verification_key_path, &config.verification_algorithms)
            .context("Failed to load verification key")?;

    let decryption_key_path = config
        .decryption_key_path
        .as_deref()
        .context("DECRYPTION_KEY_PATH is not set")?;
    let decryption_key =
        DecryptionKey::load(decryption_key_path).context("Failed to load decryption key")?;

    info!(
        verification_key_family = %verification_key.family(),
        verification_algorithms = ?verification_key.algorithms(),
        decryption_key_bits = decryption_key.size() * 8,
        "keys_loaded"
    );

    // Create application state
    let opener = EnvelopeOpener::new(verification_key, decryption_key);
    let state = AppState::new(config.clone(), opener, Arc::new(LoggingUsecase));

    let app = web::router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "consumer_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("consumer_shutdown_complete");

    Ok(())
}

/// Wait for SIGINT or SIGTERM. A signal whose handler cannot be installed is
/// logged and never fires; the other one still stops the server.
async fn shutdown_signal() {
    let received = tokio::select! {
        name = interrupt() => name,
        name = terminate() => name,
    };

    info!(signal = received, "consumer_shutting_down");
}

async fn interrupt() -> &'static str {
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "sigint_handler_unavailable");
        std::future::pending::<()>().await;
    }
    "SIGINT"
}

#[cfg(unix)]
async fn terminate() -> &'static str {
    use tokio::signal::unix::{signal as unix_signal, SignalKind};

    match unix_signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "sigterm_handler_unavailable");
            std::future::pending::<()>().await;
        }
    }
    "SIGTERM"
}

#[cfg(not(unix))]
async fn terminate() -> &'static str {
    std::future::pending().await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_shutdown_signal_waits_for_a_signal() {
        let waited = tokio::time::timeout(Duration::from_millis(50), shutdown_signal()).await;
        assert!(waited.is_err());
    }
}
