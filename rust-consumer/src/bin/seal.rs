//! Notification Seal - builds envelopes for local testing.
//!
//! Reads a plaintext payload from stdin, encrypts it to the consumer's public
//! key, signs the result and writes the compact envelope to stdout.
//!
//! Environment:
//! - `SEAL_SIGNING_KEY_PATH`: signing key (PEM, or raw secret for HS*)
//! - `SEAL_SIGNING_ALGORITHM`: JWS algorithm (default `RS256`)
//! - `SEAL_ENCRYPTION_KEY_PATH`: consumer RSA public key (PEM)
//! - `SEAL_KEY_MANAGEMENT`: JWE `alg` (default `RSA-OAEP-256`)
//! - `SEAL_CONTENT_ENCRYPTION`: JWE `enc` (default `A256GCM`)
//!
//! The envelope is written without a trailing newline.

use std::env;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use jsonwebtoken::Algorithm;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use webhook_consumer::envelope::{fingerprint, seal};
use webhook_consumer::jose::{ContentEncryption, EncryptionKey, KeyManagement, SigningKey};

fn required_path(name: &str) -> Result<PathBuf> {
    env::var(name)
        .map(PathBuf::from)
        .with_context(|| format!("{} is not set", name))
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only the envelope
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true).with_writer(io::stderr))
        .init();

    let algorithm_name = env::var("SEAL_SIGNING_ALGORITHM").unwrap_or_else(|_| "RS256".to_string());
    let algorithm = Algorithm::from_str(&algorithm_name)
        .with_context(|| format!("Unsupported signing algorithm {}", algorithm_name))?;

    let management = match env::var("SEAL_KEY_MANAGEMENT") {
        Ok(name) => name.parse::<KeyManagement>()?,
        Err(_) => KeyManagement::default(),
    };

    let content = env::var("SEAL_CONTENT_ENCRYPTION")
        .unwrap_or_else(|_| "A256GCM".to_string())
        .parse::<ContentEncryption>()?;

    let signing_key = SigningKey::load(&required_path("SEAL_SIGNING_KEY_PATH")?, algorithm)
        .context("Failed to load signing key")?;
    let encryption_key = EncryptionKey::load(&required_path("SEAL_ENCRYPTION_KEY_PATH")?, content)
        .context("Failed to load encryption key")?
        .with_key_management(management);

    let mut plaintext = String::new();
    io::stdin()
        .read_to_string(&mut plaintext)
        .context("Failed to read plaintext from stdin")?;

    let envelope = seal(&plaintext, &signing_key, &encryption_key).context("Failed to seal")?;

    info!(
        algorithm = ?algorithm,
        key_management = %management,
        content_encryption = %content,
        plaintext_length = plaintext.len(),
        fingerprint = %fingerprint(&envelope),
        "envelope_sealed"
    );

    let mut stdout = io::stdout().lock();
    write!(stdout, "{}", envelope).context("Failed to write envelope")?;
    stdout.flush().context("Failed to write envelope")?;

    Ok(())
}
