//! Configuration module for environment variable parsing.
//!
//! All configuration is read from environment variables. Key paths are
//! optional here; the binaries decide whether a missing path is fatal.

use std::env;
use std::path::PathBuf;

use jsonwebtoken::Algorithm;
use tracing::warn;

use crate::jose::keys::parse_algorithms;

/// Default maximum accepted request body (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Path to the signature verification key (PEM, or raw secret for HS*)
    pub verification_key_path: Option<PathBuf>,

    /// JWS algorithms accepted from senders; all from one key family
    pub verification_algorithms: Vec<Algorithm>,

    /// Path to the RSA private key used to decrypt payloads (PEM)
    pub decryption_key_path: Option<PathBuf>,

    /// Maximum accepted request body size in bytes
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            verification_key_path: None,
            verification_algorithms: vec![Algorithm::RS256],
            decryption_key_path: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            port: parse_var("PORT").unwrap_or(defaults.port),

            verification_key_path: parse_path("VERIFICATION_KEY_PATH"),

            verification_algorithms: parse_algorithm_list(
                "VERIFICATION_KEY_ALGORITHMS",
                defaults.verification_algorithms,
            ),

            decryption_key_path: parse_path("DECRYPTION_KEY_PATH"),

            max_body_bytes: parse_var("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
        }
    }
}

/// Parse a variable with `FromStr`, warning when it is set but unparsable.
fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            None
        }
    }
}

/// Parse a non-empty path.
fn parse_path(name: &str) -> Option<PathBuf> {
    env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .map(PathBuf::from)
}

/// Parse a comma-separated list of JWS algorithms like "RS256,PS256".
fn parse_algorithm_list(name: &str, default: Vec<Algorithm>) -> Vec<Algorithm> {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match parse_algorithms(&raw) {
        Ok(algorithms) => algorithms,
        Err(e) => {
            warn!(env_var = name, value = %raw, error = %e, "Invalid algorithm list, using default");
            default
        }
    }
}
