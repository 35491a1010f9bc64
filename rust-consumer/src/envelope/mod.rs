//! Notification envelope unwrapping.
//!
//! An envelope is a compact JWS whose payload is a compact JWE:
//!
//! ```text
//! envelope ──verify──► JWE string ──decrypt──► plaintext
//! ```
//!
//! Verification always runs first and must succeed before any decryption
//! work is done. The verified payload is used only as decryptor input.

pub mod error;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::jose::{
    self, DecryptionError, DecryptionKey, EncryptionKey, SigningKey, VerificationError,
    VerificationKey,
};

pub use error::{ErrorKind, PipelineError, SealError};

/// First pipeline stage: signature verification.
pub trait Verify {
    fn verify(&self, signed_message: &str) -> Result<String, VerificationError>;
}

/// Second pipeline stage: decryption.
pub trait Decrypt {
    fn decrypt(&self, encrypted_message: &str) -> Result<String, DecryptionError>;
}

impl Verify for VerificationKey {
    fn verify(&self, signed_message: &str) -> Result<String, VerificationError> {
        jose::verify(signed_message, self)
    }
}

impl Decrypt for DecryptionKey {
    fn decrypt(&self, encrypted_message: &str) -> Result<String, DecryptionError> {
        jose::decrypt(encrypted_message, self)
    }
}

/// Verify `envelope`, then decrypt its payload.
///
/// Stops at the first failing stage; the decryptor is never called when
/// verification fails.
pub fn unwrap_envelope<V, D>(
    envelope: &str,
    verifier: &V,
    decryptor: &D,
) -> Result<String, PipelineError>
where
    V: Verify + ?Sized,
    D: Decrypt + ?Sized,
{
    let encrypted = verifier.verify(envelope)?;
    let plaintext = decryptor.decrypt(&encrypted)?;
    Ok(plaintext)
}

/// Build an envelope: encrypt `plaintext`, then sign the resulting JWE.
pub fn seal(
    plaintext: &str,
    signing_key: &SigningKey,
    encryption_key: &EncryptionKey,
) -> Result<String, SealError> {
    let encrypted = jose::encrypt(plaintext, encryption_key)?;
    let envelope = jose::sign(&encrypted, signing_key)?;
    Ok(envelope)
}

/// Short SHA-256 fingerprint identifying an envelope in logs.
pub fn fingerprint(envelope: &str) -> String {
    let digest = Sha256::digest(envelope.as_bytes());
    hex::encode(&digest[..8])
}

/// A verifier and a decryptor bundled for reuse across requests.
///
/// Holds no mutable state; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct EnvelopeOpener<V = VerificationKey, D = DecryptionKey> {
    verifier: V,
    decryptor: D,
}

impl<V: Verify, D: Decrypt> EnvelopeOpener<V, D> {
    pub fn new(verifier: V, decryptor: D) -> Self {
        Self {
            verifier,
            decryptor,
        }
    }

    /// Unwrap an envelope, logging the outcome.
    pub fn open(&self, envelope: &str) -> Result<String, PipelineError> {
        let fingerprint = fingerprint(envelope);

        match unwrap_envelope(envelope, &self.verifier, &self.decryptor) {
            Ok(plaintext) => {
                debug!(
                    fingerprint = %fingerprint,
                    envelope_length = envelope.len(),
                    plaintext_length = plaintext.len(),
                    "envelope_opened"
                );
                Ok(plaintext)
            }
            Err(e) => {
                warn!(
                    fingerprint = %fingerprint,
                    envelope_length = envelope.len(),
                    kind = %e.kind(),
                    error = %e,
                    "envelope_rejected"
                );
                Err(e)
            }
        }
    }
}
