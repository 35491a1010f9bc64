//! Error taxonomy for the unwrap pipeline.

use std::fmt;

use thiserror::Error;

use crate::jose::{DecryptionError, EncryptionError, SigningError, VerificationError};

/// Failure of [`unwrap_envelope`](super::unwrap_envelope).
///
/// Either stage may fail; a decryption error implies verification succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Decryption(#[from] DecryptionError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Verification(VerificationError::MalformedSignedMessage(_)) => {
                ErrorKind::MalformedSignedMessage
            }
            PipelineError::Verification(VerificationError::SignatureInvalid) => {
                ErrorKind::SignatureInvalid
            }
            PipelineError::Decryption(DecryptionError::MalformedEncryptedMessage(_)) => {
                ErrorKind::MalformedEncryptedMessage
            }
            PipelineError::Decryption(DecryptionError::DecryptionFailed) => {
                ErrorKind::DecryptionFailed
            }
        }
    }
}

/// Flat classification of pipeline failures.
///
/// All kinds are client errors and none is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedSignedMessage,
    SignatureInvalid,
    MalformedEncryptedMessage,
    DecryptionFailed,
}

impl ErrorKind {
    /// Stable identifier used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::MalformedSignedMessage => "malformed_signed_message",
            ErrorKind::SignatureInvalid => "signature_invalid",
            ErrorKind::MalformedEncryptedMessage => "malformed_encrypted_message",
            ErrorKind::DecryptionFailed => "decryption_failed",
        }
    }

    /// Message safe to return to the sender. Carries no detail beyond the kind.
    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::MalformedSignedMessage => "unable to parse signed message",
            ErrorKind::SignatureInvalid => "invalid signature",
            ErrorKind::MalformedEncryptedMessage => "unable to parse encrypted message",
            ErrorKind::DecryptionFailed => "unable to decrypt message",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of [`seal`](super::seal).
#[derive(Debug, Error)]
pub enum SealError {
    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    #[error(transparent)]
    Signing(#[from] SigningError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let cases = [
            (
                PipelineError::from(VerificationError::MalformedSignedMessage("x")),
                ErrorKind::MalformedSignedMessage,
            ),
            (
                PipelineError::from(VerificationError::SignatureInvalid),
                ErrorKind::SignatureInvalid,
            ),
            (
                PipelineError::from(DecryptionError::MalformedEncryptedMessage("x")),
                ErrorKind::MalformedEncryptedMessage,
            ),
            (
                PipelineError::from(DecryptionError::DecryptionFailed),
                ErrorKind::DecryptionFailed,
            ),
        ];

        for (error, kind) in cases {
            assert_eq!(error.kind(), kind);
        }
    }

    #[test]
    fn test_display_is_transparent() {
        let error = PipelineError::from(VerificationError::MalformedSignedMessage(
            "expected three segments",
        ));
        assert_eq!(
            error.to_string(),
            "malformed signed message: expected three segments"
        );
        assert_eq!(ErrorKind::DecryptionFailed.to_string(), "decryption_failed");
    }
}
