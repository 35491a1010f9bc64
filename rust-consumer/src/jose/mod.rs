//! JOSE compact serialization for signed (JWS) and encrypted (JWE) messages.
//!
//! Only the compact form is handled. Every message is a fixed number of
//! unpadded base64url segments joined by `.`:
//!
//! ```text
//! JWS: header.payload.signature
//! JWE: header.encrypted_key.iv.ciphertext.tag
//! ```
//!
//! Verification and decryption are pure functions of (message, key). Keys are
//! loaded once by [`keys`] and shared read-only afterwards.

pub mod jwe;
pub mod jws;
pub mod keys;

use std::borrow::Cow;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde_json::{Map, Value};

pub use jwe::{
    decrypt, encrypt, ContentEncryption, DecryptionError, EncryptionError, KeyManagement,
};
pub use jws::{sign, verify, SigningError, VerificationError};
pub use keys::{DecryptionKey, EncryptionKey, KeyError, KeyFamily, SigningKey, VerificationKey};

/// Remove ASCII whitespace from a compact message.
///
/// Senders wrap or newline-terminate long messages; whitespace is never part
/// of a base64url segment, so it is dropped before parsing.
pub(crate) fn strip_whitespace(message: &str) -> Cow<'_, str> {
    if message.bytes().any(|b| b.is_ascii_whitespace()) {
        Cow::Owned(
            message
                .chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect(),
        )
    } else {
        Cow::Borrowed(message)
    }
}

/// Split a compact message into exactly `N` segments.
///
/// Returns `None` when the message has fewer or more segments.
pub(crate) fn split_segments<const N: usize>(message: &str) -> Option<[&str; N]> {
    let mut parts = message.split('.');
    let mut segments = [""; N];

    for slot in segments.iter_mut() {
        *slot = parts.next()?;
    }

    if parts.next().is_some() {
        return None;
    }

    Some(segments)
}

/// Decode an unpadded base64url segment.
pub(crate) fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(segment).ok()
}

/// Encode bytes as an unpadded base64url segment.
pub(crate) fn encode_segment(bytes: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decoded protected header of a JWS or JWE.
///
/// Kept as a raw JSON object so that unknown or unsupported parameters can
/// be detected instead of silently dropped.
#[derive(Debug, Clone)]
pub(crate) struct ProtectedHeader(Map<String, Value>);

impl ProtectedHeader {
    /// Decode a header segment. The segment must hold a JSON object.
    pub(crate) fn decode(segment: &str) -> Option<Self> {
        let bytes = decode_segment(segment)?;
        serde_json::from_slice::<Map<String, Value>>(&bytes)
            .ok()
            .map(Self)
    }

    /// A string-valued parameter, or `None` if absent or not a string.
    pub(crate) fn str_param(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }
}
