//! Key material for signing, verification, encryption and decryption.
//!
//! Keys are parsed once at startup from PEM files (or a raw secret for the
//! HMAC family) and never mutated afterwards, so they can be shared across
//! concurrent requests behind an `Arc` without locking.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use thiserror::Error;

use super::jwe::{ContentEncryption, KeyManagement};

/// Errors raised while loading key material.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("no signature algorithms configured")]
    NoAlgorithms,

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("algorithms {0:?} do not share a single key family")]
    MixedFamilies(Vec<Algorithm>),

    #[error("algorithm {algorithm:?} requires a {expected} key")]
    WrongFamily {
        algorithm: Algorithm,
        expected: KeyFamily,
    },

    #[error("HMAC secret is empty")]
    EmptySecret,

    #[error("invalid {family} key: {reason}")]
    InvalidKey { family: KeyFamily, reason: String },

    #[error("failed to read key file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Family of key material a JWS algorithm operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Hmac,
    Rsa,
    Ec,
    Ed,
}

impl KeyFamily {
    pub fn of(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => KeyFamily::Hmac,
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => KeyFamily::Rsa,
            Algorithm::ES256 | Algorithm::ES384 => KeyFamily::Ec,
            Algorithm::EdDSA => KeyFamily::Ed,
        }
    }

    /// The single family shared by all `algorithms`.
    fn shared_by(algorithms: &[Algorithm]) -> Result<Self, KeyError> {
        let first = algorithms.first().ok_or(KeyError::NoAlgorithms)?;
        let family = KeyFamily::of(*first);

        if algorithms.iter().any(|a| KeyFamily::of(*a) != family) {
            return Err(KeyError::MixedFamilies(algorithms.to_vec()));
        }

        Ok(family)
    }
}

impl fmt::Display for KeyFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyFamily::Hmac => "HMAC",
            KeyFamily::Rsa => "RSA",
            KeyFamily::Ec => "EC",
            KeyFamily::Ed => "Ed25519",
        };
        f.write_str(name)
    }
}

/// Parse a comma-separated list of JWS algorithm names such as `"RS256,PS256"`.
pub fn parse_algorithms(raw: &str) -> Result<Vec<Algorithm>, KeyError> {
    let algorithms = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|name| {
            Algorithm::from_str(name).map_err(|_| KeyError::UnsupportedAlgorithm(name.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if algorithms.is_empty() {
        return Err(KeyError::NoAlgorithms);
    }

    Ok(algorithms)
}

fn read_file(path: &Path) -> Result<Vec<u8>, KeyError> {
    fs::read(path).map_err(|source| KeyError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Raw HMAC secrets are commonly stored with a trailing newline.
fn trim_secret(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    &bytes[..end]
}

fn invalid(family: KeyFamily, err: impl fmt::Display) -> KeyError {
    KeyError::InvalidKey {
        family,
        reason: err.to_string(),
    }
}

// =============================================================================
// Verification / Signing (JWS)
// =============================================================================

/// Key used to check JWS signatures.
///
/// Bound to an explicit list of algorithms from one key family; a message
/// whose header names any other algorithm is rejected before the signature
/// is looked at. Never used for decryption.
#[derive(Clone)]
pub struct VerificationKey {
    key: DecodingKey,
    family: KeyFamily,
    algorithms: Vec<Algorithm>,
}

impl VerificationKey {
    /// HMAC verification key from a shared secret.
    pub fn from_secret(secret: &[u8], algorithms: &[Algorithm]) -> Result<Self, KeyError> {
        let family = KeyFamily::shared_by(algorithms)?;
        if family != KeyFamily::Hmac {
            return Err(KeyError::WrongFamily {
                algorithm: algorithms[0],
                expected: KeyFamily::Hmac,
            });
        }
        if secret.is_empty() {
            return Err(KeyError::EmptySecret);
        }

        Ok(Self {
            key: DecodingKey::from_secret(secret),
            family,
            algorithms: algorithms.to_vec(),
        })
    }

    /// Public key verification key from a PEM document.
    pub fn from_pem(pem: &[u8], algorithms: &[Algorithm]) -> Result<Self, KeyError> {
        let family = KeyFamily::shared_by(algorithms)?;
        let key = match family {
            KeyFamily::Rsa => DecodingKey::from_rsa_pem(pem),
            KeyFamily::Ec => DecodingKey::from_ec_pem(pem),
            KeyFamily::Ed => DecodingKey::from_ed_pem(pem),
            KeyFamily::Hmac => {
                return Err(KeyError::WrongFamily {
                    algorithm: algorithms[0],
                    expected: KeyFamily::Rsa,
                })
            }
        }
        .map_err(|e| invalid(family, e))?;

        Ok(Self {
            key,
            family,
            algorithms: algorithms.to_vec(),
        })
    }

    /// Load from a file: a raw secret for HMAC algorithms, PEM otherwise.
    pub fn load(path: &Path, algorithms: &[Algorithm]) -> Result<Self, KeyError> {
        let bytes = read_file(path)?;
        match KeyFamily::shared_by(algorithms)? {
            KeyFamily::Hmac => Self::from_secret(trim_secret(&bytes), algorithms),
            _ => Self::from_pem(&bytes, algorithms),
        }
    }

    pub fn permits(&self, algorithm: Algorithm) -> bool {
        self.algorithms.contains(&algorithm)
    }

    pub fn family(&self) -> KeyFamily {
        self.family
    }

    pub fn algorithms(&self) -> &[Algorithm] {
        &self.algorithms
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("family", &self.family)
            .field("algorithms", &self.algorithms)
            .finish_non_exhaustive()
    }
}

/// Key used to produce JWS signatures with one fixed algorithm.
#[derive(Clone)]
pub struct SigningKey {
    key: EncodingKey,
    algorithm: Algorithm,
}

impl SigningKey {
    pub fn from_secret(secret: &[u8], algorithm: Algorithm) -> Result<Self, KeyError> {
        if KeyFamily::of(algorithm) != KeyFamily::Hmac {
            return Err(KeyError::WrongFamily {
                algorithm,
                expected: KeyFamily::Hmac,
            });
        }
        if secret.is_empty() {
            return Err(KeyError::EmptySecret);
        }

        Ok(Self {
            key: EncodingKey::from_secret(secret),
            algorithm,
        })
    }

    pub fn from_pem(pem: &[u8], algorithm: Algorithm) -> Result<Self, KeyError> {
        let family = KeyFamily::of(algorithm);
        let key = match family {
            KeyFamily::Rsa => EncodingKey::from_rsa_pem(pem),
            KeyFamily::Ec => EncodingKey::from_ec_pem(pem),
            KeyFamily::Ed => EncodingKey::from_ed_pem(pem),
            KeyFamily::Hmac => {
                return Err(KeyError::WrongFamily {
                    algorithm,
                    expected: KeyFamily::Rsa,
                })
            }
        }
        .map_err(|e| invalid(family, e))?;

        Ok(Self { key, algorithm })
    }

    pub fn load(path: &Path, algorithm: Algorithm) -> Result<Self, KeyError> {
        let bytes = read_file(path)?;
        match KeyFamily::of(algorithm) {
            KeyFamily::Hmac => Self::from_secret(trim_secret(&bytes), algorithm),
            _ => Self::from_pem(&bytes, algorithm),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.key
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Decryption / Encryption (JWE)
// =============================================================================

/// RSA private key used to unwrap JWE content-encryption keys.
///
/// Never used to verify signatures.
#[derive(Clone)]
pub struct DecryptionKey {
    key: RsaPrivateKey,
}

impl DecryptionKey {
    /// Parse a PKCS#8 (`PRIVATE KEY`) or PKCS#1 (`RSA PRIVATE KEY`) PEM document.
    pub fn from_pem(pem: &str) -> Result<Self, KeyError> {
        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| invalid(KeyFamily::Rsa, e))?;

        Ok(Self { key })
    }

    pub fn load(path: &Path) -> Result<Self, KeyError> {
        let bytes = read_file(path)?;
        let pem = String::from_utf8(bytes).map_err(|e| invalid(KeyFamily::Rsa, e))?;
        Self::from_pem(&pem)
    }

    /// The matching encryption key, for producing test envelopes.
    pub fn encryption_key(&self, content: ContentEncryption) -> EncryptionKey {
        EncryptionKey {
            key: self.key.to_public_key(),
            management: KeyManagement::default(),
            content,
        }
    }

    /// Modulus size in bytes.
    pub fn size(&self) -> usize {
        self.key.size()
    }

    pub(crate) fn rsa(&self) -> &RsaPrivateKey {
        &self.key
    }
}

impl fmt::Debug for DecryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptionKey")
            .field("bits", &(self.key.size() * 8))
            .finish_non_exhaustive()
    }
}

/// RSA public key plus the key management and content encryption used when
/// sealing. Key management defaults to `RSA-OAEP-256`.
#[derive(Debug, Clone)]
pub struct EncryptionKey {
    key: RsaPublicKey,
    management: KeyManagement,
    content: ContentEncryption,
}

impl EncryptionKey {
    /// Parse an SPKI (`PUBLIC KEY`) or PKCS#1 (`RSA PUBLIC KEY`) PEM document.
    pub fn from_pem(pem: &str, content: ContentEncryption) -> Result<Self, KeyError> {
        let key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|e| invalid(KeyFamily::Rsa, e))?;

        Ok(Self {
            key,
            management: KeyManagement::default(),
            content,
        })
    }

    pub fn load(path: &Path, content: ContentEncryption) -> Result<Self, KeyError> {
        let bytes = read_file(path)?;
        let pem = String::from_utf8(bytes).map_err(|e| invalid(KeyFamily::Rsa, e))?;
        Self::from_pem(&pem, content)
    }

    pub fn with_key_management(mut self, management: KeyManagement) -> Self {
        self.management = management;
        self
    }

    pub fn key_management(&self) -> KeyManagement {
        self.management
    }

    pub fn content_encryption(&self) -> ContentEncryption {
        self.content
    }

    pub(crate) fn rsa(&self) -> &RsaPublicKey {
        &self.key
    }
}
