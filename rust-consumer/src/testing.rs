//! Key fixtures and helpers shared by unit tests.

use std::sync::OnceLock;

use jsonwebtoken::Algorithm;

use crate::jose::{DecryptionKey, SigningKey, VerificationKey};

pub const RSA_A_PRIVATE: &str = include_str!("../testdata/rsa_a.pem");
pub const RSA_A_PUBLIC: &str = include_str!("../testdata/rsa_a_pub.pem");
pub const RSA_B_PRIVATE: &str = include_str!("../testdata/rsa_b.pem");
pub const RSA_B_PRIVATE_PKCS1: &str = include_str!("../testdata/rsa_b_pkcs1.pem");
pub const EC_A_PRIVATE: &str = include_str!("../testdata/ec_a.pem");
pub const EC_A_PUBLIC: &str = include_str!("../testdata/ec_a_pub.pem");
pub const EC_B_PRIVATE: &str = include_str!("../testdata/ec_b.pem");
pub const EC_B_PUBLIC: &str = include_str!("../testdata/ec_b_pub.pem");

pub fn ec_signing_key_a() -> SigningKey {
    SigningKey::from_pem(EC_A_PRIVATE.as_bytes(), Algorithm::ES256).unwrap()
}

pub fn ec_verification_key_a() -> VerificationKey {
    VerificationKey::from_pem(EC_A_PUBLIC.as_bytes(), &[Algorithm::ES256]).unwrap()
}

pub fn ec_signing_key_b() -> SigningKey {
    SigningKey::from_pem(EC_B_PRIVATE.as_bytes(), Algorithm::ES256).unwrap()
}

pub fn ec_verification_key_b() -> VerificationKey {
    VerificationKey::from_pem(EC_B_PUBLIC.as_bytes(), &[Algorithm::ES256]).unwrap()
}

pub fn rsa_signing_key_a() -> SigningKey {
    SigningKey::from_pem(RSA_A_PRIVATE.as_bytes(), Algorithm::RS256).unwrap()
}

pub fn rsa_verification_key_a() -> VerificationKey {
    VerificationKey::from_pem(RSA_A_PUBLIC.as_bytes(), &[Algorithm::RS256]).unwrap()
}

/// RSA key B, the recipient key for envelopes built in tests.
pub fn decryption_key() -> DecryptionKey {
    static KEY: OnceLock<DecryptionKey> = OnceLock::new();
    KEY.get_or_init(|| DecryptionKey::from_pem(RSA_B_PRIVATE).unwrap())
        .clone()
}

/// RSA key A, used as a mismatched recipient key.
pub fn other_decryption_key() -> DecryptionKey {
    static KEY: OnceLock<DecryptionKey> = OnceLock::new();
    KEY.get_or_init(|| DecryptionKey::from_pem(RSA_A_PRIVATE).unwrap())
        .clone()
}

/// Replace the middle character of segment `index` with a different
/// base64url character. The segment length is unchanged, so the message
/// still parses.
pub fn flip_segment_char(message: &str, index: usize) -> String {
    let mut segments: Vec<String> = message.split('.').map(str::to_string).collect();
    let segment = &mut segments[index];

    let mid = segment.len() / 2;
    let current = segment.as_bytes()[mid];
    let replacement = if current == b'A' { "B" } else { "A" };
    segment.replace_range(mid..mid + 1, replacement);

    segments.join(".")
}
