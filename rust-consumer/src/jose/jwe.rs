//! Compact JWE encryption and decryption.
//!
//! Key management is `RSA-OAEP` or `RSA-OAEP-256`. Content encryption is one of the AES-GCM
//! or AES-CBC + HMAC-SHA2 algorithms from RFC 7518 section 5.
//!
//! Errors are split in two groups:
//! - structural problems found before any key is touched are reported as
//!   [`DecryptionError::MalformedEncryptedMessage`];
//! - everything that depends on the private key (key unwrap, tag check,
//!   padding, plaintext encoding) is reported as the single
//!   [`DecryptionError::DecryptionFailed`].
//!
//! A failed key unwrap is not reported directly. A random content-encryption
//! key is substituted and decryption continues, so the failure shows up at the
//! tag check like any other tampering.

use std::fmt;
use std::str::FromStr;

use aes::{Aes128, Aes192, Aes256};
use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, KeyInit, Nonce, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockCipher, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::RngCore;
use rsa::Oaep;
use serde_json::json;
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};
use thiserror::Error;

use super::keys::{DecryptionKey, EncryptionKey, KeyError};
use super::{decode_segment, encode_segment, split_segments, strip_whitespace, ProtectedHeader};

type Aes192Gcm = AesGcm<Aes192, U12>;

/// Header parameters this implementation does not support.
const UNSUPPORTED_PARAMS: &[&str] = &["zip", "crit"];

/// Decryption failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecryptionError {
    /// The input is not a well-formed compact JWE this decryptor supports.
    #[error("malformed encrypted message: {0}")]
    MalformedEncryptedMessage(&'static str),

    /// Well-formed, but could not be decrypted and authenticated.
    #[error("unable to decrypt message")]
    DecryptionFailed,
}

/// Encryption failure.
#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("unable to wrap content encryption key: {0}")]
    KeyWrap(#[from] rsa::Error),

    #[error("content encryption failed")]
    ContentEncryption,
}

/// Key management algorithm (`alg` header parameter).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyManagement {
    /// RSAES-OAEP with SHA-1 and MGF1-SHA-1.
    RsaOaep,
    /// RSAES-OAEP with SHA-256 and MGF1-SHA-256.
    #[default]
    RsaOaep256,
}

impl KeyManagement {
    pub fn name(self) -> &'static str {
        match self {
            KeyManagement::RsaOaep => "RSA-OAEP",
            KeyManagement::RsaOaep256 => "RSA-OAEP-256",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "RSA-OAEP" => Some(KeyManagement::RsaOaep),
            "RSA-OAEP-256" => Some(KeyManagement::RsaOaep256),
            _ => None,
        }
    }

    fn padding(self) -> Oaep {
        match self {
            KeyManagement::RsaOaep => Oaep::new::<Sha1>(),
            KeyManagement::RsaOaep256 => Oaep::new::<Sha256>(),
        }
    }
}

impl fmt::Display for KeyManagement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KeyManagement {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| KeyError::UnsupportedAlgorithm(s.to_string()))
    }
}

/// Content encryption algorithm (`enc` header parameter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncryption {
    A128Gcm,
    A192Gcm,
    A256Gcm,
    A128CbcHs256,
    A192CbcHs384,
    A256CbcHs512,
}

impl ContentEncryption {
    pub fn name(self) -> &'static str {
        match self {
            ContentEncryption::A128Gcm => "A128GCM",
            ContentEncryption::A192Gcm => "A192GCM",
            ContentEncryption::A256Gcm => "A256GCM",
            ContentEncryption::A128CbcHs256 => "A128CBC-HS256",
            ContentEncryption::A192CbcHs384 => "A192CBC-HS384",
            ContentEncryption::A256CbcHs512 => "A256CBC-HS512",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "A128GCM" => Some(ContentEncryption::A128Gcm),
            "A192GCM" => Some(ContentEncryption::A192Gcm),
            "A256GCM" => Some(ContentEncryption::A256Gcm),
            "A128CBC-HS256" => Some(ContentEncryption::A128CbcHs256),
            "A192CBC-HS384" => Some(ContentEncryption::A192CbcHs384),
            "A256CBC-HS512" => Some(ContentEncryption::A256CbcHs512),
            _ => None,
        }
    }

    /// Content-encryption key length in bytes. For the CBC-HMAC algorithms
    /// this covers both the MAC key and the AES key.
    pub fn key_len(self) -> usize {
        match self {
            ContentEncryption::A128Gcm => 16,
            ContentEncryption::A192Gcm => 24,
            ContentEncryption::A256Gcm | ContentEncryption::A128CbcHs256 => 32,
            ContentEncryption::A192CbcHs384 => 48,
            ContentEncryption::A256CbcHs512 => 64,
        }
    }

    pub fn iv_len(self) -> usize {
        match self {
            ContentEncryption::A128Gcm
            | ContentEncryption::A192Gcm
            | ContentEncryption::A256Gcm => 12,
            _ => 16,
        }
    }

    pub fn tag_len(self) -> usize {
        match self {
            ContentEncryption::A192CbcHs384 => 24,
            ContentEncryption::A256CbcHs512 => 32,
            _ => 16,
        }
    }

    fn open(
        self,
        cek: &[u8],
        iv: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, DecryptionError> {
        match self {
            ContentEncryption::A128Gcm => gcm_open::<Aes128Gcm>(cek, iv, ciphertext, tag, aad),
            ContentEncryption::A192Gcm => gcm_open::<Aes192Gcm>(cek, iv, ciphertext, tag, aad),
            ContentEncryption::A256Gcm => gcm_open::<Aes256Gcm>(cek, iv, ciphertext, tag, aad),
            ContentEncryption::A128CbcHs256 => {
                cbc_hmac_open::<Aes128, Hmac<Sha256>>(cek, iv, ciphertext, tag, aad)
            }
            ContentEncryption::A192CbcHs384 => {
                cbc_hmac_open::<Aes192, Hmac<Sha384>>(cek, iv, ciphertext, tag, aad)
            }
            ContentEncryption::A256CbcHs512 => {
                cbc_hmac_open::<Aes256, Hmac<Sha512>>(cek, iv, ciphertext, tag, aad)
            }
        }
    }

    /// Returns `(ciphertext, tag)`.
    fn seal(
        self,
        cek: &[u8],
        iv: &[u8],
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<(Vec<u8>, Vec<u8>), EncryptionError> {
        match self {
            ContentEncryption::A128Gcm => gcm_seal::<Aes128Gcm>(cek, iv, plaintext, aad),
            ContentEncryption::A192Gcm => gcm_seal::<Aes192Gcm>(cek, iv, plaintext, aad),
            ContentEncryption::A256Gcm => gcm_seal::<Aes256Gcm>(cek, iv, plaintext, aad),
            ContentEncryption::A128CbcHs256 => {
                cbc_hmac_seal::<Aes128, Hmac<Sha256>>(self, cek, iv, plaintext, aad)
            }
            ContentEncryption::A192CbcHs384 => {
                cbc_hmac_seal::<Aes192, Hmac<Sha384>>(self, cek, iv, plaintext, aad)
            }
            ContentEncryption::A256CbcHs512 => {
                cbc_hmac_seal::<Aes256, Hmac<Sha512>>(self, cek, iv, plaintext, aad)
            }
        }
    }
}

impl fmt::Display for ContentEncryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ContentEncryption {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| KeyError::UnsupportedAlgorithm(s.to_string()))
    }
}

// =============================================================================
// Decryption
// =============================================================================

/// A compact JWE that passed every structural check.
struct CompactJwe<'a> {
    aad: &'a str,
    alg: KeyManagement,
    enc: ContentEncryption,
    encrypted_key: Vec<u8>,
    iv: Vec<u8>,
    ciphertext: Vec<u8>,
    tag: Vec<u8>,
}

impl<'a> CompactJwe<'a> {
    fn parse(message: &'a str) -> Result<Self, DecryptionError> {
        use DecryptionError::MalformedEncryptedMessage as Malformed;

        let [header_b64, key_b64, iv_b64, ciphertext_b64, tag_b64] =
            split_segments::<5>(message).ok_or(Malformed("expected five segments"))?;

        let header = ProtectedHeader::decode(header_b64)
            .ok_or(Malformed("header is not a base64url JSON object"))?;

        if UNSUPPORTED_PARAMS.iter().any(|p| header.contains(p)) {
            return Err(Malformed("unsupported header parameter"));
        }
        let alg = header
            .str_param("alg")
            .and_then(KeyManagement::from_name)
            .ok_or(Malformed("unsupported key management algorithm"))?;
        let enc = header
            .str_param("enc")
            .and_then(ContentEncryption::from_name)
            .ok_or(Malformed("unsupported content encryption"))?;

        let encrypted_key =
            decode_segment(key_b64).ok_or(Malformed("encrypted key is not base64url"))?;
        if encrypted_key.is_empty() {
            return Err(Malformed("missing encrypted key"));
        }

        let iv = decode_segment(iv_b64).ok_or(Malformed("iv is not base64url"))?;
        if iv.len() != enc.iv_len() {
            return Err(Malformed("iv has the wrong length"));
        }

        let ciphertext =
            decode_segment(ciphertext_b64).ok_or(Malformed("ciphertext is not base64url"))?;

        let tag = decode_segment(tag_b64).ok_or(Malformed("tag is not base64url"))?;
        if tag.len() != enc.tag_len() {
            return Err(Malformed("tag has the wrong length"));
        }

        Ok(Self {
            aad: header_b64,
            alg,
            enc,
            encrypted_key,
            iv,
            ciphertext,
            tag,
        })
    }
}

/// Decrypt a compact JWE and return its plaintext.
///
/// ASCII whitespace anywhere in the input is ignored.
pub fn decrypt(encrypted_message: &str, key: &DecryptionKey) -> Result<String, DecryptionError> {
    let encrypted_message = strip_whitespace(encrypted_message);
    let jwe = CompactJwe::parse(&encrypted_message)?;

    let cek = unwrap_content_key(key, &jwe.encrypted_key, jwe.alg, jwe.enc);
    let plaintext = jwe
        .enc
        .open(&cek, &jwe.iv, &jwe.ciphertext, &jwe.tag, jwe.aad.as_bytes())?;

    String::from_utf8(plaintext).map_err(|_| DecryptionError::DecryptionFailed)
}

/// Unwrap the content-encryption key, substituting a random key of the right
/// length when unwrapping fails.
fn unwrap_content_key(
    key: &DecryptionKey,
    encrypted_key: &[u8],
    alg: KeyManagement,
    enc: ContentEncryption,
) -> Vec<u8> {
    let mut rng = rand::thread_rng();

    match key
        .rsa()
        .decrypt_blinded(&mut rng, alg.padding(), encrypted_key)
    {
        Ok(cek) if cek.len() == enc.key_len() => cek,
        _ => random_bytes(&mut rng, enc.key_len()),
    }
}

fn random_bytes(rng: &mut impl RngCore, len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rng.fill_bytes(&mut bytes);
    bytes
}

fn gcm_open<C: Aead + KeyInit>(
    cek: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, DecryptionError> {
    let cipher = C::new_from_slice(cek).map_err(|_| DecryptionError::DecryptionFailed)?;

    let mut sealed = Vec::with_capacity(ciphertext.len() + tag.len());
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);

    cipher
        .decrypt(Nonce::<C>::from_slice(iv), Payload { msg: &sealed, aad })
        .map_err(|_| DecryptionError::DecryptionFailed)
}

/// RFC 7518 section 5.2.2.1: the MAC covers AAD, IV, ciphertext and the AAD
/// length in bits as a big-endian u64.
fn cbc_hmac_mac<M: Mac + KeyInit>(
    mac_key: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
    aad: &[u8],
) -> Option<M> {
    let mut mac = <M as Mac>::new_from_slice(mac_key).ok()?;
    mac.update(aad);
    mac.update(iv);
    mac.update(ciphertext);
    mac.update(&((aad.len() as u64) * 8).to_be_bytes());
    Some(mac)
}

fn cbc_hmac_open<C, M>(
    cek: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, DecryptionError>
where
    C: BlockCipher + BlockDecryptMut + KeyInit,
    M: Mac + KeyInit,
{
    let (mac_key, enc_key) = cek.split_at(cek.len() / 2);

    cbc_hmac_mac::<M>(mac_key, iv, ciphertext, aad)
        .ok_or(DecryptionError::DecryptionFailed)?
        .verify_truncated_left(tag)
        .map_err(|_| DecryptionError::DecryptionFailed)?;

    cbc::Decryptor::<C>::new_from_slices(enc_key, iv)
        .map_err(|_| DecryptionError::DecryptionFailed)?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| DecryptionError::DecryptionFailed)
}

// =============================================================================
// Encryption
// =============================================================================

/// Encrypt `plaintext` into a compact JWE for the holder of the matching
/// [`DecryptionKey`]. A fresh content-encryption key and IV are drawn for
/// every message.
pub fn encrypt(plaintext: &str, key: &EncryptionKey) -> Result<String, EncryptionError> {
    let alg = key.key_management();
    let enc = key.content_encryption();
    let mut rng = rand::thread_rng();

    let cek = random_bytes(&mut rng, enc.key_len());
    let iv = random_bytes(&mut rng, enc.iv_len());
    let encrypted_key = key.rsa().encrypt(&mut rng, alg.padding(), &cek)?;

    let header = json!({ "alg": alg.name(), "enc": enc.name() });
    let header_b64 = encode_segment(header.to_string());

    let (ciphertext, tag) = enc.seal(&cek, &iv, plaintext.as_bytes(), header_b64.as_bytes())?;

    Ok([
        header_b64,
        encode_segment(encrypted_key),
        encode_segment(iv),
        encode_segment(ciphertext),
        encode_segment(tag),
    ]
    .join("."))
}

fn gcm_seal<C: Aead + KeyInit>(
    cek: &[u8],
    iv: &[u8],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), EncryptionError> {
    let cipher = C::new_from_slice(cek).map_err(|_| EncryptionError::ContentEncryption)?;

    let mut sealed = cipher
        .encrypt(Nonce::<C>::from_slice(iv), Payload { msg: plaintext, aad })
        .map_err(|_| EncryptionError::ContentEncryption)?;
    let tag = sealed.split_off(sealed.len() - 16);

    Ok((sealed, tag))
}

fn cbc_hmac_seal<C, M>(
    enc: ContentEncryption,
    cek: &[u8],
    iv: &[u8],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), EncryptionError>
where
    C: BlockCipher + BlockEncryptMut + KeyInit,
    M: Mac + KeyInit,
{
    let (mac_key, enc_key) = cek.split_at(cek.len() / 2);

    let ciphertext = cbc::Encryptor::<C>::new_from_slices(enc_key, iv)
        .map_err(|_| EncryptionError::ContentEncryption)?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mac = cbc_hmac_mac::<M>(mac_key, iv, &ciphertext, aad)
        .ok_or(EncryptionError::ContentEncryption)?;
    let tag = mac.finalize().into_bytes()[..enc.tag_len()].to_vec();

    Ok((ciphertext, tag))
}
