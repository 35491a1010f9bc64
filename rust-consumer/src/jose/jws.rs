//! Compact JWS signing and verification.
//!
//! Verification is strict about structure and about algorithms: the header
//! algorithm must be one the [`VerificationKey`] was configured for, which
//! rules out algorithm confusion (e.g. an `HS256` header checked against an
//! RSA public key used as an HMAC secret).

use std::str::FromStr;

use jsonwebtoken::{crypto, Algorithm};
use serde_json::json;
use thiserror::Error;

use super::keys::{SigningKey, VerificationKey};
use super::{decode_segment, encode_segment, split_segments, strip_whitespace, ProtectedHeader};

/// Header parameters this implementation does not understand and must not
/// ignore.
const UNSUPPORTED_PARAMS: &[&str] = &["crit", "b64"];

/// Signature verification failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// The input is not a well-formed compact JWS this verifier supports.
    #[error("malformed signed message: {0}")]
    MalformedSignedMessage(&'static str),

    /// Well-formed, but the signature does not verify under the key.
    #[error("invalid signature")]
    SignatureInvalid,
}

/// Signing failure.
#[derive(Debug, Error)]
#[error("unable to sign message: {0}")]
pub struct SigningError(#[from] jsonwebtoken::errors::Error);

/// Verify a compact JWS and return its payload.
///
/// ASCII whitespace anywhere in the input is ignored. The payload is returned
/// unmodified. It is only known to be authentic, not to be meaningful.
pub fn verify(signed_message: &str, key: &VerificationKey) -> Result<String, VerificationError> {
    use VerificationError::{MalformedSignedMessage, SignatureInvalid};

    let stripped = strip_whitespace(signed_message);
    let signed_message: &str = &stripped;
    let [header_b64, payload_b64, signature_b64] = split_segments::<3>(signed_message)
        .ok_or(MalformedSignedMessage("expected three segments"))?;

    let header = ProtectedHeader::decode(header_b64)
        .ok_or(MalformedSignedMessage("header is not a base64url JSON object"))?;
    let payload =
        decode_segment(payload_b64).ok_or(MalformedSignedMessage("payload is not base64url"))?;

    if signature_b64.is_empty() {
        return Err(MalformedSignedMessage("missing signature"));
    }
    if decode_segment(signature_b64).is_none() {
        return Err(MalformedSignedMessage("signature is not base64url"));
    }

    if UNSUPPORTED_PARAMS.iter().any(|p| header.contains(p)) {
        return Err(MalformedSignedMessage("unsupported header parameter"));
    }

    let alg = header
        .str_param("alg")
        .ok_or(MalformedSignedMessage("missing algorithm"))?;
    let algorithm =
        Algorithm::from_str(alg).map_err(|_| MalformedSignedMessage("unsupported algorithm"))?;

    if !key.permits(algorithm) {
        return Err(SignatureInvalid);
    }

    let signing_input = &signed_message[..header_b64.len() + 1 + payload_b64.len()];
    let valid = crypto::verify(
        signature_b64,
        signing_input.as_bytes(),
        key.decoding_key(),
        algorithm,
    )
    .unwrap_or(false);

    if !valid {
        return Err(SignatureInvalid);
    }

    String::from_utf8(payload).map_err(|_| MalformedSignedMessage("payload is not UTF-8"))
}

/// Produce a compact JWS over `payload`.
pub fn sign(payload: &str, key: &SigningKey) -> Result<String, SigningError> {
    let header = json!({ "alg": key.algorithm() });
    let signing_input = format!(
        "{}.{}",
        encode_segment(header.to_string()),
        encode_segment(payload)
    );
    let signature = crypto::sign(signing_input.as_bytes(), key.encoding_key(), key.algorithm())?;

    Ok(format!("{}.{}", signing_input, signature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn hmac_pair() -> (SigningKey, VerificationKey) {
        (
            SigningKey::from_secret(b"webhook-secret", Algorithm::HS256).unwrap(),
            VerificationKey::from_secret(b"webhook-secret", &[Algorithm::HS256]).unwrap(),
        )
    }

    fn compact(header: &str, payload: &str, signature: &str) -> String {
        format!(
            "{}.{}.{}",
            encode_segment(header),
            encode_segment(payload),
            signature
        )
    }

    #[test]
    fn test_sign_then_verify_hmac() {
        let (signing, verification) = hmac_pair();
        let signed = sign("a.b.c.d.e", &signing).unwrap();

        assert_eq!(verify(&signed, &verification).unwrap(), "a.b.c.d.e");
    }

    #[test]
    fn test_sign_then_verify_ec() {
        let signed = sign("payload", &testing::ec_signing_key_a()).unwrap();
        let result = verify(&signed, &testing::ec_verification_key_a());

        assert_eq!(result.unwrap(), "payload");
    }

    #[test]
    fn test_sign_then_verify_rsa() {
        let signed = sign("payload", &testing::rsa_signing_key_a()).unwrap();
        let result = verify(&signed, &testing::rsa_verification_key_a());

        assert_eq!(result.unwrap(), "payload");
    }

    #[test]
    fn test_verify_with_other_key_pair() {
        let signed = sign("payload", &testing::ec_signing_key_a()).unwrap();
        let result = verify(&signed, &testing::ec_verification_key_b());

        assert_eq!(result, Err(VerificationError::SignatureInvalid));
    }

    #[test]
    fn test_verify_empty_input() {
        let (_, verification) = hmac_pair();
        assert!(matches!(
            verify("", &verification),
            Err(VerificationError::MalformedSignedMessage(_))
        ));
    }

    #[test]
    fn test_verify_wrong_segment_count() {
        let (signing, verification) = hmac_pair();
        let signed = sign("payload", &signing).unwrap();

        for input in [
            "a.b".to_string(),
            format!("{}.extra", signed),
            signed.replacen('.', "", 1),
        ] {
            assert!(matches!(
                verify(&input, &verification),
                Err(VerificationError::MalformedSignedMessage(_))
            ));
        }
    }

    #[test]
    fn test_verify_missing_signature() {
        let (_, verification) = hmac_pair();
        let input = compact(r#"{"alg":"HS256"}"#, "payload", "");

        assert_eq!(
            verify(&input, &verification),
            Err(VerificationError::MalformedSignedMessage("missing signature"))
        );
    }

    #[test]
    fn test_verify_rejects_none_algorithm() {
        let (_, verification) = hmac_pair();
        let input = compact(r#"{"alg":"none"}"#, "payload", "c2ln");

        assert_eq!(
            verify(&input, &verification),
            Err(VerificationError::MalformedSignedMessage("unsupported algorithm"))
        );
    }

    #[test]
    fn test_verify_rejects_crit_header() {
        let (_, verification) = hmac_pair();
        let input = compact(r#"{"alg":"HS256","crit":["exp"]}"#, "payload", "c2ln");

        assert_eq!(
            verify(&input, &verification),
            Err(VerificationError::MalformedSignedMessage(
                "unsupported header parameter"
            ))
        );
    }

    #[test]
    fn test_verify_header_not_json() {
        let (_, verification) = hmac_pair();
        let input = compact("HS256", "payload", "c2ln");

        assert!(matches!(
            verify(&input, &verification),
            Err(VerificationError::MalformedSignedMessage(_))
        ));
    }

    #[test]
    fn test_verify_algorithm_not_permitted_for_key() {
        // HS256 header presented to an RSA key: classic algorithm confusion.
        let input = compact(r#"{"alg":"HS256"}"#, "payload", "c2ln");
        let result = verify(&input, &testing::rsa_verification_key_a());

        assert_eq!(result, Err(VerificationError::SignatureInvalid));
    }

    #[test]
    fn test_verify_tampered_payload() {
        let (signing, verification) = hmac_pair();
        let signed = sign("original", &signing).unwrap();
        let [header, _, signature] = split_segments::<3>(&signed).unwrap();
        let tampered = format!("{}.{}.{}", header, encode_segment("tampered"), signature);

        assert_eq!(
            verify(&tampered, &verification),
            Err(VerificationError::SignatureInvalid)
        );
    }

    #[test]
    fn test_verify_tampered_signature() {
        let (signing, verification) = hmac_pair();
        let signed = sign("payload", &signing).unwrap();
        let tampered = testing::flip_segment_char(&signed, 2);

        assert_eq!(
            verify(&tampered, &verification),
            Err(VerificationError::SignatureInvalid)
        );
    }

    #[test]
    fn test_verify_non_utf8_payload() {
        let signing = SigningKey::from_secret(b"webhook-secret", Algorithm::HS256).unwrap();
        let (_, verification) = hmac_pair();

        let signing_input = format!(
            "{}.{}",
            encode_segment(r#"{"alg":"HS256"}"#),
            encode_segment([0xff, 0xfe])
        );
        let signature = crypto::sign(
            signing_input.as_bytes(),
            signing.encoding_key(),
            Algorithm::HS256,
        )
        .unwrap();
        let input = format!("{}.{}", signing_input, signature);

        assert_eq!(
            verify(&input, &verification),
            Err(VerificationError::MalformedSignedMessage("payload is not UTF-8"))
        );
    }

    #[test]
    fn test_verify_ignores_whitespace() {
        let (signing, verification) = hmac_pair();
        let signed = sign("payload", &signing).unwrap();
        let wrapped = format!("{}\r\n", signed.replacen('.', ".\n", 2));

        assert_eq!(verify(&wrapped, &verification).unwrap(), "payload");
    }

    #[test]
    fn test_verify_whitespace_only() {
        let (_, verification) = hmac_pair();
        assert!(matches!(
            verify(" \n", &verification),
            Err(VerificationError::MalformedSignedMessage(_))
        ));
    }

    #[test]
    fn test_verify_signed_with_other_ec_key() {
        let signed = sign("payload", &testing::ec_signing_key_b()).unwrap();
        let result = verify(&signed, &testing::ec_verification_key_a());

        assert_eq!(result, Err(VerificationError::SignatureInvalid));
    }

    #[test]
    fn test_verify_is_deterministic() {
        let (signing, verification) = hmac_pair();
        let signed = sign("payload", &signing).unwrap();

        assert_eq!(verify(&signed, &verification), verify(&signed, &verification));
    }
}
