//! Compact JWS serialization with an optional compressed payload.
//!
//! Signatures are produced and checked by the key types in [`crate::keys`];
//! this module only frames them as `header.payload.signature`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::claims::ClaimSet;
use crate::codec::{CodecResolver, CompressionCodec};
use crate::error::{AuthError, AuthResult};
use crate::keys::{JwsAlgorithm, TokenSigner, VerifyingKey};

/// Random alphanumeric `jti`.
pub fn generate_jti(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..length)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

/// The JOSE header fields this crate reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoseHeader {
    pub alg: JwsAlgorithm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    /// Compression applied to the payload, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
}

impl JoseHeader {
    pub fn new(alg: JwsAlgorithm) -> Self {
        Self {
            alg,
            typ: Some("JWT".into()),
            zip: None,
        }
    }
}

/// Serialize, optionally compress, and sign `claims`.
pub(crate) fn encode_claims(
    claims: &ClaimSet,
    signer: &TokenSigner,
    codec: Option<&dyn CompressionCodec>,
) -> AuthResult<String> {
    let mut header = JoseHeader::new(signer.algorithm());
    header.zip = codec.map(|c| c.algorithm().to_string());

    let header_json = serde_json::to_vec(&header)
        .map_err(|e| AuthError::Signing(format!("header serialization: {e}")))?;
    let mut payload = serde_json::to_vec(claims)
        .map_err(|e| AuthError::Signing(format!("claims serialization: {e}")))?;
    if let Some(codec) = codec {
        payload = codec
            .compress(&payload)
            .map_err(|e| AuthError::Signing(format!("{} compression: {e}", codec.algorithm())))?;
    }

    let message = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header_json),
        URL_SAFE_NO_PAD.encode(payload)
    );
    let signature = signer.sign(message.as_bytes())?;

    Ok(format!("{message}.{signature}"))
}

/// Check the structure and signature of `token` and return its claims.
///
/// No temporal checks happen here.
pub(crate) fn decode_claims(
    token: &str,
    key: &VerifyingKey,
    resolver: &dyn CodecResolver,
) -> AuthResult<(JoseHeader, ClaimSet)> {
    let token = token.trim();
    let (message, signature) = token
        .rsplit_once('.')
        .ok_or_else(|| malformed("expected three dot-separated segments"))?;
    let (header_b64, payload_b64) = message
        .split_once('.')
        .ok_or_else(|| malformed("expected three dot-separated segments"))?;
    if payload_b64.contains('.') {
        return Err(malformed("expected three dot-separated segments"));
    }

    let header: JoseHeader = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header_b64)?)?;
    if !key.verifier(header.alg)?.verify(signature, message.as_bytes())? {
        return Err(AuthError::IncorrectToken("signature mismatch".into()));
    }

    let mut payload = URL_SAFE_NO_PAD.decode(payload_b64)?;
    if let Some(zip) = header.zip.as_deref() {
        let codec = resolver
            .resolve(zip)
            .ok_or_else(|| AuthError::IncorrectToken(format!("unsupported compression '{zip}'")))?;
        payload = codec.decompress(&payload).map_err(|e| {
            AuthError::IncorrectToken(format!("{} decompression: {e}", codec.algorithm()))
        })?;
    }

    let map: Map<String, Value> = serde_json::from_slice(&payload)?;
    let claims = ClaimSet::try_from(map)?;
    Ok((header, claims))
}

fn malformed(reason: &str) -> AuthError {
    AuthError::IncorrectToken(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{NumericDate, TokenRequest};
    use crate::codec::{DeflateCodec, DefaultCodecResolver, GzipCodec};
    use crate::keys::SigningContext;
    use chrono::{TimeZone, Utc};
    use jsonwebtoken::{decode, Algorithm, DecodingKey, EncodingKey, Validation};

    const SECRET: &[u8] = b"123456";

    fn sample() -> ClaimSet {
        let request = TokenRequest::new("Jwt test")
            .token_id(generate_jti(16))
            .issuer("test")
            .audience("0001")
            .roles_and_permissions("admin,stu", "user:del")
            .period(60_000);
        // Whole-second `now` keeps `exp` an integer for strict JWT libraries.
        let now = Utc.timestamp_opt(Utc::now().timestamp(), 0).unwrap();
        ClaimSet::assemble(&request, now)
    }

    fn encode(claims: &ClaimSet, codec: Option<&dyn CompressionCodec>) -> String {
        let signer = SigningContext::hmac(SECRET, "HS384").resolve().unwrap();
        encode_claims(claims, &signer, codec).unwrap()
    }

    #[test]
    fn jti_has_requested_length() {
        let jti = generate_jti(24);
        assert_eq!(jti.len(), 24);
        assert!(jti.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(generate_jti(24), jti);
    }

    #[test]
    fn compressed_roundtrip() {
        let claims = sample();
        let token = encode(&claims, Some(&DeflateCodec));
        let (header, decoded) =
            decode_claims(&token, &VerifyingKey::secret(SECRET), &DefaultCodecResolver).unwrap();
        assert_eq!(header.zip.as_deref(), Some("DEF"));
        assert_eq!(header.alg, JwsAlgorithm::HS384);
        assert_eq!(decoded, claims);
    }

    #[test]
    fn gzip_roundtrip() {
        let claims = sample();
        let token = encode(&claims, Some(&GzipCodec));
        let (header, decoded) =
            decode_claims(&token, &VerifyingKey::secret(SECRET), &DefaultCodecResolver).unwrap();
        assert_eq!(header.zip.as_deref(), Some("GZIP"));
        assert_eq!(decoded, claims);
    }

    #[test]
    fn uncompressed_tokens_are_standard_jws() {
        let claims = sample();
        let token = encode(&claims, None);

        let mut validation = Validation::new(Algorithm::HS384);
        validation.validate_aud = false;
        let data = decode::<Value>(&token, &DecodingKey::from_secret(SECRET), &validation).unwrap();
        assert_eq!(data.claims["sub"], "Jwt test");
        assert_eq!(data.claims["perms"], "user:del");
    }

    #[test]
    fn foreign_jws_is_readable() {
        let claims = serde_json::json!({ "sub": "42", "exp": 4_000_000_000i64 });
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        let (_, decoded) =
            decode_claims(&token, &VerifyingKey::secret(SECRET), &DefaultCodecResolver).unwrap();
        assert_eq!(decoded.sub.as_deref(), Some("42"));
        assert_eq!(decoded.exp, Some(NumericDate::from_seconds(4_000_000_000)));
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = encode(&sample(), Some(&DeflateCodec));
        let err = decode_claims(&token, &VerifyingKey::secret("other"), &DefaultCodecResolver)
            .unwrap_err();
        assert!(matches!(err, AuthError::IncorrectToken(_)));
    }

    #[test]
    fn tampered_payload_rejected() {
        let token = encode(&sample(), None);
        let forged = URL_SAFE_NO_PAD.encode(br#"{"sub":"admin"}"#);
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = &forged;
        let forged_token = parts.join(".");
        assert!(matches!(
            decode_claims(&forged_token, &VerifyingKey::secret(SECRET), &DefaultCodecResolver),
            Err(AuthError::IncorrectToken(_))
        ));
    }

    #[test]
    fn malformed_structure_rejected() {
        let key = VerifyingKey::secret(SECRET);
        for bad in ["", "abc", "a.b", "a.b.c.d", "!!.??.**"] {
            assert!(
                matches!(
                    decode_claims(bad, &key, &DefaultCodecResolver),
                    Err(AuthError::IncorrectToken(_))
                ),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn unsigned_token_rejected() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"admin"}"#);
        let token = format!("{header}.{payload}.");
        assert!(matches!(
            decode_claims(&token, &VerifyingKey::secret(SECRET), &DefaultCodecResolver),
            Err(AuthError::IncorrectToken(_))
        ));
    }

    #[test]
    fn unknown_zip_rejected() {
        #[derive(Debug)]
        struct NoCodecs;
        impl CodecResolver for NoCodecs {
            fn resolve(&self, _: &str) -> Option<std::sync::Arc<dyn CompressionCodec>> {
                None
            }
        }

        let token = encode(&sample(), Some(&DeflateCodec));
        let err = decode_claims(&token, &VerifyingKey::secret(SECRET), &NoCodecs).unwrap_err();
        assert!(err.to_string().contains("unsupported compression"));
    }
}
