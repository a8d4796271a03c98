use std::fmt;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use jsonwebtoken::{crypto, Algorithm, DecodingKey, EncodingKey};
use p521::ecdsa::signature::{Signer, Verifier};
use p521::pkcs8::{DecodePrivateKey, DecodePublicKey};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Which kind of key material an algorithm needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Hmac,
    Rsa,
    Ec,
    Ed,
}

impl KeyFamily {
    pub fn of(algorithm: JwsAlgorithm) -> Self {
        use JwsAlgorithm::*;
        match algorithm {
            HS256 | HS384 | HS512 => Self::Hmac,
            RS256 | RS384 | RS512 | PS256 | PS384 | PS512 => Self::Rsa,
            ES256 | ES384 | ES512 => Self::Ec,
            EdDSA => Self::Ed,
        }
    }
}

/// JWS signature algorithms, named as they appear in the `alg` header.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JwsAlgorithm {
    HS256,
    HS384,
    HS512,
    RS256,
    RS384,
    RS512,
    PS256,
    PS384,
    PS512,
    ES256,
    ES384,
    ES512,
    EdDSA,
}

impl JwsAlgorithm {
    pub fn family(self) -> KeyFamily {
        KeyFamily::of(self)
    }

    /// The `jsonwebtoken` equivalent. `ES512` has none and is signed with
    /// `p521` instead.
    fn backend(self) -> Option<Algorithm> {
        use JwsAlgorithm::*;
        let algorithm = match self {
            HS256 => Algorithm::HS256,
            HS384 => Algorithm::HS384,
            HS512 => Algorithm::HS512,
            RS256 => Algorithm::RS256,
            RS384 => Algorithm::RS384,
            RS512 => Algorithm::RS512,
            PS256 => Algorithm::PS256,
            PS384 => Algorithm::PS384,
            PS512 => Algorithm::PS512,
            ES256 => Algorithm::ES256,
            ES384 => Algorithm::ES384,
            EdDSA => Algorithm::EdDSA,
            ES512 => return None,
        };
        Some(algorithm)
    }
}

/// Resolve a JWS algorithm name, ignoring case.
pub fn parse_algorithm(name: &str) -> Option<JwsAlgorithm> {
    use JwsAlgorithm::*;
    let algorithm = match name.trim().to_ascii_uppercase().as_str() {
        "HS256" => HS256,
        "HS384" => HS384,
        "HS512" => HS512,
        "RS256" => RS256,
        "RS384" => RS384,
        "RS512" => RS512,
        "PS256" => PS256,
        "PS384" => PS384,
        "PS512" => PS512,
        "ES256" => ES256,
        "ES384" => ES384,
        "ES512" => ES512,
        "EDDSA" => EdDSA,
        _ => return None,
    };
    Some(algorithm)
}

/// Key material used to sign a token.
///
/// Asymmetric variants hold PEM-encoded private keys (PKCS#8, or PKCS#1
/// for RSA).
#[derive(Clone)]
pub enum SigningKey {
    Secret(Vec<u8>),
    RsaPem(Vec<u8>),
    EcPem(Vec<u8>),
    EdPem(Vec<u8>),
}

impl SigningKey {
    pub fn secret(secret: impl AsRef<[u8]>) -> Self {
        Self::Secret(secret.as_ref().to_vec())
    }

    /// Shared secret given as standard base64.
    pub fn from_base64_secret(encoded: &str) -> AuthResult<Self> {
        decode_base64_secret(encoded).map(Self::Secret)
    }

    pub fn family(&self) -> KeyFamily {
        match self {
            Self::Secret(_) => KeyFamily::Hmac,
            Self::RsaPem(_) => KeyFamily::Rsa,
            Self::EcPem(_) => KeyFamily::Ec,
            Self::EdPem(_) => KeyFamily::Ed,
        }
    }

    pub(crate) fn signer(&self, algorithm: JwsAlgorithm) -> AuthResult<TokenSigner> {
        if algorithm.family() != self.family() {
            return Err(AuthError::Signing(format!(
                "{algorithm:?} cannot sign with a {:?} key",
                self.family()
            )));
        }
        let unusable = |e: String| AuthError::Signing(format!("unusable signing key: {e}"));

        let key = match (self, algorithm.backend()) {
            (Self::EcPem(pem), None) => SignerKey::P521(p521_signing_key(pem).map_err(unusable)?),
            (_, None) => return Err(unusable(format!("no signer for {algorithm:?}"))),
            (key, Some(backend)) => {
                let encoding = match key {
                    Self::Secret(secret) => Ok(EncodingKey::from_secret(secret)),
                    Self::RsaPem(pem) => EncodingKey::from_rsa_pem(pem),
                    Self::EcPem(pem) => EncodingKey::from_ec_pem(pem),
                    Self::EdPem(pem) => EncodingKey::from_ed_pem(pem),
                };
                SignerKey::Backend(backend, encoding.map_err(|e| unusable(e.to_string()))?)
            }
        };
        Ok(TokenSigner { algorithm, key })
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey::{:?}(..)", self.family())
    }
}

/// Key material used to check a token's signature: the shared secret, or
/// the PEM-encoded public half of the signing key pair.
#[derive(Clone)]
pub enum VerifyingKey {
    Secret(Vec<u8>),
    RsaPem(Vec<u8>),
    EcPem(Vec<u8>),
    EdPem(Vec<u8>),
}

impl VerifyingKey {
    pub fn secret(secret: impl AsRef<[u8]>) -> Self {
        Self::Secret(secret.as_ref().to_vec())
    }

    pub fn from_base64_secret(encoded: &str) -> AuthResult<Self> {
        decode_base64_secret(encoded).map(Self::Secret)
    }

    pub fn family(&self) -> KeyFamily {
        match self {
            Self::Secret(_) => KeyFamily::Hmac,
            Self::RsaPem(_) => KeyFamily::Rsa,
            Self::EcPem(_) => KeyFamily::Ec,
            Self::EdPem(_) => KeyFamily::Ed,
        }
    }

    /// Refuses any algorithm outside the key's family, so an RSA public key
    /// can never be replayed as an HMAC secret.
    pub(crate) fn verifier(&self, algorithm: JwsAlgorithm) -> AuthResult<TokenVerifier> {
        if algorithm.family() != self.family() {
            return Err(AuthError::IncorrectToken(format!(
                "token algorithm {algorithm:?} does not match a {:?} key",
                self.family()
            )));
        }
        let unusable =
            |e: String| AuthError::IncorrectToken(format!("unusable verification key: {e}"));

        let key = match (self, algorithm.backend()) {
            (Self::EcPem(pem), None) => {
                VerifierKey::P521(p521_verifying_key(pem).map_err(unusable)?)
            }
            (_, None) => return Err(unusable(format!("no verifier for {algorithm:?}"))),
            (key, Some(backend)) => {
                let decoding = match key {
                    Self::Secret(secret) => Ok(DecodingKey::from_secret(secret)),
                    Self::RsaPem(pem) => DecodingKey::from_rsa_pem(pem),
                    Self::EcPem(pem) => DecodingKey::from_ec_pem(pem),
                    Self::EdPem(pem) => DecodingKey::from_ed_pem(pem),
                };
                VerifierKey::Backend(backend, decoding.map_err(|e| unusable(e.to_string()))?)
            }
        };
        Ok(TokenVerifier { key })
    }
}

impl fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerifyingKey::{:?}(..)", self.family())
    }
}

/// A signing key paired with the name of the algorithm to sign with.
#[derive(Debug, Clone)]
pub struct SigningContext {
    pub key: SigningKey,
    pub algorithm: String,
}

impl SigningContext {
    pub fn new(key: SigningKey, algorithm: impl Into<String>) -> Self {
        Self {
            key,
            algorithm: algorithm.into(),
        }
    }

    /// HMAC signing with a shared secret.
    pub fn hmac(secret: impl AsRef<[u8]>, algorithm: impl Into<String>) -> Self {
        Self::new(SigningKey::secret(secret), algorithm)
    }

    pub(crate) fn resolve(&self) -> AuthResult<TokenSigner> {
        let algorithm = parse_algorithm(&self.algorithm).ok_or_else(|| {
            AuthError::Signing(format!("unsupported algorithm '{}'", self.algorithm))
        })?;
        self.key.signer(algorithm)
    }
}

enum SignerKey {
    Backend(Algorithm, EncodingKey),
    P521(p521::ecdsa::SigningKey),
}

/// A key ready to sign with one algorithm.
pub(crate) struct TokenSigner {
    algorithm: JwsAlgorithm,
    key: SignerKey,
}

impl TokenSigner {
    pub(crate) fn algorithm(&self) -> JwsAlgorithm {
        self.algorithm
    }

    /// Base64url signature over `message`.
    pub(crate) fn sign(&self, message: &[u8]) -> AuthResult<String> {
        match &self.key {
            SignerKey::Backend(algorithm, key) => crypto::sign(message, key, *algorithm)
                .map_err(|e| AuthError::Signing(e.to_string())),
            SignerKey::P521(key) => {
                let signature: p521::ecdsa::Signature = key
                    .try_sign(message)
                    .map_err(|e| AuthError::Signing(e.to_string()))?;
                Ok(URL_SAFE_NO_PAD.encode(signature.to_bytes()))
            }
        }
    }
}

enum VerifierKey {
    Backend(Algorithm, DecodingKey),
    P521(p521::ecdsa::VerifyingKey),
}

/// A key ready to check signatures of one algorithm.
pub(crate) struct TokenVerifier {
    key: VerifierKey,
}

impl TokenVerifier {
    /// `Ok(false)` when the signature does not match; `Err` when it cannot
    /// even be decoded.
    pub(crate) fn verify(&self, signature: &str, message: &[u8]) -> AuthResult<bool> {
        match &self.key {
            VerifierKey::Backend(algorithm, key) => {
                Ok(crypto::verify(signature, message, key, *algorithm)?)
            }
            VerifierKey::P521(key) => {
                let raw = URL_SAFE_NO_PAD.decode(signature)?;
                let signature = p521::ecdsa::Signature::from_slice(&raw)
                    .map_err(|e| AuthError::IncorrectToken(format!("malformed ES512 signature: {e}")))?;
                Ok(key.verify(message, &signature).is_ok())
            }
        }
    }
}

// PKCS#8 first, SEC1 ("EC PRIVATE KEY") as a fallback.
fn p521_signing_key(pem: &[u8]) -> Result<p521::ecdsa::SigningKey, String> {
    let pem = std::str::from_utf8(pem).map_err(|e| e.to_string())?;
    let secret = match p521::SecretKey::from_pkcs8_pem(pem) {
        Ok(secret) => secret,
        Err(_) => p521::SecretKey::from_sec1_pem(pem)
            .map_err(|e| format!("not a P-521 private key: {e}"))?,
    };
    p521::ecdsa::SigningKey::from_bytes(&secret.to_bytes()).map_err(|e| e.to_string())
}

fn p521_verifying_key(pem: &[u8]) -> Result<p521::ecdsa::VerifyingKey, String> {
    let pem = std::str::from_utf8(pem).map_err(|e| e.to_string())?;
    let public = p521::PublicKey::from_public_key_pem(pem)
        .map_err(|e| format!("not a P-521 public key: {e}"))?;
    p521::ecdsa::VerifyingKey::from_sec1_bytes(&public.to_sec1_bytes()).map_err(|e| e.to_string())
}

fn decode_base64_secret(encoded: &str) -> AuthResult<Vec<u8>> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| AuthError::Config(format!("secret is not valid base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_names_are_case_insensitive() {
        assert_eq!(parse_algorithm("hs384"), Some(JwsAlgorithm::HS384));
        assert_eq!(parse_algorithm(" PS512 "), Some(JwsAlgorithm::PS512));
        assert_eq!(parse_algorithm("EdDSA"), Some(JwsAlgorithm::EdDSA));
        assert_eq!(parse_algorithm("es512"), Some(JwsAlgorithm::ES512));
    }

    #[test]
    fn unknown_algorithms_rejected() {
        assert_eq!(parse_algorithm("none"), None);
        assert_eq!(parse_algorithm("ES521"), None);
        assert_eq!(parse_algorithm(""), None);
    }

    #[test]
    fn hmac_algorithm_refuses_asymmetric_key() {
        let ctx = SigningContext::new(SigningKey::RsaPem(b"irrelevant".to_vec()), "HS256");
        assert!(matches!(ctx.resolve(), Err(AuthError::Signing(_))));
    }

    #[test]
    fn rsa_algorithm_refuses_secret() {
        let ctx = SigningContext::hmac("secret", "RS256");
        assert!(matches!(ctx.resolve(), Err(AuthError::Signing(_))));
    }

    #[test]
    fn garbage_pem_is_a_signing_error() {
        let ctx = SigningContext::new(SigningKey::RsaPem(b"not a pem".to_vec()), "RS256");
        assert!(matches!(ctx.resolve(), Err(AuthError::Signing(_))));
    }

    #[test]
    fn base64_secret_decodes() {
        // "123456" in standard base64
        let key = SigningKey::from_base64_secret("MTIzNDU2").unwrap();
        assert!(matches!(key, SigningKey::Secret(ref s) if s == b"123456"));
        assert!(matches!(
            VerifyingKey::from_base64_secret("***"),
            Err(AuthError::Config(_))
        ));
    }

    #[test]
    fn debug_does_not_leak_material() {
        let rendered = format!("{:?}", SigningKey::secret("top-secret"));
        assert!(!rendered.contains("top-secret"));
    }

    #[test]
    fn verifying_key_refuses_foreign_family() {
        let key = VerifyingKey::secret("secret");
        assert!(matches!(
            key.verifier(JwsAlgorithm::RS256),
            Err(AuthError::IncorrectToken(_))
        ));
        assert!(key.verifier(JwsAlgorithm::HS512).is_ok());
    }

    #[test]
    fn es512_needs_a_p521_key() {
        let ctx = SigningContext::new(SigningKey::EcPem(b"not a pem".to_vec()), "ES512");
        assert!(matches!(ctx.resolve(), Err(AuthError::Signing(_))));
        assert!(matches!(
            VerifyingKey::EcPem(b"not a pem".to_vec()).verifier(JwsAlgorithm::ES512),
            Err(AuthError::IncorrectToken(_))
        ));
    }

    #[test]
    fn algorithm_names_match_the_alg_header() {
        assert_eq!(serde_json::to_value(JwsAlgorithm::ES512).unwrap(), "ES512");
        assert_eq!(serde_json::to_value(JwsAlgorithm::EdDSA).unwrap(), "EdDSA");
        let parsed: JwsAlgorithm = serde_json::from_str(r#""PS384""#).unwrap();
        assert_eq!(parsed, JwsAlgorithm::PS384);
    }
}
