use chrono::Duration;
use tracing::debug;

use crate::claims::{numeric_date, ClaimSet, TokenRequest};
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};
use crate::keys::{SigningContext, VerifyingKey};
use crate::payload::Payload;
use crate::token::{decode_claims, encode_claims};

/// Issue, verify and decode JWTs.
///
/// Symmetric and asymmetric signing share one contract: the key variant in
/// [`SigningContext`] / [`VerifyingKey`] carries the difference.
pub trait JwtRepository {
    /// Assemble the claims described by `request` and sign them.
    fn issue_jwt(&self, ctx: &SigningContext, request: &TokenRequest) -> AuthResult<String>;

    /// `Ok(true)` when the signature is valid and, if `check_expiry` is set,
    /// the token is inside its `nbf`..`exp` window.
    ///
    /// The window is open at both ends: a token is `NotYetValid` while
    /// `now <= nbf` and `Expired` once `now >= exp` (each widened by the
    /// configured clock skew). `nbf` is a whole second, so with zero skew a
    /// token checked in the very millisecond it was issued on a second
    /// boundary is still `NotYetValid`; allow a little skew if that matters.
    fn verify(&self, key: &VerifyingKey, token: &str, check_expiry: bool) -> AuthResult<bool>;

    /// Verify like [`verify`](Self::verify), then decode the payload.
    fn get_payload(
        &self,
        key: &VerifyingKey,
        token: &str,
        check_expiry: bool,
    ) -> AuthResult<Payload>;
}

/// [`JwtRepository`] backed by `jsonwebtoken` signatures.
///
/// ```rust
/// use jwt_issuer::{JwtRepository, SignedJwtRepository, SigningContext, TokenRequest, VerifyingKey};
///
/// # fn main() -> Result<(), jwt_issuer::AuthError> {
/// let repo = SignedJwtRepository::default();
/// let request = TokenRequest::new("alice")
///     .roles_and_permissions("admin,stu", "user:del")
///     .period(60_000);
/// let token = repo.issue_jwt(&SigningContext::hmac("secret", "HS384"), &request)?;
///
/// let payload = repo.get_payload(&VerifyingKey::secret("secret"), &token, true)?;
/// assert_eq!(payload.subject(), Some("alice"));
/// assert!(payload.has_role("admin"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct SignedJwtRepository {
    config: JwtConfig,
}

impl SignedJwtRepository {
    pub fn new(config: JwtConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Sign an already assembled claim set.
    ///
    /// `iat`, `nbf` and `exp` are re-stamped from the configured clock; the
    /// lifetime `exp - iat` of the given claims is kept.
    pub fn issue_claims(&self, ctx: &SigningContext, mut claims: ClaimSet) -> AuthResult<String> {
        let lifetime = claims.lifetime();
        claims.stamp(self.config.clock.now(), lifetime);
        self.sign(ctx, &claims)
    }

    fn sign(&self, ctx: &SigningContext, claims: &ClaimSet) -> AuthResult<String> {
        let signer = ctx.resolve()?;
        let token = encode_claims(claims, &signer, self.config.compress_with.as_deref())?;
        debug!(algorithm = ?signer.algorithm(), jti = ?claims.jti, exp = ?claims.exp, "issued JWT");
        Ok(token)
    }

    fn parse(&self, key: &VerifyingKey, token: &str, check_expiry: bool) -> AuthResult<ClaimSet> {
        let (header, claims) = decode_claims(token, key, self.config.codec_resolver.as_ref())?;
        if check_expiry {
            self.check_window(&claims)?;
        }
        debug!(alg = ?header.alg, jti = ?claims.jti, check_expiry, "verified JWT");
        Ok(claims)
    }

    fn check_window(&self, claims: &ClaimSet) -> AuthResult<()> {
        let now = self.config.clock.now();
        let skew = Duration::from_std(self.config.allowed_clock_skew).unwrap_or(Duration::MAX);
        let not_before = numeric_date("nbf", claims.nbf)?;
        let expiration = numeric_date("exp", claims.exp)?;

        debug!(
            issued_at = ?claims.iat,
            ?not_before,
            ?expiration,
            %now,
            "checking JWT validity window"
        );

        if let Some(not_before) = not_before {
            if now.checked_add_signed(skew).is_some_and(|t| t <= not_before) {
                return Err(AuthError::NotYetValid { not_before });
            }
        }
        if let Some(expired_at) = expiration {
            if now.checked_sub_signed(skew).is_some_and(|t| expired_at <= t) {
                return Err(AuthError::Expired { expired_at });
            }
        }
        Ok(())
    }
}

impl JwtRepository for SignedJwtRepository {
    fn issue_jwt(&self, ctx: &SigningContext, request: &TokenRequest) -> AuthResult<String> {
        let claims = ClaimSet::assemble(request, self.config.clock.now());
        self.sign(ctx, &claims)
    }

    fn verify(&self, key: &VerifyingKey, token: &str, check_expiry: bool) -> AuthResult<bool> {
        self.parse(key, token, check_expiry).map(|_| true)
    }

    fn get_payload(
        &self,
        key: &VerifyingKey,
        token: &str,
        check_expiry: bool,
    ) -> AuthResult<Payload> {
        Payload::from_claims(self.parse(key, token, check_expiry)?)
    }
}
