//! # jwt-issuer
//!
//! Issue and verify signed JSON Web Tokens carrying a subject, issuer,
//! audience, roles, permissions and an expiry.  Signing and signature
//! checks are done by [`jsonwebtoken`]; the claims payload is deflated
//! before signing unless compression is switched off.
//!
//! ## Usage
//!
//! ```rust
//! use jwt_issuer::{
//!     AuthError, JwtConfig, JwtRepository, SignedJwtRepository, SigningContext, TokenRequest,
//!     VerifyingKey,
//! };
//!
//! # fn main() -> Result<(), AuthError> {
//! let repo = SignedJwtRepository::new(JwtConfig::new());
//!
//! let request = TokenRequest::new("Jwt test")
//!     .issuer("test1")
//!     .audience("0001")
//!     .roles_and_permissions("admin,stu", "user:del")
//!     .period(1024);
//! let token = repo.issue_jwt(&SigningContext::hmac("123456", "HS384"), &request)?;
//!
//! let key = VerifyingKey::secret("123456");
//! assert!(repo.verify(&key, &token, true)?);
//!
//! let payload = repo.get_payload(&key, &token, false)?;
//! assert_eq!(payload.permissions(), Some("user:del"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Key material
//!
//! | Algorithms                 | [`SigningKey`] / [`VerifyingKey`] variant |
//! |----------------------------|-------------------------------------------|
//! | `HS256` `HS384` `HS512`    | `Secret`                                  |
//! | `RS*`, `PS*`               | `RsaPem` (private / public PEM)           |
//! | `ES256` `ES384` `ES512`    | `EcPem`                                   |
//! | `EdDSA`                    | `EdPem`                                   |
//!
//! An algorithm paired with the wrong kind of key is refused on both sides.
//!
//! ## Environment variables (`JwtConfig::from_env`)
//!
//! | Variable              | Default | Notes                          |
//! |-----------------------|---------|--------------------------------|
//! | `JWT_CLOCK_SKEW_SECS` | `0`     | Allowed clock skew, in seconds |
//! | `JWT_COMPRESSION`     | `DEF`   | `DEF`, `GZIP` or `NONE`        |

pub mod claims;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod keys;
pub mod payload;
pub mod repository;
pub mod token;

pub use claims::{
    tokenize_audience, ClaimSet, CustomClaims, NumericDate, TokenRequest, NO_EXPIRY,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{
    CodecResolver, CompressionCodec, DeflateCodec, DefaultCodecResolver, GzipCodec,
};
pub use config::JwtConfig;
pub use error::{AuthError, AuthResult};
pub use keys::{
    parse_algorithm, JwsAlgorithm, KeyFamily, SigningContext, SigningKey, VerifyingKey,
};
pub use payload::Payload;
pub use repository::{JwtRepository, SignedJwtRepository};
pub use token::generate_jti;
