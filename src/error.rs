use chrono::{DateTime, Utc};

pub type AuthResult<T> = Result<T, AuthError>;

/// Errors from issuing, verifying or decoding a JWT.
///
/// Verification surfaces exactly one of `Expired`, `NotYetValid`,
/// `IncorrectToken` or `InvalidClaim`; issuance only ever fails with
/// `Signing`.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Token expired at {expired_at}")]
    Expired { expired_at: DateTime<Utc> },

    #[error("Token is not valid before {not_before}")]
    NotYetValid { not_before: DateTime<Utc> },

    #[error("Incorrect token: {0}")]
    IncorrectToken(String),

    #[error("Invalid claim '{0}': {1}")]
    InvalidClaim(&'static str, String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl AuthError {
    /// True for the two temporal failures.
    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::Expired { .. } | Self::NotYetValid { .. })
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        Self::IncorrectToken(value.to_string())
    }
}

impl From<base64::DecodeError> for AuthError {
    fn from(value: base64::DecodeError) -> Self {
        Self::IncorrectToken(format!("invalid base64url segment: {value}"))
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(value: serde_json::Error) -> Self {
        Self::IncorrectToken(format!("malformed JSON: {value}"))
    }
}
