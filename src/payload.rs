use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::claims::{numeric_date, tokenize_audience, ClaimSet, PERMISSIONS_CLAIM, ROLES_CLAIM};
use crate::error::{AuthError, AuthResult};

/// The decoded contents of a verified token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payload {
    token_id: Option<String>,
    subject: Option<String>,
    issuer: Option<String>,
    audience: BTreeSet<String>,
    issued_at: Option<DateTime<Utc>>,
    not_before: Option<DateTime<Utc>>,
    expiration: Option<DateTime<Utc>>,
    claims: Map<String, Value>,
}

impl Payload {
    /// Copy the registered fields across and pass the custom claims through
    /// untouched.  Fails only when a timestamp is outside chrono's range.
    pub fn from_claims(claims: ClaimSet) -> AuthResult<Self> {
        Ok(Self {
            token_id: claims.jti,
            subject: claims.sub,
            issuer: claims.iss,
            audience: claims.aud,
            issued_at: numeric_date("iat", claims.iat)?,
            not_before: numeric_date("nbf", claims.nbf)?,
            expiration: numeric_date("exp", claims.exp)?,
            claims: claims.custom,
        })
    }

    pub fn token_id(&self) -> Option<&str> {
        self.token_id.as_deref()
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    pub fn audience(&self) -> &BTreeSet<String> {
        &self.audience
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.issued_at
    }

    pub fn not_before(&self) -> Option<DateTime<Utc>> {
        self.not_before
    }

    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.expiration
    }

    /// All custom (non-registered) claims.
    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// The raw `roles` claim.
    pub fn roles(&self) -> Option<&str> {
        self.claim(ROLES_CLAIM).and_then(Value::as_str)
    }

    /// The raw `perms` claim.
    pub fn permissions(&self) -> Option<&str> {
        self.claim(PERMISSIONS_CLAIM).and_then(Value::as_str)
    }

    /// The `roles` claim split into individual role names.
    pub fn role_list(&self) -> BTreeSet<String> {
        self.roles().map(tokenize_audience).unwrap_or_default()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.role_list().contains(role)
    }
}

impl TryFrom<ClaimSet> for Payload {
    type Error = AuthError;

    fn try_from(value: ClaimSet) -> AuthResult<Self> {
        Self::from_claims(value)
    }
}
