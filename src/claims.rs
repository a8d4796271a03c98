use std::collections::BTreeSet;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{AuthError, AuthResult};

/// Claim names reserved for the registered fields of [`ClaimSet`].
pub const REGISTERED_CLAIMS: [&str; 7] = ["jti", "sub", "iss", "aud", "iat", "nbf", "exp"];

pub const ROLES_CLAIM: &str = "roles";
pub const PERMISSIONS_CLAIM: &str = "perms";

/// Period value meaning "the token never expires".
pub const NO_EXPIRY: i64 = -1;

/// Seconds since the Unix epoch, kept to the millisecond.
///
/// Whole seconds go on the wire as JSON integers, anything finer as a
/// decimal (`1700000000.6`), which RFC 7519 allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NumericDate(i64);

impl NumericDate {
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn from_seconds(seconds: i64) -> Self {
        Self(seconds.saturating_mul(1000))
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.timestamp_millis())
    }

    /// `at` truncated to the whole second.
    pub fn whole_seconds(at: DateTime<Utc>) -> Self {
        Self::from_seconds(at.timestamp())
    }

    pub fn millis(self) -> i64 {
        self.0
    }

    pub fn seconds(self) -> i64 {
        self.0.div_euclid(1000)
    }

    /// `None` when chrono cannot represent the instant.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.0).single()
    }

    fn from_json(number: &serde_json::Number) -> Option<Self> {
        if let Some(seconds) = number.as_i64() {
            return Some(Self::from_seconds(seconds));
        }
        let millis = (number.as_f64()? * 1000.0).round();
        (millis.is_finite() && millis.abs() < i64::MAX as f64).then(|| Self(millis as i64))
    }
}

impl Serialize for NumericDate {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        if self.0 % 1000 == 0 {
            s.serialize_i64(self.0 / 1000)
        } else {
            s.serialize_f64(self.0 as f64 / 1000.0)
        }
    }
}

/// Custom claims in one of the two accepted shapes.
#[derive(Debug, Clone)]
pub enum CustomClaims {
    /// Arbitrary claims, merged entry by entry.
    Map(Map<String, Value>),
    /// Stored as the `roles` and `perms` string claims, each only if
    /// non-blank.
    RolesAndPermissions { roles: String, permissions: String },
}

impl Default for CustomClaims {
    fn default() -> Self {
        Self::Map(Map::new())
    }
}

/// Everything needed to assemble a [`ClaimSet`].
///
/// ```rust
/// use jwt_issuer::TokenRequest;
///
/// let request = TokenRequest::new("Jwt test")
///     .token_id("0001")
///     .issuer("test")
///     .audience("web, mobile")
///     .roles_and_permissions("admin,stu", "user:del")
///     .period(1024);
/// assert_eq!(request.period_ms, 1024);
/// ```
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub subject: String,
    pub token_id: Option<String>,
    pub issuer: Option<String>,
    /// Comma, semicolon or whitespace separated audience list.
    pub audience: Option<String>,
    pub claims: CustomClaims,
    /// Validity in milliseconds; negative means no expiration.
    pub period_ms: i64,
}

impl TokenRequest {
    /// A request for `subject` that never expires and carries no custom
    /// claims.
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            token_id: None,
            issuer: None,
            audience: None,
            claims: CustomClaims::default(),
            period_ms: NO_EXPIRY,
        }
    }

    pub fn token_id(mut self, v: impl Into<String>) -> Self {
        self.token_id = Some(v.into());
        self
    }
    pub fn issuer(mut self, v: impl Into<String>) -> Self {
        self.issuer = Some(v.into());
        self
    }
    pub fn audience(mut self, v: impl Into<String>) -> Self {
        self.audience = Some(v.into());
        self
    }
    pub fn claims(mut self, v: Map<String, Value>) -> Self {
        self.claims = CustomClaims::Map(v);
        self
    }
    pub fn roles_and_permissions(
        mut self,
        roles: impl Into<String>,
        permissions: impl Into<String>,
    ) -> Self {
        self.claims = CustomClaims::RolesAndPermissions {
            roles: roles.into(),
            permissions: permissions.into(),
        };
        self
    }
    pub fn period(mut self, millis: i64) -> Self {
        self.period_ms = millis;
        self
    }

    /// The validity period, or `None` when the token should never expire.
    pub fn lifetime(&self) -> Option<Duration> {
        (self.period_ms >= 0).then(|| Duration::milliseconds(self.period_ms))
    }
}

/// Registered plus custom claims, as carried in the token payload.
///
/// `iat` and `nbf` are stamped in whole seconds; `exp` keeps the
/// millisecond so a token lives exactly its requested period.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClaimSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(
        skip_serializing_if = "BTreeSet::is_empty",
        serialize_with = "serialize_audience"
    )]
    pub aud: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<NumericDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<NumericDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<NumericDate>,
    #[serde(flatten)]
    pub custom: Map<String, Value>,
}

impl ClaimSet {
    /// Build the claim set for `request`, stamped at `now`.  Never fails;
    /// blank optional inputs are simply left out.
    pub fn assemble(request: &TokenRequest, now: DateTime<Utc>) -> Self {
        let mut claims = Self {
            jti: non_blank(request.token_id.as_deref()),
            sub: Some(request.subject.clone()),
            iss: non_blank(request.issuer.as_deref()),
            aud: request
                .audience
                .as_deref()
                .map(tokenize_audience)
                .unwrap_or_default(),
            ..Self::default()
        };

        match &request.claims {
            CustomClaims::Map(map) => {
                for (name, value) in map {
                    claims.insert_custom(name, value.clone());
                }
            }
            CustomClaims::RolesAndPermissions { roles, permissions } => {
                if let Some(roles) = non_blank(Some(roles.as_str())) {
                    claims.insert_custom(ROLES_CLAIM, Value::String(roles));
                }
                if let Some(perms) = non_blank(Some(permissions.as_str())) {
                    claims.insert_custom(PERMISSIONS_CLAIM, Value::String(perms));
                }
            }
        }

        claims.stamp(now, request.lifetime());
        claims
    }

    /// Set `iat` and `nbf` to `now` in whole seconds, and `exp` to
    /// `now + lifetime` to the millisecond (or clear it when there is no
    /// lifetime).
    pub fn stamp(&mut self, now: DateTime<Utc>, lifetime: Option<Duration>) {
        self.iat = Some(NumericDate::whole_seconds(now));
        self.nbf = Some(NumericDate::whole_seconds(now));
        self.exp = lifetime.map(|period| {
            NumericDate::from_datetime(
                now.checked_add_signed(period)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            )
        });
    }

    /// The lifetime implied by the current `iat`/`exp` pair.
    pub fn lifetime(&self) -> Option<Duration> {
        match (self.iat, self.exp) {
            (Some(iat), Some(exp)) => Some(
                Duration::try_milliseconds(exp.millis().saturating_sub(iat.millis()))
                    .unwrap_or(Duration::MAX),
            ),
            (None, Some(_)) => Some(Duration::zero()),
            _ => None,
        }
    }

    /// Add a custom claim.  Names reserved for registered claims are
    /// dropped.
    pub fn insert_custom(&mut self, name: &str, value: Value) -> bool {
        if REGISTERED_CLAIMS.contains(&name) {
            warn!(claim = name, "custom claim collides with a registered claim; dropped");
            return false;
        }
        self.custom.insert(name.to_string(), value);
        true
    }
}

impl TryFrom<Map<String, Value>> for ClaimSet {
    type Error = AuthError;

    fn try_from(mut map: Map<String, Value>) -> AuthResult<Self> {
        let jti = take_string(&mut map, "jti")?;
        let sub = take_string(&mut map, "sub")?;
        let iss = take_string(&mut map, "iss")?;
        let aud = take_audience(&mut map)?;
        let iat = take_numeric_date(&mut map, "iat")?;
        let nbf = take_numeric_date(&mut map, "nbf")?;
        let exp = take_numeric_date(&mut map, "exp")?;

        Ok(Self {
            jti,
            sub,
            iss,
            aud,
            iat,
            nbf,
            exp,
            custom: map,
        })
    }
}

/// Split an audience string on commas, semicolons and whitespace, dropping
/// empty pieces.
pub fn tokenize_audience(audience: &str) -> BTreeSet<String> {
    audience
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Convert a NumericDate to a UTC instant.
pub(crate) fn numeric_date(
    name: &'static str,
    date: Option<NumericDate>,
) -> AuthResult<Option<DateTime<Utc>>> {
    date.map(|d| {
        d.to_datetime()
            .ok_or_else(|| AuthError::InvalidClaim(name, format!("{}ms is out of range", d.millis())))
    })
    .transpose()
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}

// A single audience goes out as a plain string, which is what most
// verifiers expect; several go out as an array.
fn serialize_audience<S: Serializer>(aud: &BTreeSet<String>, s: S) -> Result<S::Ok, S::Error> {
    match aud.len() {
        1 => s.serialize_str(aud.iter().next().map(String::as_str).unwrap_or_default()),
        _ => aud.serialize(s),
    }
}

fn take_string(map: &mut Map<String, Value>, name: &'static str) -> AuthResult<Option<String>> {
    match map.remove(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(AuthError::InvalidClaim(name, format!("expected a string, got {other}"))),
    }
}

fn take_audience(map: &mut Map<String, Value>) -> AuthResult<BTreeSet<String>> {
    match map.remove("aud") {
        None | Some(Value::Null) => Ok(BTreeSet::new()),
        Some(Value::String(s)) => Ok(BTreeSet::from([s])),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                other => Err(AuthError::InvalidClaim(
                    "aud",
                    format!("expected string members, got {other}"),
                )),
            })
            .collect(),
        Some(other) => Err(AuthError::InvalidClaim(
            "aud",
            format!("expected a string or array, got {other}"),
        )),
    }
}

fn take_numeric_date(
    map: &mut Map<String, Value>,
    name: &'static str,
) -> AuthResult<Option<NumericDate>> {
    match map.remove(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => NumericDate::from_json(&n)
            .map(Some)
            .ok_or_else(|| AuthError::InvalidClaim(name, n.to_string())),
        Some(other) => Err(AuthError::InvalidClaim(name, format!("expected a NumericDate, got {other}"))),
    }
}
