//! Token Claims
//!
//! A claim is one named value carried in a token payload. Reserved names
//! (RFC 7519) get creation-time checks and, for the temporal ones, normal-mode
//! and refresh-mode rules. Every other name is a custom claim with no rules.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::error::AuthError;

pub const ISSUER: &str = "iss";
pub const SUBJECT: &str = "sub";
pub const AUDIENCE: &str = "aud";
pub const EXPIRATION: &str = "exp";
pub const NOT_BEFORE: &str = "nbf";
pub const ISSUED_AT: &str = "iat";
pub const JWT_ID: &str = "jti";

/// Kind of a claim, fixed by its name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClaimKind {
    Issuer,
    Subject,
    Audience,
    Expiration,
    NotBefore,
    IssuedAt,
    JwtId,
    Custom,
}

impl ClaimKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            ISSUER => ClaimKind::Issuer,
            SUBJECT => ClaimKind::Subject,
            AUDIENCE => ClaimKind::Audience,
            EXPIRATION => ClaimKind::Expiration,
            NOT_BEFORE => ClaimKind::NotBefore,
            ISSUED_AT => ClaimKind::IssuedAt,
            JWT_ID => ClaimKind::JwtId,
            _ => ClaimKind::Custom,
        }
    }

    /// Temporal claims are normalized to an integer Unix timestamp
    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            ClaimKind::Expiration | ClaimKind::NotBefore | ClaimKind::IssuedAt
        )
    }
}

/// Raw input accepted when creating a claim
#[derive(Debug, Clone)]
pub enum ClaimInput {
    /// Unix timestamp in seconds
    Timestamp(i64),
    /// Calendar date/time
    DateTime(DateTime<Utc>),
    /// Interval relative to "now"
    Interval(Duration),
    /// Any JSON value, e.g. straight out of a decoded token
    Json(Value),
}

impl From<i64> for ClaimInput {
    fn from(ts: i64) -> Self {
        ClaimInput::Timestamp(ts)
    }
}

impl From<i32> for ClaimInput {
    fn from(ts: i32) -> Self {
        ClaimInput::Timestamp(i64::from(ts))
    }
}

impl From<DateTime<Utc>> for ClaimInput {
    fn from(dt: DateTime<Utc>) -> Self {
        ClaimInput::DateTime(dt)
    }
}

impl From<Duration> for ClaimInput {
    fn from(interval: Duration) -> Self {
        ClaimInput::Interval(interval)
    }
}

impl From<Value> for ClaimInput {
    fn from(value: Value) -> Self {
        ClaimInput::Json(value)
    }
}

impl From<&str> for ClaimInput {
    fn from(value: &str) -> Self {
        ClaimInput::Json(Value::String(value.to_string()))
    }
}

impl From<String> for ClaimInput {
    fn from(value: String) -> Self {
        ClaimInput::Json(Value::String(value))
    }
}

/// Past/future checks over a normalized timestamp
pub trait TemporalClaim {
    /// Normalized timestamp, `None` for non-temporal claims
    fn timestamp(&self) -> Option<i64>;

    fn is_past(&self, now: i64) -> bool {
        self.timestamp().map_or(false, |ts| ts < now)
    }

    fn is_future(&self, now: i64) -> bool {
        self.timestamp().map_or(false, |ts| ts > now)
    }
}

/// A single validated claim
#[derive(Debug, Clone, PartialEq)]
pub struct Claim {
    name: String,
    value: Value,
    kind: ClaimKind,
}

impl Claim {
    /// Create a claim, checking it against the wall clock
    pub fn new(name: impl Into<String>, input: impl Into<ClaimInput>) -> Result<Self, AuthError> {
        Self::at(name, input, chrono::Utc::now().timestamp())
    }

    /// Create a claim, checking it against the given `now`
    ///
    /// # Errors
    /// Returns `InvalidClaim` if a temporal claim is not numeric, or if
    /// `iat`/`nbf` lies in the future.
    pub fn at(
        name: impl Into<String>,
        input: impl Into<ClaimInput>,
        now: i64,
    ) -> Result<Self, AuthError> {
        let name = name.into();
        let kind = ClaimKind::from_name(&name);

        let value = if kind.is_temporal() {
            let ts = normalize_timestamp(&name, input.into(), now)?;
            if matches!(kind, ClaimKind::IssuedAt | ClaimKind::NotBefore) && ts > now {
                return Err(AuthError::InvalidClaim(name));
            }
            Value::from(ts)
        } else {
            match input.into() {
                ClaimInput::Json(value) => value,
                ClaimInput::Timestamp(ts) => Value::from(ts),
                ClaimInput::DateTime(_) | ClaimInput::Interval(_) => {
                    return Err(AuthError::InvalidClaim(name))
                }
            }
        };

        Ok(Self { name, value, kind })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn kind(&self) -> ClaimKind {
        self.kind
    }

    pub fn into_parts(self) -> (String, Value) {
        (self.name, self.value)
    }

    /// Normal-mode rule
    pub fn validate_payload(&self, now: i64) -> Result<(), AuthError> {
        match self.kind {
            ClaimKind::Expiration if self.is_past(now) => {
                Err(AuthError::expired("Token has expired"))
            }
            ClaimKind::NotBefore if self.is_future(now) => Err(AuthError::invalid(
                "Not Before (nbf) timestamp cannot be in the future",
            )),
            ClaimKind::IssuedAt if self.is_future(now) => Err(AuthError::invalid(
                "Issued At (iat) timestamp cannot be in the future",
            )),
            _ => Ok(()),
        }
    }

    /// Refresh-mode rule: `iat` must still be inside the refresh window
    pub fn validate_refresh(&self, refresh_ttl_minutes: i64, now: i64) -> Result<(), AuthError> {
        match (self.kind, self.timestamp()) {
            (ClaimKind::IssuedAt, Some(iat))
                if iat.saturating_add(refresh_ttl_minutes.saturating_mul(60)) < now =>
            {
                Err(AuthError::expired(
                    "Token has expired and can no longer be refreshed",
                ))
            }
            _ => Ok(()),
        }
    }
}

impl TemporalClaim for Claim {
    fn timestamp(&self) -> Option<i64> {
        if self.kind.is_temporal() {
            self.value.as_i64()
        } else {
            None
        }
    }
}

fn normalize_timestamp(name: &str, input: ClaimInput, now: i64) -> Result<i64, AuthError> {
    let invalid = || AuthError::InvalidClaim(name.to_string());

    match input {
        ClaimInput::Timestamp(ts) => Ok(ts),
        ClaimInput::DateTime(dt) => Ok(dt.timestamp()),
        ClaimInput::Interval(interval) => Ok(now.saturating_add(interval.num_seconds())),
        ClaimInput::Json(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .ok_or_else(invalid),
        ClaimInput::Json(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f as i64)
                })
                .ok_or_else(invalid)
        }
        ClaimInput::Json(_) => Err(invalid()),
    }
}
