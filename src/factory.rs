//! Payload Factory
//!
//! Generates the default claims of a new token (issuer, issued-at, expiry,
//! not-before, unique id), merges caller-supplied custom claims and returns a
//! validated `Payload`.

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::claims::{
    Claim, ClaimCollection, ClaimInput, EXPIRATION, ISSUED_AT, ISSUER, JWT_ID, NOT_BEFORE, SUBJECT,
};
use crate::error::AuthError;
use crate::payload::Payload;
use crate::validators::{Mode, PayloadValidator};

/// Token lifetime in minutes
pub const DEFAULT_TTL: i64 = 60;

pub const DEFAULT_CLAIMS: [&str; 5] = [ISSUER, ISSUED_AT, EXPIRATION, NOT_BEFORE, JWT_ID];

#[derive(Debug, Clone)]
pub struct PayloadFactory {
    validator: PayloadValidator,
    issuer: String,
    ttl: Option<i64>,
    default_claims: Vec<String>,
}

impl PayloadFactory {
    pub fn new(validator: PayloadValidator) -> Self {
        Self {
            validator,
            issuer: String::new(),
            ttl: Some(DEFAULT_TTL),
            default_claims: DEFAULT_CLAIMS.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Lifetime in minutes; `None` mints tokens without an `exp` claim
    pub fn with_ttl(mut self, ttl: Option<i64>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_default_claims<I, S>(mut self, claims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_claims = claims.into_iter().map(Into::into).collect();
        self
    }

    pub fn validator(&self) -> &PayloadValidator {
        &self.validator
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn ttl(&self) -> Option<i64> {
        self.ttl
    }

    pub fn default_claims(&self) -> &[String] {
        &self.default_claims
    }

    /// Start a payload from the caller's claims
    pub fn custom_claims(&self, claims: Map<String, Value>) -> PayloadBuilder<'_> {
        PayloadBuilder {
            factory: self,
            custom: claims,
            mode: Mode::Normal,
        }
    }

    /// Rebuild a payload from a decoded claim map, without generating
    /// anything, and validate it under `mode`
    pub fn rebuild(&self, claims: Map<String, Value>, mode: Mode) -> Result<Payload, AuthError> {
        let now = self.validator.now();
        let collection = claims
            .into_iter()
            .map(|(name, value)| Claim::at(name, ClaimInput::Json(value), now))
            .collect::<Result<ClaimCollection, _>>()?;

        Payload::new(collection, &self.validator, mode)
    }

    fn default_value(&self, name: &str, custom: &Map<String, Value>, now: i64) -> Option<ClaimInput> {
        match name {
            ISSUER => Some(ClaimInput::from(self.issuer.clone())),
            ISSUED_AT | NOT_BEFORE => Some(ClaimInput::Timestamp(now)),
            EXPIRATION => self.ttl.map(|ttl| ClaimInput::Timestamp(now + ttl * 60)),
            JWT_ID => Some(ClaimInput::from(Uuid::new_v4().simple().to_string())),
            SUBJECT => custom.get(SUBJECT).cloned().map(ClaimInput::Json),
            _ => None,
        }
    }
}

/// A payload under construction: custom claims plus the mode to build under
#[derive(Debug)]
pub struct PayloadBuilder<'a> {
    factory: &'a PayloadFactory,
    custom: Map<String, Value>,
    mode: Mode,
}

impl<'a> PayloadBuilder<'a> {
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Merge defaults and custom claims, then validate.
    ///
    /// Custom claims win over generated ones, unless the build runs in
    /// refresh mode with `reset_claims`, in which case every default claim is
    /// regenerated.
    ///
    /// # Errors
    /// `InvalidClaim` for a bad custom value, or any validation failure of
    /// the resulting collection.
    pub fn make(self, reset_claims: bool) -> Result<Payload, AuthError> {
        let factory = self.factory;
        let now = factory.validator.now();
        let regenerate = self.mode.is_refresh() && reset_claims;

        let mut collection = ClaimCollection::new();

        for name in &factory.default_claims {
            let input = match self.custom.get(name.as_str()) {
                Some(value) if !regenerate => Some(ClaimInput::Json(value.clone())),
                _ => factory.default_value(name, &self.custom, now),
            };
            if let Some(input) = input {
                collection.insert(Claim::at(name.as_str(), input, now)?);
            }
        }

        for (name, value) in self.custom {
            if !collection.contains(&name) {
                collection.insert(Claim::at(name, ClaimInput::Json(value), now)?);
            }
        }

        let payload = Payload::new(collection, &factory.validator, self.mode)?;

        tracing::debug!(
            mode = ?self.mode,
            claims = payload.len(),
            "Payload built"
        );

        Ok(payload)
    }
}
