//! Token Blacklist
//!
//! Revocation ledger consulted on decode. Entries are keyed by one claim of
//! the payload (`jti` unless configured otherwise) and stored either forever
//! or as a `{"valid_until": ts}` record that lives until the token could no
//! longer be refreshed anyway.
//!
//! A record only takes effect once `valid_until` is reached: with a grace
//! period of N seconds an invalidated token keeps working for N more seconds,
//! which absorbs in-flight requests racing a refresh.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::claims::{TemporalClaim, EXPIRATION, ISSUED_AT, JWT_ID};
use crate::clock::SharedClock;
use crate::error::{AuthError, Result, StorageError};
use crate::payload::Payload;
use crate::storage::Storage;
use crate::validators::DEFAULT_REFRESH_TTL;

/// Stored value of a permanent entry
pub const FOREVER: &str = "forever";

const VALID_UNTIL: &str = "valid_until";

#[derive(Clone)]
pub struct Blacklist {
    storage: Arc<dyn Storage>,
    clock: SharedClock,
    key: String,
    grace_period: i64,
    refresh_ttl: Option<i64>,
}

impl std::fmt::Debug for Blacklist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blacklist")
            .field("key", &self.key)
            .field("grace_period", &self.grace_period)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl Blacklist {
    pub fn new(storage: Arc<dyn Storage>, clock: SharedClock) -> Self {
        Self {
            storage,
            clock,
            key: JWT_ID.to_string(),
            grace_period: 0,
            refresh_ttl: Some(DEFAULT_REFRESH_TTL),
        }
    }

    /// Claim whose value identifies a token in storage
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Grace period in seconds
    pub fn with_grace_period(mut self, seconds: i64) -> Self {
        self.grace_period = seconds;
        self
    }

    /// Refresh window in minutes, normally the validator's
    pub fn with_refresh_ttl(mut self, minutes: Option<i64>) -> Self {
        self.refresh_ttl = minutes;
        self
    }

    pub fn key_claim(&self) -> &str {
        &self.key
    }

    pub fn grace_period(&self) -> i64 {
        self.grace_period
    }

    pub fn refresh_ttl(&self) -> Option<i64> {
        self.refresh_ttl
    }

    /// Storage key of a payload: its key claim rendered as a string
    ///
    /// # Errors
    /// `TokenInvalid` when the payload does not carry the key claim.
    pub fn key(&self, payload: &Payload) -> Result<String> {
        match payload.get(&self.key) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Null) | None => Err(AuthError::invalid(format!(
                "JWT payload does not contain the [{}] claim",
                self.key
            ))
            .into()),
            Some(other) => Ok(other.to_string()),
        }
    }

    /// Revoke the token until it can no longer be refreshed.
    ///
    /// A token without an expiry cannot be time-boxed and is revoked forever.
    /// An already expired token is still recorded.
    pub fn add(&self, payload: &Payload) -> Result<bool> {
        let Some(exp) = payload.claim(EXPIRATION).and_then(|c| c.timestamp()) else {
            return self.add_forever(payload);
        };

        let key = self.key(payload)?;
        let now = self.clock.now();
        let record = json!({ VALID_UNTIL: now.saturating_add(self.grace_period) });

        // A window too far out to count in minutes is kept forever
        match self
            .refresh_ttl
            .and_then(|ttl| self.minutes_to_keep(payload, exp, ttl, now))
        {
            Some(minutes) => self.storage.add(&key, record, minutes)?,
            None => self.storage.forever(&key, record)?,
        }

        tracing::info!(
            key = %key,
            grace_period = self.grace_period,
            "Token added to blacklist"
        );

        Ok(true)
    }

    /// Revoke the token permanently
    pub fn add_forever(&self, payload: &Payload) -> Result<bool> {
        let key = self.key(payload)?;
        self.storage.forever(&key, Value::from(FOREVER))?;

        tracing::info!(key = %key, forever = true, "Token added to blacklist");

        Ok(true)
    }

    /// Whether the token is currently revoked
    ///
    /// # Errors
    /// `StorageError::Corrupt` when a record carries a non-integer `valid_until`
    pub fn has(&self, payload: &Payload) -> Result<bool> {
        let key = self.key(payload)?;

        let revoked = match self.storage.get(&key)? {
            Some(Value::String(s)) => s == FOREVER,
            Some(Value::Object(record)) => match record.get(VALID_UNTIL) {
                None => false,
                Some(valid_until) => {
                    let valid_until = valid_until
                        .as_i64()
                        .ok_or_else(|| StorageError::Corrupt(key.clone()))?;
                    valid_until <= self.clock.now()
                }
            },
            _ => false,
        };

        Ok(revoked)
    }

    pub fn remove(&self, payload: &Payload) -> Result<bool> {
        let key = self.key(payload)?;
        let removed = self.storage.destroy(&key)?;

        tracing::info!(key = %key, removed, "Token removed from blacklist");

        Ok(removed)
    }

    /// Drop every entry
    pub fn clear(&self) -> Result<bool> {
        self.storage.flush()?;
        tracing::info!("Blacklist flushed");
        Ok(true)
    }

    /// Whole minutes until the token leaves its refresh window, plus one
    /// minute of overlap and the grace period. `None` when the window does
    /// not fit in an `i64` of seconds.
    fn minutes_to_keep(
        &self,
        payload: &Payload,
        exp: i64,
        refresh_ttl: i64,
        now: i64,
    ) -> Option<i64> {
        let iat = payload
            .claim(ISSUED_AT)
            .and_then(|c| c.timestamp())
            .unwrap_or(now);

        let refresh_until = iat.checked_add(refresh_ttl.checked_mul(60)?)?;
        let until = exp
            .max(refresh_until)
            .checked_add(60)?
            .checked_add(self.grace_period)?;
        let seconds = until.checked_sub(now)?.checked_add(59)?;

        Some(seconds.div_euclid(60).max(1))
    }
}
