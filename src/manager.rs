//! Token Manager
//!
//! Orchestrates signer, payload factory and blacklist:
//! - `encode`: payload → signed token
//! - `decode`: token → validated payload, rejecting revoked tokens
//! - `refresh`: exchange a still-refreshable token for a new one, revoking
//!   the old one first
//! - `invalidate`: revoke a token
//!
//! The validation mode is passed down per call, so one `Manager` can be
//! shared across threads.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::blacklist::Blacklist;
use crate::claims::{EXPIRATION, ISSUED_AT, SUBJECT};
use crate::clock::{system_clock, SharedClock};
use crate::configuration::JwtSettings;
use crate::error::{AuthError, ConfigError, Error, Result};
use crate::factory::PayloadFactory;
use crate::payload::Payload;
use crate::signer::{JsonWebTokenSigner, Signer};
use crate::storage::Storage;
use crate::token::Token;
use crate::validators::{Mode, PayloadValidator};

#[derive(Clone)]
pub struct Manager {
    signer: Arc<dyn Signer>,
    blacklist: Blacklist,
    factory: PayloadFactory,
    blacklist_enabled: bool,
    persistent_claims: Vec<String>,
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("blacklist", &self.blacklist)
            .field("factory", &self.factory)
            .field("blacklist_enabled", &self.blacklist_enabled)
            .field("persistent_claims", &self.persistent_claims)
            .finish_non_exhaustive()
    }
}

impl Manager {
    pub fn new(signer: Arc<dyn Signer>, blacklist: Blacklist, factory: PayloadFactory) -> Self {
        Self {
            signer,
            blacklist,
            factory,
            blacklist_enabled: true,
            persistent_claims: Vec::new(),
        }
    }

    pub fn with_blacklist_enabled(mut self, enabled: bool) -> Self {
        self.blacklist_enabled = enabled;
        self
    }

    /// Claims carried forward on refresh besides `sub` and `iat`
    pub fn with_persistent_claims<I, S>(mut self, claims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.persistent_claims = claims.into_iter().map(Into::into).collect();
        self
    }

    /// Wire a manager from settings, reading time from the system clock
    ///
    /// # Errors
    /// Returns a configuration error if the settings are invalid
    pub fn from_settings(settings: &JwtSettings, storage: Arc<dyn Storage>) -> Result<Self> {
        Self::from_settings_with_clock(settings, storage, system_clock())
    }

    pub fn from_settings_with_clock(
        settings: &JwtSettings,
        storage: Arc<dyn Storage>,
        clock: SharedClock,
    ) -> Result<Self> {
        settings.validate()?;

        let signer = JsonWebTokenSigner::from_settings(settings)?;

        // Tokens minted without a ttl carry no `exp` to require
        let mut required_claims = settings.required_claims.clone();
        if settings.ttl.is_none() {
            required_claims.retain(|claim| claim != EXPIRATION);
        }

        let validator = PayloadValidator::new(clock.clone())
            .with_required_claims(required_claims)
            .with_refresh_ttl(settings.refresh_ttl);

        let factory = PayloadFactory::new(validator)
            .with_issuer(settings.issuer.clone())
            .with_ttl(settings.ttl);

        let blacklist = Blacklist::new(storage, clock)
            .with_key(settings.blacklist_key.clone())
            .with_grace_period(settings.blacklist_grace_period)
            .with_refresh_ttl(settings.refresh_ttl);

        Ok(Self::new(Arc::new(signer), blacklist, factory)
            .with_blacklist_enabled(settings.blacklist_enabled)
            .with_persistent_claims(settings.persistent_claims.clone()))
    }

    pub fn signer(&self) -> &Arc<dyn Signer> {
        &self.signer
    }

    pub fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }

    pub fn factory(&self) -> &PayloadFactory {
        &self.factory
    }

    pub fn blacklist_enabled(&self) -> bool {
        self.blacklist_enabled
    }

    pub fn persistent_claims(&self) -> &[String] {
        &self.persistent_claims
    }

    /// Sign a payload
    pub fn encode(&self, payload: &Payload) -> Result<Token> {
        let raw = self.signer.encode(&payload.to_map())?;
        let token = Token::new(raw)?;

        tracing::debug!(claims = payload.len(), "Token minted");

        Ok(token)
    }

    /// Verify a token and validate its payload under normal rules
    ///
    /// # Errors
    /// - `SignatureInvalid` / `TokenInvalid` from the signer
    /// - any payload validation failure
    /// - `TokenBlacklisted` when `check_blacklist` is set and the token was revoked
    pub fn decode(&self, token: &Token, check_blacklist: bool) -> Result<Payload> {
        self.decode_with(token, Mode::Normal, check_blacklist)
    }

    /// Same as `decode`, under an explicit mode. Every rejection is logged
    /// once through `Error::log`.
    pub fn decode_with(&self, token: &Token, mode: Mode, check_blacklist: bool) -> Result<Payload> {
        self.verify(token, mode, check_blacklist).map_err(|e| {
            e.log(match mode {
                Mode::Normal => "decode",
                Mode::Refresh => "decode_for_refresh",
            });
            e
        })
    }

    fn verify(&self, token: &Token, mode: Mode, check_blacklist: bool) -> Result<Payload> {
        let claims = self.signer.decode(token.get())?;
        let payload = self.factory.rebuild(claims, mode)?;

        if check_blacklist && self.blacklist_enabled && self.blacklist.has(&payload)? {
            return Err(AuthError::TokenBlacklisted.into());
        }

        Ok(payload)
    }

    /// Exchange a token for a new one.
    ///
    /// The old token is checked under refresh rules (the refresh window
    /// anchored at `iat`, not `exp`) and against the blacklist. The new token
    /// carries `custom_claims`, the configured persistent claims and the old
    /// `sub` and `iat`. With the blacklist enabled the old token is revoked
    /// before the new one is minted.
    pub fn refresh(
        &self,
        token: &Token,
        custom_claims: Map<String, Value>,
        force_forever: bool,
        reset_claims: bool,
    ) -> Result<Token> {
        let payload = self.decode_with(token, Mode::Refresh, true)?;

        let mut claims = custom_claims;
        let carried = self
            .persistent_claims
            .iter()
            .map(String::as_str)
            .chain([SUBJECT, ISSUED_AT]);
        for name in carried {
            if let Some(value) = payload.get(name) {
                claims.insert(name.to_string(), value.clone());
            }
        }

        if self.blacklist_enabled {
            self.revoke(&payload, force_forever)?;
        }

        let refreshed = self
            .factory
            .custom_claims(claims)
            .mode(Mode::Refresh)
            .make(reset_claims)?;

        tracing::info!(
            force_forever,
            reset_claims,
            "Token refreshed"
        );

        self.encode(&refreshed)
    }

    /// Revoke a token.
    ///
    /// The blacklist is not consulted while decoding, so invalidating an
    /// already revoked token succeeds again.
    ///
    /// # Errors
    /// `BlacklistDisabled` when the blacklist is turned off, or any decode failure
    pub fn invalidate(&self, token: &Token, force_forever: bool) -> Result<bool> {
        if !self.blacklist_enabled {
            let err = Error::from(ConfigError::BlacklistDisabled);
            err.log("invalidate");
            return Err(err);
        }

        let payload = self.decode_with(token, Mode::Normal, false)?;
        self.revoke(&payload, force_forever)
    }

    fn revoke(&self, payload: &Payload, force_forever: bool) -> Result<bool> {
        if force_forever {
            self.blacklist.add_forever(payload)
        } else {
            self.blacklist.add(payload)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::storage::InMemoryStorage;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;

    fn get_test_settings() -> JwtSettings {
        JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            issuer: "http://example.com".to_string(),
            ..Default::default()
        }
    }

    fn get_test_manager(settings: &JwtSettings) -> (Manager, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(NOW));
        let storage = Arc::new(InMemoryStorage::new(clock.clone()));
        let manager = Manager::from_settings_with_clock(settings, storage, clock.clone())
            .expect("Failed to build manager");
        (manager, clock)
    }

    fn claims(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn mint(manager: &Manager, custom: Value) -> Token {
        let payload = manager
            .factory()
            .custom_claims(claims(custom))
            .make(false)
            .expect("Failed to build payload");
        manager.encode(&payload).expect("Failed to encode")
    }

    #[test]
    fn test_encode_and_decode() {
        let (manager, _) = get_test_manager(&get_test_settings());
        let payload = manager
            .factory()
            .custom_claims(claims(json!({"sub": 1, "foo": "bar"})))
            .make(false)
            .unwrap();

        let token = manager.encode(&payload).unwrap();
        let decoded = manager.decode(&token, true).unwrap();

        assert_eq!(decoded, payload);
        assert_eq!(decoded.get("foo"), Some(&json!("bar")));
    }

    #[test]
    fn test_decode_expired_token() {
        let (manager, clock) = get_test_manager(&get_test_settings());
        let token = mint(&manager, json!({"sub": 1}));

        clock.advance(3601);
        let err = manager.decode(&token, true).unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::expired("Token has expired")));
    }

    #[test]
    fn test_decode_blacklisted_token() {
        let (manager, _) = get_test_manager(&get_test_settings());
        let token = mint(&manager, json!({"sub": 1}));

        assert!(manager.invalidate(&token, false).unwrap());

        let err = manager.decode(&token, true).unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::TokenBlacklisted));

        // skipping the blacklist still decodes
        assert!(manager.decode(&token, false).is_ok());
    }

    #[test]
    fn test_invalidate_token_with_far_future_expiry() {
        for exp in [i64::MAX, i64::MAX - 10] {
            let (manager, clock) = get_test_manager(&get_test_settings());
            let token = mint(&manager, json!({"sub": 1, "exp": exp}));
            assert!(manager.decode(&token, true).is_ok());

            assert!(manager.invalidate(&token, false).unwrap());

            let err = manager.decode(&token, true).unwrap_err();
            assert_eq!(err.as_auth(), Some(&AuthError::TokenBlacklisted));

            clock.advance(61);
            let err = manager.decode(&token, true).unwrap_err();
            assert_eq!(err.as_auth(), Some(&AuthError::TokenBlacklisted));
        }
    }

    #[test]
    fn test_blacklist_not_checked_when_disabled() {
        let settings = JwtSettings {
            blacklist_enabled: false,
            ..get_test_settings()
        };
        let (manager, _) = get_test_manager(&settings);
        let token = mint(&manager, json!({"sub": 1}));

        manager.blacklist().add_forever(&manager.decode(&token, false).unwrap()).unwrap();
        assert!(manager.decode(&token, true).is_ok());
    }

    #[test]
    fn test_refresh_carries_subject_and_issued_at() {
        let settings = JwtSettings {
            persistent_claims: vec!["role".to_string()],
            ..get_test_settings()
        };
        let (manager, clock) = get_test_manager(&settings);
        let token = mint(&manager, json!({"sub": 1, "role": "admin", "foo": "bar"}));

        clock.advance(600);
        let refreshed = manager.refresh(&token, Map::new(), false, false).unwrap();
        let payload = manager.decode(&refreshed, true).unwrap();

        assert_eq!(payload.get("sub"), Some(&json!(1)));
        assert_eq!(payload.get("iat"), Some(&json!(NOW)));
        assert_eq!(payload.get("role"), Some(&json!("admin")));
        assert_eq!(payload.get("foo"), None);
        assert_eq!(payload.get("exp"), Some(&json!(NOW + 600 + 3600)));

        let err = manager.decode(&token, true).unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::TokenBlacklisted));
    }

    #[test]
    fn test_refresh_with_custom_claims() {
        let (manager, _) = get_test_manager(&get_test_settings());
        let token = mint(&manager, json!({"sub": 1}));

        let refreshed = manager
            .refresh(&token, claims(json!({"foo": "baz"})), false, false)
            .unwrap();
        let payload = manager.decode(&refreshed, true).unwrap();

        assert_eq!(payload.get("foo"), Some(&json!("baz")));
    }

    #[test]
    fn test_refresh_expired_token_inside_window() {
        let (manager, clock) = get_test_manager(&get_test_settings());
        let token = mint(&manager, json!({"sub": 1}));

        clock.advance(7200);
        assert!(manager.decode(&token, true).is_err());

        let refreshed = manager.refresh(&token, Map::new(), false, false).unwrap();
        assert!(manager.decode(&refreshed, true).is_ok());
    }

    #[test]
    fn test_refresh_after_window_fails() {
        let settings = JwtSettings {
            refresh_ttl: Some(120),
            ..get_test_settings()
        };
        let (manager, clock) = get_test_manager(&settings);
        let token = mint(&manager, json!({"sub": 1}));

        clock.advance(120 * 60 + 1);
        let err = manager.refresh(&token, Map::new(), false, false).unwrap_err();
        assert_eq!(
            err.as_auth(),
            Some(&AuthError::expired("Token has expired and can no longer be refreshed"))
        );
    }

    #[test]
    fn test_refresh_blacklisted_token_fails() {
        let (manager, _) = get_test_manager(&get_test_settings());
        let token = mint(&manager, json!({"sub": 1}));

        manager.refresh(&token, Map::new(), false, false).unwrap();
        let err = manager.refresh(&token, Map::new(), false, false).unwrap_err();
        assert_eq!(err.as_auth(), Some(&AuthError::TokenBlacklisted));
    }

    #[test]
    fn test_refresh_with_reset_claims() {
        let (manager, clock) = get_test_manager(&get_test_settings());
        let token = mint(&manager, json!({"sub": 1}));

        clock.advance(600);
        let refreshed = manager.refresh(&token, Map::new(), false, true).unwrap();
        let payload = manager.decode(&refreshed, true).unwrap();

        assert_eq!(payload.get("iat"), Some(&json!(NOW + 600)));
        assert_eq!(payload.get("sub"), Some(&json!(1)));
    }

    #[test]
    fn test_refresh_without_blacklist_keeps_old_token_valid() {
        let settings = JwtSettings {
            blacklist_enabled: false,
            ..get_test_settings()
        };
        let (manager, _) = get_test_manager(&settings);
        let token = mint(&manager, json!({"sub": 1}));

        manager.refresh(&token, Map::new(), false, false).unwrap();
        assert!(manager.decode(&token, true).is_ok());
    }

    #[test]
    fn test_invalidate_requires_blacklist() {
        let settings = JwtSettings {
            blacklist_enabled: false,
            ..get_test_settings()
        };
        let (manager, _) = get_test_manager(&settings);
        let token = mint(&manager, json!({"sub": 1}));

        let err = manager.invalidate(&token, false).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::BlacklistDisabled)));
        assert_eq!(
            err.to_string(),
            "You must have the blacklist enabled to invalidate a token."
        );
    }

    #[test]
    fn test_invalidate_is_idempotent() {
        let (manager, _) = get_test_manager(&get_test_settings());
        let token = mint(&manager, json!({"sub": 1}));

        assert!(manager.invalidate(&token, false).unwrap());
        assert!(manager.invalidate(&token, true).unwrap());
        assert!(manager.decode(&token, true).is_err());
    }

    #[test]
    fn test_grace_period_delays_revocation() {
        let settings = JwtSettings {
            blacklist_grace_period: 30,
            ..get_test_settings()
        };
        let (manager, clock) = get_test_manager(&settings);
        let token = mint(&manager, json!({"sub": 1}));

        manager.invalidate(&token, false).unwrap();
        assert!(manager.decode(&token, true).is_ok());

        clock.advance(30);
        assert!(manager.decode(&token, true).is_err());
    }

    #[test]
    fn test_tokens_without_ttl() {
        let settings = JwtSettings {
            ttl: None,
            ..get_test_settings()
        };
        let (manager, clock) = get_test_manager(&settings);
        let token = mint(&manager, json!({"sub": 1}));

        clock.advance(365 * 24 * 3600);
        let payload = manager.decode(&token, true).unwrap();
        assert!(!payload.has_key("exp"));
    }

    #[test]
    fn test_from_settings_rejects_invalid_settings() {
        let storage = Arc::new(InMemoryStorage::default());
        let result = Manager::from_settings(&JwtSettings::default(), storage);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
