//! Payload validation
//!
//! Structural check (required claims present) followed by the temporal
//! rules of the requested mode. Pure check: the collection is returned as-is.

use std::sync::Arc;

use crate::claims::ClaimCollection;
use crate::clock::{Clock, SystemClock};
use crate::error::AuthError;
use crate::validators::Mode;

pub const DEFAULT_REQUIRED_CLAIMS: [&str; 6] = ["iss", "iat", "exp", "nbf", "sub", "jti"];

/// Two weeks, in minutes
pub const DEFAULT_REFRESH_TTL: i64 = 20160;

#[derive(Clone)]
pub struct PayloadValidator {
    required_claims: Vec<String>,
    refresh_ttl: Option<i64>,
    clock: Arc<dyn Clock>,
}

impl Default for PayloadValidator {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl std::fmt::Debug for PayloadValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadValidator")
            .field("required_claims", &self.required_claims)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl PayloadValidator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            required_claims: DEFAULT_REQUIRED_CLAIMS.iter().map(|c| c.to_string()).collect(),
            refresh_ttl: Some(DEFAULT_REFRESH_TTL),
            clock,
        }
    }

    pub fn with_required_claims<I, S>(mut self, claims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_claims = claims.into_iter().map(Into::into).collect();
        self
    }

    /// Refresh window in minutes; `None` means tokens stay refreshable forever
    pub fn with_refresh_ttl(mut self, ttl: Option<i64>) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    pub fn required_claims(&self) -> &[String] {
        &self.required_claims
    }

    pub fn refresh_ttl(&self) -> Option<i64> {
        self.refresh_ttl
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Run the validations on a claim collection
    ///
    /// # Errors
    /// - `TokenInvalid` when a required claim is missing, or `nbf`/`iat` are in the future
    /// - `TokenExpired` when `exp` passed (normal) or the refresh window elapsed (refresh)
    pub fn check<'a>(
        &self,
        claims: &'a ClaimCollection,
        mode: Mode,
    ) -> Result<&'a ClaimCollection, AuthError> {
        self.validate_structure(claims)?;

        match mode {
            Mode::Refresh => self.validate_refresh(claims),
            Mode::Normal => claims.validate(Mode::Normal, None, self.now()),
        }
    }

    pub fn is_valid(&self, claims: &ClaimCollection, mode: Mode) -> bool {
        self.check(claims, mode).is_ok()
    }

    fn validate_structure(&self, claims: &ClaimCollection) -> Result<(), AuthError> {
        if !claims.has_all_claims(&self.required_claims) {
            return Err(AuthError::invalid(
                "JWT payload does not contain the required claims",
            ));
        }
        Ok(())
    }

    fn validate_refresh<'a>(
        &self,
        claims: &'a ClaimCollection,
    ) -> Result<&'a ClaimCollection, AuthError> {
        match self.refresh_ttl {
            None => Ok(claims),
            Some(ttl) => claims.validate(Mode::Refresh, Some(ttl), self.now()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::Claim;
    use crate::clock::FixedClock;

    const NOW: i64 = 1_700_000_000;

    fn validator() -> PayloadValidator {
        PayloadValidator::new(Arc::new(FixedClock::new(NOW)))
    }

    fn collection(exp: i64, nbf: i64, iat: i64) -> ClaimCollection {
        vec![
            Claim::at("sub", 1, NOW).unwrap(),
            Claim::at("iss", "http://example.com", NOW).unwrap(),
            Claim::at("exp", exp, NOW).unwrap(),
            Claim::at("nbf", nbf, NOW).unwrap(),
            Claim::at("iat", iat, NOW).unwrap(),
            Claim::at("jti", "foo", NOW).unwrap(),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_valid_payload() {
        let claims = collection(NOW + 3600, NOW, NOW);
        assert!(validator().is_valid(&claims, Mode::Normal));
        assert_eq!(validator().check(&claims, Mode::Normal).unwrap(), &claims);
    }

    #[test]
    fn test_expired_payload() {
        let claims = collection(NOW - 1440, NOW - 3660, NOW - 3660);
        let err = validator().check(&claims, Mode::Normal).unwrap_err();
        assert_eq!(err, AuthError::expired("Token has expired"));
    }

    #[test]
    fn test_missing_required_claims() {
        let claims: ClaimCollection = vec![
            Claim::at("sub", 1, NOW).unwrap(),
            Claim::at("iss", "http://example.com", NOW).unwrap(),
        ]
        .into_iter()
        .collect();

        let err = validator().check(&claims, Mode::Normal).unwrap_err();
        assert_eq!(
            err.to_string(),
            "JWT payload does not contain the required claims"
        );
    }

    #[test]
    fn test_custom_required_claims() {
        let claims: ClaimCollection = vec![
            Claim::at("sub", 1, NOW).unwrap(),
            Claim::at("iss", "http://example.com", NOW).unwrap(),
        ]
        .into_iter()
        .collect();

        let validator = validator().with_required_claims(["iss", "sub"]);
        assert!(validator.is_valid(&claims, Mode::Normal));
    }

    #[test]
    fn test_refresh_context_accepts_expired_token_inside_window() {
        let claims = collection(NOW - 1000, NOW, NOW - 2600);
        let validator = validator().with_refresh_ttl(Some(60));

        assert!(!validator.is_valid(&claims, Mode::Normal));
        assert!(validator.is_valid(&claims, Mode::Refresh));
    }

    #[test]
    fn test_refresh_context_with_unlimited_window() {
        let claims = collection(NOW - 1000, NOW, NOW - 2600);
        let validator = validator().with_refresh_ttl(None);

        assert!(validator.is_valid(&claims, Mode::Refresh));
    }

    #[test]
    fn test_token_cannot_be_refreshed_after_window() {
        let claims = collection(NOW, NOW, NOW - 5000);
        let validator = validator().with_refresh_ttl(Some(60));

        let err = validator.check(&claims, Mode::Refresh).unwrap_err();
        assert_eq!(
            err,
            AuthError::expired("Token has expired and can no longer be refreshed")
        );
    }

    #[test]
    fn test_refresh_mode_still_checks_structure() {
        let claims: ClaimCollection = vec![Claim::at("sub", 1, NOW).unwrap()].into_iter().collect();
        let validator = validator().with_refresh_ttl(None);

        assert!(matches!(
            validator.check(&claims, Mode::Refresh),
            Err(AuthError::TokenInvalid(_))
        ));
    }
}
