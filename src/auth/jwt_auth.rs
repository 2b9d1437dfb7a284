//! Auth Facade
//!
//! Ties a `Manager` to an identity store and the "current token" of a
//! request. Every operation is an explicit call into the manager or the
//! authenticator.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::auth::subject::{Authenticator, JwtSubject, TokenSource};
use crate::blacklist::Blacklist;
use crate::claims::SUBJECT;
use crate::error::{probe, AuthError, Result};
use crate::factory::PayloadFactory;
use crate::manager::Manager;
use crate::payload::Payload;
use crate::token::Token;

/// Claim holding the hashed provider of the subject
pub const PROVIDER_CLAIM: &str = "prv";

pub struct JwtAuth<A: Authenticator> {
    manager: Manager,
    auth: A,
    token: Option<Token>,
    custom_claims: Map<String, Value>,
}

impl<A: Authenticator> JwtAuth<A> {
    pub fn new(manager: Manager, auth: A) -> Self {
        Self {
            manager,
            auth,
            token: None,
            custom_claims: Map::new(),
        }
    }

    /// Issue a token for a subject
    ///
    /// The payload holds `sub`, `prv`, the subject's own custom claims and
    /// the inline claims set with `claims`, later ones overriding earlier ones.
    pub fn from_subject<S: JwtSubject + ?Sized>(&self, subject: &S) -> Result<String> {
        let payload = self.make_payload(subject)?;
        Ok(self.manager.encode(&payload)?.into_inner())
    }

    /// Build (without signing) the payload `from_subject` would sign
    pub fn make_payload<S: JwtSubject + ?Sized>(&self, subject: &S) -> Result<Payload> {
        let mut claims = Map::new();
        claims.insert(SUBJECT.to_string(), subject.jwt_identifier());
        claims.insert(
            PROVIDER_CLAIM.to_string(),
            Value::String(hash_provider(subject.provider_name())),
        );
        claims.extend(subject.jwt_custom_claims());
        claims.extend(self.custom_claims.clone());

        Ok(self.factory().custom_claims(claims).make(false)?)
    }

    /// Token for the subject matching `credentials`, `None` if they are rejected
    pub fn attempt(&self, credentials: &A::Credentials) -> Result<Option<String>> {
        match self.auth.by_credentials(credentials) {
            Some(subject) => self.from_subject(&subject).map(Some),
            None => Ok(None),
        }
    }

    /// Subject owning the current token, `None` if the store does not know it
    ///
    /// # Errors
    /// `TokenRequired` without a token, or any decode failure
    pub fn authenticate(&self) -> Result<Option<A::Subject>> {
        let payload = self.payload()?;

        Ok(payload
            .get(SUBJECT)
            .and_then(|id| self.auth.by_id(id)))
    }

    /// Same as `authenticate`, failing with `SubjectNotResolved` instead of `None`
    pub fn authenticate_or_fail(&self) -> Result<A::Subject> {
        self.authenticate()?
            .ok_or_else(|| AuthError::SubjectNotResolved.into())
    }

    pub fn user(&self) -> Option<A::Subject> {
        self.auth.user()
    }

    /// Set the current token, checking its shape
    pub fn set_token(&mut self, token: &str) -> Result<&mut Self> {
        self.token = Some(Token::new(token)?);
        Ok(self)
    }

    pub fn unset_token(&mut self) -> &mut Self {
        self.token = None;
        self
    }

    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    /// Take the current token from a source
    ///
    /// # Errors
    /// `TokenNotParsed` when the source has none, or a shape error
    pub fn parse_token(&mut self, source: &dyn TokenSource) -> Result<&mut Self> {
        let raw = source.parse_token().ok_or(AuthError::TokenNotParsed)?;
        self.set_token(&raw)
    }

    /// Inline claims added to the next issued or refreshed token
    pub fn claims(&mut self, claims: Map<String, Value>) -> &mut Self {
        self.custom_claims = claims;
        self
    }

    pub fn custom_claims(&self) -> &Map<String, Value> {
        &self.custom_claims
    }

    /// Decode the current token, blacklist included
    pub fn payload(&self) -> Result<Payload> {
        let token = self.require_token()?;
        self.manager.decode(token, true)
    }

    pub fn check_or_fail(&self) -> Result<Payload> {
        self.payload()
    }

    /// Whether the current token is acceptable. Only auth failures become
    /// `false`; configuration and storage errors still propagate.
    pub fn check(&self) -> Result<bool> {
        probe(self.payload())
    }

    /// Like `check`, handing back the payload on success
    pub fn check_payload(&self) -> Result<Option<Payload>> {
        match self.payload() {
            Ok(payload) => Ok(Some(payload)),
            Err(e) if e.is_auth() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn get_claim(&self, name: &str) -> Result<Option<Value>> {
        Ok(self.payload()?.get(name).cloned())
    }

    /// Exchange the current token for a new one carrying the inline claims
    pub fn refresh(&self, force_forever: bool, reset_claims: bool) -> Result<String> {
        let token = self.require_token()?;
        let refreshed = self.manager.refresh(
            token,
            self.custom_claims.clone(),
            force_forever,
            reset_claims,
        )?;
        Ok(refreshed.into_inner())
    }

    /// Revoke the current token
    pub fn invalidate(&self, force_forever: bool) -> Result<bool> {
        let token = self.require_token()?;
        self.manager.invalidate(token, force_forever)
    }

    /// Whether the token was issued for the given provider.
    /// Tokens without a `prv` claim pass.
    pub fn check_provider(&self, provider: &str) -> Result<bool> {
        let payload = self.payload()?;

        Ok(match payload.get(PROVIDER_CLAIM) {
            None => true,
            Some(prv) => prv.as_str() == Some(hash_provider(provider).as_str()),
        })
    }

    pub fn manager(&self) -> &Manager {
        &self.manager
    }

    pub fn factory(&self) -> &PayloadFactory {
        self.manager.factory()
    }

    pub fn blacklist(&self) -> &Blacklist {
        self.manager.blacklist()
    }

    pub fn authenticator(&self) -> &A {
        &self.auth
    }

    fn require_token(&self) -> Result<&Token> {
        self.token
            .as_ref()
            .ok_or_else(|| AuthError::TokenRequired.into())
    }
}

/// SHA-256 hex digest of a provider name
pub fn hash_provider(provider: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(provider.as_bytes());
    format!("{:x}", hasher.finalize())
}
