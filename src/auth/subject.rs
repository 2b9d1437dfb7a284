//! Collaborator contracts of the auth facade
//!
//! The identity store and the transport layer stay outside the crate; the
//! facade only talks to them through these traits.

use serde_json::{Map, Value};

/// Something a token can be issued for
pub trait JwtSubject {
    /// Value stored in the `sub` claim
    fn jwt_identifier(&self) -> Value;

    /// Extra claims added to every token of this subject
    fn jwt_custom_claims(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Name hashed into the `prv` claim, the type name unless overridden
    fn provider_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Identity store lookups
pub trait Authenticator {
    type Subject: JwtSubject;
    type Credentials;

    /// Subject matching the credentials, if they are valid
    fn by_credentials(&self, credentials: &Self::Credentials) -> Option<Self::Subject>;

    /// Subject with the given identifier
    fn by_id(&self, id: &Value) -> Option<Self::Subject>;

    /// Currently authenticated subject
    fn user(&self) -> Option<Self::Subject>;
}

/// Extracts a raw bearer string from wherever the caller keeps it
/// (header, query string, cookie ...)
pub trait TokenSource {
    fn parse_token(&self) -> Option<String>;
}

/// A fixed token, or none
impl TokenSource for Option<String> {
    fn parse_token(&self) -> Option<String> {
        self.clone()
    }
}

/// `Authorization: Bearer <token>` header value
#[derive(Debug, Clone)]
pub struct BearerHeader(pub String);

impl TokenSource for BearerHeader {
    fn parse_token(&self) -> Option<String> {
        let value = self.0.trim();
        let (scheme, token) = value.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let token = token.trim();
        (!token.is_empty()).then(|| token.to_string())
    }
}
