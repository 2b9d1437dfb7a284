//! Authentication module
//!
//! Subject, identity-store and token-source contracts, and the `JwtAuth`
//! facade built on top of the manager.

mod jwt_auth;
mod subject;

pub use jwt_auth::hash_provider;
pub use jwt_auth::JwtAuth;
pub use jwt_auth::PROVIDER_CLAIM;
pub use subject::Authenticator;
pub use subject::BearerHeader;
pub use subject::JwtSubject;
pub use subject::TokenSource;
