//! Error Handling Module
//!
//! Errors are split by domain and rolled up into one crate-level type:
//! 1. Auth errors (malformed, expired, revoked tokens and bad claims)
//! 2. Configuration errors
//! 3. Storage backend errors
//! 4. A unified `Error` with `From` conversions and structured logging
//!
//! Only the auth family is ever converted into a `false` by the boolean
//! probes; everything else propagates.

use thiserror::Error as ThisError;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Authentication errors raised while building, validating or revoking tokens
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum AuthError {
    #[error("Wrong number of segments")]
    WrongNumberOfSegments,

    #[error("Malformed token")]
    MalformedToken,

    /// Structurally or semantically invalid token (missing claims, bad nbf/iat, bad input)
    #[error("{0}")]
    TokenInvalid(String),

    #[error("Token Signature could not be verified.")]
    SignatureInvalid,

    /// Expiry passed, or the refresh window elapsed
    #[error("{0}")]
    TokenExpired(String),

    /// A single claim failed its creation-time check
    #[error("Invalid value provided for claim [{0}]")]
    InvalidClaim(String),

    #[error("The token has been blacklisted")]
    TokenBlacklisted,

    #[error("No authenticated subject could be resolved")]
    SubjectNotResolved,

    #[error("A token is required")]
    TokenRequired,

    #[error("The token could not be parsed from the request")]
    TokenNotParsed,

    #[error("Could not create token: {0}")]
    TokenNotCreated(String),
}

impl AuthError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        AuthError::TokenInvalid(msg.into())
    }

    pub fn expired(msg: impl Into<String>) -> Self {
        AuthError::TokenExpired(msg.into())
    }
}

/// Configuration errors
#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("You must have the blacklist enabled to invalidate a token.")]
    BlacklistDisabled,

    #[error("Missing required config: {0}")]
    MissingRequired(String),

    #[error("Invalid config value: {0}")]
    InvalidValue(String),

    #[error("Config load error: {0}")]
    Load(#[from] config::ConfigError),
}

/// Errors reported by a blacklist storage backend
#[derive(Debug, Clone, ThisError)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt storage entry for key [{0}]")]
    Corrupt(String),
}

/// ============================================================================
/// 2. UNIFIED ERROR TYPE
/// ============================================================================

/// Central error type returned by the manager, blacklist, signer and facade
#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Accessor lookup on a payload for a claim it does not carry
    #[error("The claim [{0}] does not exist on the payload.")]
    UnknownClaimAccessor(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// True for the auth-domain family, the only errors the probes swallow
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth(_))
    }

    pub fn as_auth(&self) -> Option<&AuthError> {
        match self {
            Error::Auth(e) => Some(e),
            _ => None,
        }
    }

    /// Emit one structured event for this error
    pub fn log(&self, operation: &str) {
        match self {
            Error::Auth(e) => {
                tracing::warn!(
                    operation = operation,
                    error = %e,
                    "Authentication error"
                );
            }
            Error::Config(e) => {
                tracing::error!(
                    operation = operation,
                    error = %e,
                    "Configuration error"
                );
            }
            Error::Storage(e) => {
                tracing::error!(
                    operation = operation,
                    error = %e,
                    "Blacklist storage error"
                );
            }
            Error::UnknownClaimAccessor(name) => {
                tracing::error!(
                    operation = operation,
                    accessor = %name,
                    "Unknown claim accessor"
                );
            }
        }
    }
}

// ============================================================================
// 3. PROBE HELPER
// ============================================================================

/// Turn a fallible check into a boolean.
///
/// `Ok` becomes `true`, auth-domain failures become `false`, and anything
/// else (configuration, storage, programming errors) is returned as-is.
pub fn probe<T>(result: Result<T>) -> Result<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(e) if e.is_auth() => Ok(false),
        Err(e) => Err(e),
    }
}
