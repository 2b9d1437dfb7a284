//! JWT Signing and Verification
//!
//! The core only sees an opaque `Signer`: a flat claim map goes in, a compact
//! token string comes out, and back. `JsonWebTokenSigner` is the stock
//! implementation on top of `jsonwebtoken`. It verifies the signature and the
//! algorithm only; temporal and required-claim rules belong to the payload
//! validator.

use std::str::FromStr;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use serde_json::{Map, Value};

use crate::configuration::JwtSettings;
use crate::error::{AuthError, ConfigError, Result};

/// Length of secrets produced by `generate_secret`
pub const SECRET_LENGTH: usize = 32;

pub trait Signer: Send + Sync {
    /// Sign a claim map into a compact token
    fn encode(&self, claims: &Map<String, Value>) -> Result<String>;

    /// Verify a compact token and return its claim map
    fn decode(&self, token: &str) -> Result<Map<String, Value>>;
}

#[derive(Clone)]
pub struct JsonWebTokenSigner {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JsonWebTokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonWebTokenSigner")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl JsonWebTokenSigner {
    /// HMAC signer (`HS256`, `HS384`, `HS512`)
    ///
    /// # Errors
    /// Returns a configuration error for an empty secret or a non-HMAC algorithm
    pub fn from_secret(secret: &str, algorithm: Algorithm) -> Result<Self> {
        if !is_hmac(algorithm) {
            return Err(ConfigError::InvalidValue(format!(
                "{:?} needs a key pair, not a secret",
                algorithm
            ))
            .into());
        }
        if secret.is_empty() {
            return Err(ConfigError::MissingRequired("jwt.secret".to_string()).into());
        }

        Ok(Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    /// Asymmetric signer from PEM-encoded keys
    ///
    /// # Arguments
    /// * `private_pem` - Key used to sign
    /// * `public_pem` - Key used to verify
    /// * `algorithm` - One of the RS*, PS*, ES* or EdDSA algorithms
    ///
    /// # Errors
    /// Returns a configuration error if a key does not parse for the algorithm
    pub fn from_pem(private_pem: &str, public_pem: &str, algorithm: Algorithm) -> Result<Self> {
        let invalid = |which: &str, e: jsonwebtoken::errors::Error| {
            ConfigError::InvalidValue(format!("jwt.keys.{}: {}", which, e))
        };

        let private = private_pem.as_bytes();
        let public = public_pem.as_bytes();

        let (encoding_key, decoding_key) = match algorithm {
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => (
                EncodingKey::from_rsa_pem(private).map_err(|e| invalid("private", e))?,
                DecodingKey::from_rsa_pem(public).map_err(|e| invalid("public", e))?,
            ),
            Algorithm::ES256 | Algorithm::ES384 => (
                EncodingKey::from_ec_pem(private).map_err(|e| invalid("private", e))?,
                DecodingKey::from_ec_pem(public).map_err(|e| invalid("public", e))?,
            ),
            Algorithm::EdDSA => (
                EncodingKey::from_ed_pem(private).map_err(|e| invalid("private", e))?,
                DecodingKey::from_ed_pem(public).map_err(|e| invalid("public", e))?,
            ),
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                return Err(ConfigError::InvalidValue(format!(
                    "{:?} needs a secret, not a key pair",
                    algorithm
                ))
                .into())
            }
        };

        Ok(Self {
            algorithm,
            encoding_key,
            decoding_key,
        })
    }

    /// Build the signer described by the settings
    pub fn from_settings(settings: &JwtSettings) -> Result<Self> {
        let algorithm = parse_algorithm(&settings.algo)?;

        if is_hmac(algorithm) {
            return Self::from_secret(&settings.secret, algorithm);
        }

        let private = settings
            .keys
            .private
            .as_deref()
            .ok_or_else(|| ConfigError::MissingRequired("jwt.keys.private".to_string()))?;
        let public = settings
            .keys
            .public
            .as_deref()
            .ok_or_else(|| ConfigError::MissingRequired("jwt.keys.public".to_string()))?;

        Self::from_pem(private, public, algorithm)
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.algorithm);
        // Claim rules run in the payload validator against the injected clock
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        validation
    }
}

impl Signer for JsonWebTokenSigner {
    fn encode(&self, claims: &Map<String, Value>) -> Result<String> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenNotCreated(e.to_string()).into())
    }

    fn decode(&self, token: &str) -> Result<Map<String, Value>> {
        decode::<Map<String, Value>>(token, &self.decoding_key, &self.validation())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => AuthError::SignatureInvalid.into(),
                _ => AuthError::invalid(format!("Could not decode token: {}", e)).into(),
            })
    }
}

/// Parse an algorithm name such as `"HS256"`
pub fn parse_algorithm(name: &str) -> Result<Algorithm> {
    Algorithm::from_str(name).map_err(|_| {
        ConfigError::InvalidValue(format!("unsupported algorithm [{}]", name)).into()
    })
}

fn is_hmac(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
    )
}

/// Generate a random alphanumeric secret suitable for HMAC signing
pub fn generate_secret() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SECRET_LENGTH)
        .map(char::from)
        .collect()
}
