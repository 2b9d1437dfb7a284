//! Configuration
//!
//! Settings are read with the `config` crate from an optional `jwtauth` file
//! (`jwtauth.toml`, `jwtauth.yaml`, ...) and then from `JWTAUTH_`-prefixed
//! environment variables, e.g. `JWTAUTH_JWT__SECRET` or `JWTAUTH_JWT__TTL`.

use std::str::FromStr;

use jsonwebtoken::Algorithm;

use crate::error::ConfigError;
use crate::factory::DEFAULT_TTL;
use crate::validators::{DEFAULT_REFRESH_TTL, DEFAULT_REQUIRED_CLAIMS};

#[derive(serde::Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub jwt: JwtSettings,
}

/// PEM key material for the asymmetric algorithms
#[derive(serde::Deserialize, Clone, Default)]
pub struct KeySettings {
    pub public: Option<String>,
    pub private: Option<String>,
}

/// JWT authentication settings
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_algo")]
    pub algo: String,
    #[serde(default)]
    pub keys: KeySettings,
    #[serde(default)]
    pub issuer: String,
    #[serde(default = "default_ttl")]
    pub ttl: Option<i64>, // minutes, None = tokens never expire
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl: Option<i64>, // minutes, None = refreshable forever
    #[serde(default = "default_required_claims")]
    pub required_claims: Vec<String>,
    #[serde(default)]
    pub persistent_claims: Vec<String>,
    #[serde(default = "default_blacklist_enabled")]
    pub blacklist_enabled: bool,
    #[serde(default)]
    pub blacklist_grace_period: i64, // seconds
    #[serde(default = "default_blacklist_key")]
    pub blacklist_key: String,
}

fn default_algo() -> String {
    "HS256".to_string()
}

fn default_ttl() -> Option<i64> {
    Some(DEFAULT_TTL)
}

fn default_refresh_ttl() -> Option<i64> {
    Some(DEFAULT_REFRESH_TTL)
}

fn default_required_claims() -> Vec<String> {
    DEFAULT_REQUIRED_CLAIMS.iter().map(|c| c.to_string()).collect()
}

fn default_blacklist_enabled() -> bool {
    true
}

fn default_blacklist_key() -> String {
    "jti".to_string()
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            secret: String::new(),
            algo: default_algo(),
            keys: KeySettings::default(),
            issuer: String::new(),
            ttl: default_ttl(),
            refresh_ttl: default_refresh_ttl(),
            required_claims: default_required_claims(),
            persistent_claims: Vec::new(),
            blacklist_enabled: default_blacklist_enabled(),
            blacklist_grace_period: 0,
            blacklist_key: default_blacklist_key(),
        }
    }
}

impl JwtSettings {
    /// Reject settings no manager could be built from
    pub fn validate(&self) -> Result<(), ConfigError> {
        let algorithm = Algorithm::from_str(&self.algo).map_err(|_| {
            ConfigError::InvalidValue(format!("jwt.algo: unsupported algorithm [{}]", self.algo))
        })?;

        match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                if self.secret.is_empty() {
                    return Err(ConfigError::MissingRequired("jwt.secret".to_string()));
                }
            }
            _ => {
                if self.keys.private.is_none() {
                    return Err(ConfigError::MissingRequired("jwt.keys.private".to_string()));
                }
                if self.keys.public.is_none() {
                    return Err(ConfigError::MissingRequired("jwt.keys.public".to_string()));
                }
            }
        }

        if matches!(self.ttl, Some(ttl) if ttl <= 0) {
            return Err(ConfigError::InvalidValue(
                "jwt.ttl must be a positive number of minutes".to_string(),
            ));
        }
        if matches!(self.refresh_ttl, Some(ttl) if ttl <= 0) {
            return Err(ConfigError::InvalidValue(
                "jwt.refresh_ttl must be a positive number of minutes".to_string(),
            ));
        }
        if self.blacklist_grace_period < 0 {
            return Err(ConfigError::InvalidValue(
                "jwt.blacklist_grace_period cannot be negative".to_string(),
            ));
        }
        if self.blacklist_key.is_empty() {
            return Err(ConfigError::MissingRequired("jwt.blacklist_key".to_string()));
        }

        Ok(())
    }
}

pub fn get_configuration() -> Result<Settings, ConfigError> {
    get_configuration_from("jwtauth")
}

/// Load settings from the named file (extension optional, file optional)
/// layered under the environment
pub fn get_configuration_from(file: &str) -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(file).required(false))
        .add_source(
            config::Environment::with_prefix("JWTAUTH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let settings = settings.try_deserialize::<Settings>()?;
    settings.jwt.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_settings() -> JwtSettings {
        JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            issuer: "test".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let settings = JwtSettings::default();
        assert_eq!(settings.algo, "HS256");
        assert_eq!(settings.ttl, Some(60));
        assert_eq!(settings.refresh_ttl, Some(20160));
        assert_eq!(settings.required_claims, ["iss", "iat", "exp", "nbf", "sub", "jti"]);
        assert!(settings.persistent_claims.is_empty());
        assert!(settings.blacklist_enabled);
        assert_eq!(settings.blacklist_grace_period, 0);
        assert_eq!(settings.blacklist_key, "jti");
    }

    #[test]
    fn test_validate_accepts_complete_settings() {
        assert!(get_test_settings().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let missing_secret = JwtSettings::default();
        assert!(matches!(
            missing_secret.validate(),
            Err(ConfigError::MissingRequired(_))
        ));

        let bad_algo = JwtSettings {
            algo: "HS1024".to_string(),
            ..get_test_settings()
        };
        assert!(matches!(bad_algo.validate(), Err(ConfigError::InvalidValue(_))));

        let missing_keys = JwtSettings {
            algo: "RS256".to_string(),
            ..get_test_settings()
        };
        assert!(matches!(
            missing_keys.validate(),
            Err(ConfigError::MissingRequired(_))
        ));

        let zero_ttl = JwtSettings {
            ttl: Some(0),
            ..get_test_settings()
        };
        assert!(zero_ttl.validate().is_err());

        let negative_grace = JwtSettings {
            blacklist_grace_period: -1,
            ..get_test_settings()
        };
        assert!(negative_grace.validate().is_err());
    }

    #[test]
    fn test_unlimited_windows_are_valid() {
        let settings = JwtSettings {
            ttl: None,
            refresh_ttl: None,
            ..get_test_settings()
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("jwtauth-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"
[jwt]
secret = "file-secret"
issuer = "http://example.com"
ttl = 15
persistent_claims = ["role"]
blacklist_grace_period = 30
"#,
        )
        .unwrap();

        let settings = get_configuration_from(path.to_str().unwrap()).map_err(|e| e.to_string());
        std::fs::remove_file(&path).ok();

        let settings = settings.expect("Failed to load configuration");
        assert_eq!(settings.jwt.secret, "file-secret");
        assert_eq!(settings.jwt.issuer, "http://example.com");
        assert_eq!(settings.jwt.ttl, Some(15));
        assert_eq!(settings.jwt.refresh_ttl, Some(20160));
        assert_eq!(settings.jwt.persistent_claims, ["role"]);
        assert_eq!(settings.jwt.blacklist_grace_period, 30);
        assert!(settings.jwt.blacklist_enabled);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let path = std::env::temp_dir().join(format!("jwtauth-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[jwt]\nissuer = \"no secret\"\n").unwrap();

        let result = get_configuration_from(path.to_str().unwrap()).map(|_| ());
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(ConfigError::MissingRequired(_))));
    }
}
