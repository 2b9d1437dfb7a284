use std::fmt;
use std::str::FromStr;

use crate::error::AuthError;
use crate::validators::TokenValidator;

/// A string guaranteed to have the `header.payload.signature` shape
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Result<Self, AuthError> {
        let value = value.into();
        TokenValidator::check(&value)?;
        Ok(Self(value))
    }

    pub fn get(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl FromStr for Token {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Token::new(s)
    }
}

impl TryFrom<String> for Token {
    type Error = AuthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Token::new(value)
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Debug output shows the header segment only.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = self.0.split('.').next().unwrap_or_default();
        write!(f, "Token({}.…)", header)
    }
}
