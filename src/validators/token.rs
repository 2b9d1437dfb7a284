//! Token shape validation
//!
//! A signed token is `header.payload.signature`: exactly three segments, none
//! blank, and no stray whitespace around any of them.

use crate::error::AuthError;

const SEGMENT_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, Default)]
pub struct TokenValidator;

impl TokenValidator {
    /// Check the structure of a raw token string
    ///
    /// # Errors
    /// - `WrongNumberOfSegments` when splitting on `.` does not yield 3 parts
    /// - `MalformedToken` when a part is blank or carries surrounding whitespace
    pub fn check(value: &str) -> Result<&str, AuthError> {
        let parts: Vec<&str> = value.split('.').collect();

        if parts.len() != SEGMENT_COUNT {
            return Err(AuthError::WrongNumberOfSegments);
        }

        let trimmed: Vec<&str> = parts
            .iter()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect();

        if trimmed.len() != SEGMENT_COUNT || trimmed.join(".") != value {
            return Err(AuthError::MalformedToken);
        }

        Ok(value)
    }

    pub fn is_valid(value: &str) -> bool {
        Self::check(value).is_ok()
    }
}
