//! Validators module
//!
//! - `TokenValidator`: the 3-segment shape of a raw token string
//! - `PayloadValidator`: required claims plus the temporal rules of the
//!   active `Mode`

mod payload;
mod token;

pub use payload::{PayloadValidator, DEFAULT_REFRESH_TTL, DEFAULT_REQUIRED_CLAIMS};
pub use token::TokenValidator;

/// Which temporal claim governs staleness.
///
/// Passed explicitly to every check instead of living on shared state, so one
/// validator or factory can serve normal and refresh calls concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// `exp`, `nbf` and `iat` must all hold against "now"
    #[default]
    Normal,
    /// Only the refresh window anchored at `iat` matters
    Refresh,
}

impl Mode {
    pub fn is_refresh(self) -> bool {
        self == Mode::Refresh
    }
}
