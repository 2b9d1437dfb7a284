//! Claims module
//!
//! Typed claims with creation-time and usage-time rules, and the ordered
//! collection a payload is built from.

mod claim;
mod collection;

pub use claim::{
    Claim, ClaimInput, ClaimKind, TemporalClaim, AUDIENCE, EXPIRATION, ISSUED_AT, ISSUER,
    JWT_ID, NOT_BEFORE, SUBJECT,
};
pub use collection::ClaimCollection;
