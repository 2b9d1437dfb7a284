//! Immutable, validated token payload
//!
//! A `Payload` can only be obtained by validating a claim collection (or by
//! explicitly vouching that it was validated already). It exposes read
//! accessors and nothing else.

use std::fmt;
use std::ops::Index;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use crate::claims::{Claim, ClaimCollection};
use crate::error::{AuthError, Error};
use crate::validators::{Mode, PayloadValidator};

/// Conventional accessor names mapped to claim names
const ACCESSORS: &[(&str, &str)] = &[
    ("Subject", "sub"),
    ("Issuer", "iss"),
    ("Audience", "aud"),
    ("Expiration", "exp"),
    ("NotBefore", "nbf"),
    ("IssuedAt", "iat"),
    ("JwtId", "jti"),
];

#[derive(Debug, Clone)]
pub struct Payload {
    claims: ClaimCollection,
}

impl Payload {
    /// Build a payload, validating the claims under `mode`
    ///
    /// # Errors
    /// Whatever the validator rejects; no payload is returned in that case.
    pub fn new(
        claims: ClaimCollection,
        validator: &PayloadValidator,
        mode: Mode,
    ) -> Result<Self, AuthError> {
        validator.check(&claims, mode)?;
        Ok(Self { claims })
    }

    /// Wrap claims the caller has already validated
    pub fn already_validated(claims: ClaimCollection) -> Self {
        Self { claims }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name).map(Claim::value)
    }

    /// Look up several claims at once, in the order given
    pub fn get_many<I, S>(&self, names: I) -> Vec<Option<&Value>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| self.get(name.as_ref()))
            .collect()
    }

    /// Look up the claim whose name the selector produces
    pub fn get_with<F, S>(&self, selector: F) -> Option<&Value>
    where
        F: FnOnce() -> S,
        S: AsRef<str>,
    {
        self.get(selector().as_ref())
    }

    pub fn claim(&self, name: &str) -> Option<&Claim> {
        self.claims.get(name)
    }

    /// Whether a claim with the same name is present
    pub fn has(&self, claim: &Claim) -> bool {
        self.claims.contains(claim.name())
    }

    pub fn has_key(&self, name: &str) -> bool {
        self.claims.contains(name)
    }

    pub fn claims(&self) -> &ClaimCollection {
        &self.claims
    }

    pub fn iter(&self) -> impl Iterator<Item = &Claim> {
        self.claims.iter()
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn to_map(&self) -> Map<String, Value> {
        self.claims.to_map()
    }

    pub fn to_json(&self) -> String {
        Value::Object(self.to_map()).to_string()
    }

    /// Read a claim through its conventional name, e.g. `"Subject"` → `sub`.
    /// A leading `get` is accepted (`"getSubject"`).
    ///
    /// # Errors
    /// `UnknownClaimAccessor` when the name is not in the table or the
    /// payload does not carry that claim.
    pub fn accessor(&self, name: &str) -> Result<&Value, Error> {
        let key = name.strip_prefix("get").unwrap_or(name);

        ACCESSORS
            .iter()
            .find(|(accessor, _)| *accessor == key)
            .and_then(|(_, claim)| self.get(claim))
            .ok_or_else(|| Error::UnknownClaimAccessor(name.to_string()))
    }

    /// True iff every key of `values` is present and equal.
    ///
    /// Strict mode compares type and value; otherwise scalars are compared
    /// by their string form (`1` matches `"1"`). Empty `values` never match.
    pub fn matches(&self, values: &Map<String, Value>, strict: bool) -> bool {
        if values.is_empty() {
            return false;
        }

        values.iter().all(|(name, expected)| match self.get(name) {
            Some(actual) if strict => actual == expected,
            Some(actual) => loose_eq(actual, expected),
            None => false,
        })
    }

    pub fn matches_strict(&self, values: &Map<String, Value>) -> bool {
        self.matches(values, true)
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (scalar_string(a), scalar_string(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Equal iff the normalized name → value maps are equal
impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        self.to_map() == other.to_map()
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json())
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for claim in self.iter() {
            map.serialize_entry(claim.name(), claim.value())?;
        }
        map.end()
    }
}

impl Index<&str> for Payload {
    type Output = Value;

    /// # Panics
    /// When the claim is absent, like `HashMap` indexing.
    fn index(&self, name: &str) -> &Value {
        match self.get(name) {
            Some(value) => value,
            None => panic!("The claim [{}] does not exist on the payload.", name),
        }
    }
}

impl<'a> IntoIterator for &'a Payload {
    type Item = &'a Claim;
    type IntoIter = indexmap::map::Values<'a, String, Claim>;

    fn into_iter(self) -> Self::IntoIter {
        (&self.claims).into_iter()
    }
}
