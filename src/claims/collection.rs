//! Ordered, name-unique set of claims

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::claims::Claim;
use crate::error::AuthError;
use crate::validators::Mode;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClaimCollection {
    claims: IndexMap<String, Claim>,
}

impl ClaimCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a claim, replacing any same-named claim in its original position
    pub fn insert(&mut self, claim: Claim) -> Option<Claim> {
        self.claims.insert(claim.name().to_string(), claim)
    }

    pub fn get(&self, name: &str) -> Option<&Claim> {
        self.claims.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.claims.contains_key(name)
    }

    /// True iff every given name is present. An empty list is never satisfied.
    pub fn has_all_claims<I, S>(&self, names: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen_any = false;
        for name in names {
            seen_any = true;
            if !self.contains(name.as_ref()) {
                return false;
            }
        }
        seen_any
    }

    /// Run the mode-appropriate rule of every claim, in insertion order.
    ///
    /// Stops at the first failure. In refresh mode a `None` window means
    /// unlimited, so no refresh rule can fail.
    pub fn validate(
        &self,
        mode: Mode,
        refresh_ttl: Option<i64>,
        now: i64,
    ) -> Result<&Self, AuthError> {
        for claim in self.claims.values() {
            match (mode, refresh_ttl) {
                (Mode::Normal, _) => claim.validate_payload(now)?,
                (Mode::Refresh, Some(ttl)) => claim.validate_refresh(ttl, now)?,
                (Mode::Refresh, None) => {}
            }
        }
        Ok(self)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.claims.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Claim> {
        self.claims.values()
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Flat name → value map, in insertion order
    pub fn to_map(&self) -> Map<String, Value> {
        self.claims
            .iter()
            .map(|(name, claim)| (name.clone(), claim.value().clone()))
            .collect()
    }
}

impl FromIterator<Claim> for ClaimCollection {
    fn from_iter<T: IntoIterator<Item = Claim>>(iter: T) -> Self {
        let mut collection = ClaimCollection::new();
        for claim in iter {
            collection.insert(claim);
        }
        collection
    }
}

impl<'a> IntoIterator for &'a ClaimCollection {
    type Item = &'a Claim;
    type IntoIter = indexmap::map::Values<'a, String, Claim>;

    fn into_iter(self) -> Self::IntoIter {
        self.claims.values()
    }
}
