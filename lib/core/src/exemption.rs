//! Identities excluded from enforcement.

use crate::principal::Identity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Set of exempt identities, stored normalized.
///
/// Matching is case-insensitive and ignores surrounding whitespace, so
/// `Admin@Example.com` in configuration exempts `admin@example.com`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ExemptionSet {
    identities: BTreeSet<String>,
}

impl ExemptionSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a comma-separated list, skipping empty entries.
    #[must_use]
    pub fn parse_list(list: &str) -> Self {
        list.split(',').collect()
    }

    /// Returns whether the identity is exempt.
    #[must_use]
    pub fn contains(&self, identity: &Identity) -> bool {
        self.identities.contains(&identity.normalized())
    }

    /// Returns the number of exempt identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    /// Returns whether no identity is exempt.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Iterates over the normalized identities in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.identities.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for ExemptionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let identities = iter
            .into_iter()
            .map(|raw| Identity::new(raw.as_ref()).normalized())
            .filter(|normalized| !normalized.is_empty())
            .collect();
        Self { identities }
    }
}

impl From<Vec<String>> for ExemptionSet {
    fn from(list: Vec<String>) -> Self {
        list.into_iter().collect()
    }
}

impl From<ExemptionSet> for Vec<String> {
    fn from(set: ExemptionSet) -> Self {
        set.identities.into_iter().collect()
    }
}
