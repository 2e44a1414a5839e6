//! Ordered path-prefix lists.
//!
//! Prefixes and request paths are compared with their leading slashes
//! removed, so `/api/auth/login` and `api/auth/login` are the same entry.
//! The comparison is otherwise a plain, case-sensitive `starts_with`.

use serde::Serialize;

/// An ordered, de-duplicated set of path prefixes; first match wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PathPrefixes {
    prefixes: Vec<String>,
}

fn strip_leading_slashes(path: &str) -> &str {
    path.trim_start_matches('/')
}

impl PathPrefixes {
    /// Builds the list, keeping the first occurrence of each prefix.
    ///
    /// Returns `None` if any entry is empty after normalization, since such
    /// an entry would match every path.
    #[must_use]
    pub fn new<I, S>(entries: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut prefixes: Vec<String> = Vec::new();
        for entry in entries {
            let normalized = strip_leading_slashes(entry.as_ref().trim());
            if normalized.is_empty() {
                return None;
            }
            if !prefixes.iter().any(|existing| existing == normalized) {
                prefixes.push(normalized.to_string());
            }
        }
        Some(Self { prefixes })
    }

    /// Returns the first prefix matching the path.
    #[must_use]
    pub fn first_match(&self, path: &str) -> Option<&str> {
        let path = strip_leading_slashes(path);
        self.prefixes
            .iter()
            .find(|prefix| path.starts_with(prefix.as_str()))
            .map(String::as_str)
    }

    /// Returns whether any prefix matches the path.
    #[must_use]
    pub fn covers(&self, path: &str) -> bool {
        self.first_match(path).is_some()
    }

    /// Returns the normalized prefixes in match order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.prefixes.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}
