//! Page location as seen by a single-page application.

/// Path and fragment of the current page.
///
/// Hash-routed applications keep their route in the fragment, so both parts
/// take part in matching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    path: String,
    fragment: String,
}

impl Location {
    /// Creates a location; a leading `#` on the fragment is dropped.
    #[must_use]
    pub fn new(path: impl Into<String>, fragment: impl AsRef<str>) -> Self {
        Self {
            path: path.into(),
            fragment: fragment.as_ref().trim_start_matches('#').to_string(),
        }
    }

    /// Parses `/path?query#fragment`; the query is ignored.
    #[must_use]
    pub fn parse(url: &str) -> Self {
        let (rest, fragment) = url.split_once('#').unwrap_or((url, ""));
        let path = rest.split('?').next().unwrap_or_default();
        Self::new(path, fragment)
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    fn fragment_route(&self) -> Option<String> {
        let route = self.fragment.trim_start_matches('!');
        if route.is_empty() {
            return None;
        }
        Some(if route.starts_with('/') {
            route.to_string()
        } else {
            format!("/{route}")
        })
    }
}

/// Route prefixes of the self-service configuration area.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationArea {
    prefixes: Vec<String>,
}

impl ConfigurationArea {
    /// Builds the matcher; prefixes are anchored at `/`.
    #[must_use]
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let prefixes = prefixes
            .into_iter()
            .map(|prefix| prefix.as_ref().trim().trim_start_matches('/').to_string())
            .filter(|prefix| !prefix.is_empty())
            .map(|prefix| format!("/{prefix}"))
            .collect();
        Self { prefixes }
    }

    /// Returns whether the location is inside the configuration area.
    #[must_use]
    pub fn contains(&self, location: &Location) -> bool {
        let route = location.fragment_route();
        self.prefixes.iter().any(|prefix| {
            location.path.starts_with(prefix.as_str())
                || route
                    .as_deref()
                    .is_some_and(|route| route.starts_with(prefix.as_str()))
        })
    }
}
