//! The parts of an inbound request the gate looks at.

use crate::paths::PathPrefixes;
use http::{HeaderMap, Method, header};

/// Method, path and headers of an inbound request.
///
/// The body is never read. `carries_credentials` is decided by the host,
/// which knows how sessions are transported.
#[derive(Debug, Clone)]
pub struct RequestHead {
    method: Method,
    path: String,
    headers: HeaderMap,
    carries_credentials: bool,
}

impl RequestHead {
    /// Creates a request head that is assumed to carry credentials.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            method,
            path: path.into(),
            headers,
            carries_credentials: true,
        }
    }

    /// Records whether the request carries session credentials.
    #[must_use]
    pub fn with_credentials(mut self, carries_credentials: bool) -> Self {
        self.carries_credentials = carries_credentials;
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn carries_credentials(&self) -> bool {
        self.carries_credentials
    }

    /// CORS preflight requests carry no credentials and never reach the
    /// application logic.
    #[must_use]
    pub fn is_preflight(&self) -> bool {
        self.method == Method::OPTIONS
    }

    #[must_use]
    pub fn is_safe_method(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }

    /// Returns whether the request comes from a script rather than a
    /// browser navigation.
    #[must_use]
    pub fn is_api_style(&self, api_paths: &PathPrefixes) -> bool {
        let header_contains = |name: header::HeaderName, needle: &str| {
            self.headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .is_some_and(|value| value.contains(needle))
        };

        api_paths.covers(&self.path)
            || header_contains(header::CONTENT_TYPE, "application/json")
            || self
                .headers
                .get(header::ACCEPT)
                .and_then(|value| value.to_str().ok())
                .is_some_and(|value| value.starts_with("application/json"))
            || header_contains(
                header::HeaderName::from_static("x-requested-with"),
                "XMLHttpRequest",
            )
    }
}
