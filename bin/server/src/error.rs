//! Domain error types for the gate server.
//!
//! Configuration problems are reported with the policy crate's
//! `ConfigurationError`; these cover the server's own moving parts.

use std::fmt;

/// Errors from starting or running the gate server.
#[derive(Debug)]
pub enum ServerError {
    /// The upstream URL cannot be used.
    InvalidUpstream { url: String, reason: String },
    /// The outbound HTTP client could not be built.
    HttpClient { details: String },
    /// The listen address could not be bound.
    Bind { addr: String, details: String },
    /// The server stopped with an error.
    Serve { details: String },
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUpstream { url, reason } => {
                write!(f, "invalid upstream url '{}': {}", url, reason)
            }
            Self::HttpClient { details } => write!(f, "failed to build http client: {}", details),
            Self::Bind { addr, details } => write!(f, "failed to bind {}: {}", addr, details),
            Self::Serve { details } => write!(f, "server error: {}", details),
        }
    }
}

impl std::error::Error for ServerError {}

/// Errors from forwarding a request to the upstream.
#[derive(Debug)]
pub enum ProxyError {
    /// The upstream could not be reached or the exchange failed.
    Upstream { details: String },
    /// The inbound request could not be mapped to an upstream URL.
    InvalidTarget { path: String, details: String },
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upstream { details } => write!(f, "upstream request failed: {}", details),
            Self::InvalidTarget { path, details } => {
                write!(f, "cannot forward '{}': {}", path, details)
            }
        }
    }
}

impl std::error::Error for ProxyError {}
