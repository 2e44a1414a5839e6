//! Error types for the policy crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `ConfigurationError`: invalid enforcement configuration, fatal at startup
//! - `IdentityLookupError`: the identity store could not answer; the gate
//!   fails open on these

use std::fmt;

/// Errors from validating enforcement configuration.
///
/// Any of these would surface at request time as a redirect loop or a
/// silently disabled gate, so they are raised before the server starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The redirect target is not covered by any allowed path prefix.
    RedirectTargetNotAllowed { target: String },
    /// The redirect target is not an absolute path.
    InvalidRedirectTarget { target: String, reason: String },
    /// A path prefix is empty after normalization and would allow every path.
    EmptyPathPrefix { list: &'static str },
    /// The identity lookup timeout is zero.
    ZeroLookupTimeout,
    /// The path static assets are mounted under cannot be routed.
    InvalidMountPath { path: String, reason: &'static str },
    /// The configuration source could not be read or deserialized.
    Load { details: String },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RedirectTargetNotAllowed { target } => {
                write!(
                    f,
                    "redirect target '{target}' is not covered by the allowed path prefixes; \
                     non-compliant users would loop forever"
                )
            }
            Self::InvalidRedirectTarget { target, reason } => {
                write!(f, "invalid redirect target '{target}': {reason}")
            }
            Self::EmptyPathPrefix { list } => {
                write!(f, "empty prefix in {list} would match every path")
            }
            Self::ZeroLookupTimeout => write!(f, "identity lookup timeout must be non-zero"),
            Self::InvalidMountPath { path, reason } => {
                write!(f, "invalid mount path '{path}': {reason}")
            }
            Self::Load { details } => write!(f, "failed to load configuration: {details}"),
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// Errors from resolving the principal of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityLookupError {
    /// The identity store could not be reached.
    Unreachable { details: String },
    /// The identity store did not answer in time.
    Timeout { after_ms: u64 },
    /// The identity store answered with a status that is neither success
    /// nor "unauthenticated".
    UnexpectedStatus { status: u16 },
    /// The identity store answered with a payload that could not be decoded.
    InvalidPayload { details: String },
}

impl fmt::Display for IdentityLookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable { details } => {
                write!(f, "identity store unreachable: {details}")
            }
            Self::Timeout { after_ms } => {
                write!(f, "identity lookup timed out after {after_ms}ms")
            }
            Self::UnexpectedStatus { status } => {
                write!(f, "identity store answered with status {status}")
            }
            Self::InvalidPayload { details } => {
                write!(f, "identity store payload invalid: {details}")
            }
        }
    }
}

impl std::error::Error for IdentityLookupError {}
