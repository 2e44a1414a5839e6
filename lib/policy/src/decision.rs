//! Per-request gate outcome.

use mfa_gate_core::Identity;
use std::fmt;

/// Why a request was let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassReason {
    /// Enforcement is switched off.
    EnforcementDisabled,
    /// CORS preflight.
    Preflight,
    /// The path is reachable without a second factor.
    AllowedPath,
    /// The request carries no session credentials.
    NoCredentials,
    /// Read-only posture and a safe method.
    SafeMethod,
    /// The identity store reports no authenticated session.
    Unauthenticated,
    /// The identity store failed; enforcement is inert for this request.
    LookupFailed,
    /// The principal is exempt.
    Exempt,
    /// The principal has a second factor configured.
    Compliant,
}

impl PassReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EnforcementDisabled => "enforcement_disabled",
            Self::Preflight => "preflight",
            Self::AllowedPath => "allowed_path",
            Self::NoCredentials => "no_credentials",
            Self::SafeMethod => "safe_method",
            Self::Unauthenticated => "unauthenticated",
            Self::LookupFailed => "lookup_failed",
            Self::Exempt => "exempt",
            Self::Compliant => "compliant",
        }
    }
}

impl fmt::Display for PassReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a request was stopped without a redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockReason {
    /// An API client must configure a second factor before continuing.
    SecondFactorRequired,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SecondFactorRequired => f.write_str("second_factor_required"),
        }
    }
}

/// The gate's decision for one request.
///
/// Computed fresh for every request and never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Forward the request unchanged.
    PassThrough(PassReason),
    /// Answer with a redirect to the self-service configuration page.
    Redirect { target: String, identity: Identity },
    /// Answer with an error response pointing at the configuration page.
    Block {
        reason: BlockReason,
        identity: Identity,
        redirect_to: String,
    },
}

impl Decision {
    /// Returns whether the request is forwarded.
    #[must_use]
    pub fn is_pass_through(&self) -> bool {
        matches!(self, Self::PassThrough(_))
    }

    /// Returns the pass reason, if forwarded.
    #[must_use]
    pub fn pass_reason(&self) -> Option<PassReason> {
        match self {
            Self::PassThrough(reason) => Some(*reason),
            Self::Redirect { .. } | Self::Block { .. } => None,
        }
    }
}
