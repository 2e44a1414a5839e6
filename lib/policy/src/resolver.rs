//! The seam between the gate and the upstream identity store.

use crate::error::IdentityLookupError;
use crate::request::RequestHead;
use async_trait::async_trait;
use mfa_gate_core::Principal;
use rootcause::prelude::Report;

/// Resolves the principal behind a request.
///
/// Implementations must not cache across requests: a user who finishes
/// enrolling a second factor has to be let through on the next request.
#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    /// Returns the principal, or `None` when the request has no valid
    /// session.
    ///
    /// # Errors
    ///
    /// Returns an error when the identity store cannot give a definitive
    /// answer. The gate fails open on any error.
    async fn resolve(
        &self,
        request: &RequestHead,
    ) -> Result<Option<Principal>, Report<IdentityLookupError>>;
}
