//! The request gate.

use crate::config::EnforcementConfig;
use crate::decision::{BlockReason, Decision, PassReason};
use crate::error::IdentityLookupError;
use crate::request::RequestHead;
use crate::resolver::PrincipalResolver;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Authoritative second-factor gate.
///
/// Holds only the immutable configuration and the resolver, so one value
/// is shared by every worker and evaluations never wait on each other.
#[derive(Clone)]
pub struct Gate {
    config: Arc<EnforcementConfig>,
    resolver: Arc<dyn PrincipalResolver>,
}

impl Gate {
    /// Creates a gate over a validated configuration.
    pub fn new(config: EnforcementConfig, resolver: Arc<dyn PrincipalResolver>) -> Self {
        Self {
            config: Arc::new(config),
            resolver,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &EnforcementConfig {
        &self.config
    }

    /// Decides what happens to a request.
    ///
    /// Never fails: identity store errors and timeouts degrade to
    /// [`PassReason::LookupFailed`] and are logged as warnings.
    #[instrument(skip_all, fields(method = %request.method(), path = request.path()))]
    pub async fn evaluate(&self, request: &RequestHead) -> Decision {
        let config = &*self.config;

        if !config.enabled() {
            return Decision::PassThrough(PassReason::EnforcementDisabled);
        }

        if request.is_preflight() {
            return Decision::PassThrough(PassReason::Preflight);
        }

        if let Some(prefix) = config.allowed_paths().first_match(request.path()) {
            debug!(prefix, "path allowed without second factor");
            return Decision::PassThrough(PassReason::AllowedPath);
        }

        if !request.carries_credentials() {
            return Decision::PassThrough(PassReason::NoCredentials);
        }

        if config.allow_safe_methods() && request.is_safe_method() {
            return Decision::PassThrough(PassReason::SafeMethod);
        }

        let lookup = tokio::time::timeout(config.lookup_timeout(), self.resolver.resolve(request))
            .await
            .unwrap_or_else(|_| {
                Err(IdentityLookupError::Timeout {
                    after_ms: u64::try_from(config.lookup_timeout().as_millis())
                        .unwrap_or(u64::MAX),
                }
                .into())
            });
        let principal = match lookup {
            Ok(Some(principal)) => principal,
            Ok(None) => return Decision::PassThrough(PassReason::Unauthenticated),
            Err(report) => {
                warn!(error = %report, "identity lookup failed; enforcement inert for this request");
                return Decision::PassThrough(PassReason::LookupFailed);
            }
        };

        if config.exemptions().contains(principal.identity()) {
            debug!(identity = %principal.identity(), "principal exempt");
            return Decision::PassThrough(PassReason::Exempt);
        }

        if principal.has_second_factor() {
            return Decision::PassThrough(PassReason::Compliant);
        }

        let identity = principal.identity().clone();
        let redirect_to = config.redirect_target().to_string();
        if request.is_api_style(config.api_paths()) {
            info!(%identity, "blocking API request from principal without second factor");
            Decision::Block {
                reason: BlockReason::SecondFactorRequired,
                identity,
                redirect_to,
            }
        } else {
            info!(%identity, redirect_to = %redirect_to, "redirecting principal without second factor");
            Decision::Redirect {
                target: redirect_to,
                identity,
            }
        }
    }
}
