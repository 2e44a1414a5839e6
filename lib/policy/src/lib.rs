//! Second-factor enforcement policy for mfa-gate.
//!
//! This crate provides:
//! - `EnforcementSettings`: raw, serde-loaded configuration
//! - `EnforcementConfig`: the validated, immutable form loaded once at startup
//! - `Gate`: the per-request decision (`Decision`)
//! - `PrincipalResolver`: the seam to the upstream session/identity store
//!
//! # Decision order
//!
//! 1. Enforcement disabled: pass, without touching the identity store.
//! 2. CORS preflight: pass.
//! 3. Path under an allowed prefix: pass, whatever the session state.
//! 4. No session credentials on the request: pass.
//! 5. Read-only posture and a safe method: pass.
//! 6. Principal lookup. No session, or a failed lookup (fail open): pass.
//! 7. Exempt principal, or any second factor configured: pass.
//! 8. Otherwise: block API-style requests, redirect everything else.
//!
//! # Example
//!
//! ```
//! use mfa_gate_policy::{EnforcementConfig, EnforcementSettings};
//!
//! let mut settings = EnforcementSettings::default();
//! settings.enabled = true;
//! settings.redirect_target = "/account/security".to_string();
//!
//! // The redirect target must be reachable without a second factor.
//! assert!(EnforcementConfig::from_settings(settings.clone()).is_err());
//!
//! settings.additional_allowed_path_prefixes.push("/account/security".to_string());
//! let config = EnforcementConfig::from_settings(settings).expect("valid");
//! assert!(config.allowed_paths().covers("/account/security"));
//! ```

pub mod config;
pub mod decision;
pub mod error;
pub mod gate;
pub mod paths;
pub mod request;
pub mod resolver;
pub mod settings;

pub use config::EnforcementConfig;
pub use decision::{BlockReason, Decision, PassReason};
pub use error::{ConfigurationError, IdentityLookupError};
pub use gate::Gate;
pub use paths::PathPrefixes;
pub use request::RequestHead;
pub use resolver::PrincipalResolver;
pub use settings::{
    ENFORCEMENT_ENV_ALIASES, EnforcementSettings, config_builder, config_builder_from,
};
