//! Core domain types for the mfa-gate platform.
//!
//! This crate provides the pieces every other component agrees on:
//! - `Principal` and its second-factor flags (`MfaFlags`, `MfaMethod`)
//! - The exemption set shared by the request gate and the audit tool
//! - The "who am I" payload model consumed by the gate and the watcher
//!
//! # Example
//!
//! ```
//! use mfa_gate_core::{ExemptionSet, Identity, MfaFlags, Principal};
//!
//! let exemptions = ExemptionSet::parse_list("Admin@Example.com, ops@example.com");
//! let principal = Principal::new(
//!     Identity::new("alice@example.com"),
//!     MfaFlags::none().with_totp(true),
//! );
//!
//! assert!(principal.has_second_factor());
//! assert!(!exemptions.contains(principal.identity()));
//! assert!(exemptions.contains(&Identity::new("admin@example.com")));
//! ```

pub mod exemption;
pub mod principal;
pub mod whoami;

pub use exemption::ExemptionSet;
pub use principal::{Identity, MfaFlags, MfaMethod, Principal};
pub use whoami::{WhoAmI, WhoAmIError};
