//! Principal identity and second-factor flags.
//!
//! The flags are owned by the upstream identity store; nothing in this
//! workspace writes them. A `Principal` is materialized per request and
//! dropped afterwards so a freshly enrolled method is seen on the very
//! next lookup.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque session-bound identifier of a user (email address or user ID).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Creates an identity from its raw value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the identity as given by the identity store.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the form used for exemption matching: trimmed, lower-cased.
    #[must_use]
    pub fn normalized(&self) -> String {
        self.0.trim().to_lowercase()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A second-factor method known to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MfaMethod {
    /// Time-based one-time passwords from an authenticator app.
    Totp,
    /// One-time passcodes delivered by email.
    EmailOtp,
    /// FIDO hardware security keys.
    Fido,
}

impl MfaMethod {
    /// Every method, in display order.
    ///
    /// A new method is added here and in [`MfaFlags::is_enabled`]; the
    /// predicate picks it up everywhere.
    pub const ALL: [MfaMethod; 3] = [Self::Totp, Self::EmailOtp, Self::Fido];

    /// Returns the human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Totp => "TOTP",
            Self::EmailOtp => "Email OTP",
            Self::Fido => "FIDO",
        }
    }
}

impl fmt::Display for MfaMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Independently settable second-factor flags of one principal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MfaFlags {
    /// TOTP is configured.
    #[serde(default)]
    pub totp_enabled: bool,
    /// Email OTP is configured.
    #[serde(default)]
    pub email_otp_enabled: bool,
    /// At least one FIDO device is registered.
    #[serde(default)]
    pub fido_enabled: bool,
}

impl MfaFlags {
    /// Flags with no method configured.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            totp_enabled: false,
            email_otp_enabled: false,
            fido_enabled: false,
        }
    }

    #[must_use]
    pub const fn with_totp(mut self, enabled: bool) -> Self {
        self.totp_enabled = enabled;
        self
    }

    #[must_use]
    pub const fn with_email_otp(mut self, enabled: bool) -> Self {
        self.email_otp_enabled = enabled;
        self
    }

    #[must_use]
    pub const fn with_fido(mut self, enabled: bool) -> Self {
        self.fido_enabled = enabled;
        self
    }

    /// Returns whether the given method is configured.
    #[must_use]
    pub const fn is_enabled(&self, method: MfaMethod) -> bool {
        match method {
            MfaMethod::Totp => self.totp_enabled,
            MfaMethod::EmailOtp => self.email_otp_enabled,
            MfaMethod::Fido => self.fido_enabled,
        }
    }

    /// The shared compliance predicate: any one configured method suffices.
    ///
    /// The request gate, the browser watcher and the audit tool all call
    /// this; none of them inspects the individual flags for compliance.
    #[must_use]
    pub fn has_second_factor(&self) -> bool {
        MfaMethod::ALL.iter().any(|method| self.is_enabled(*method))
    }

    /// Iterates over the configured methods.
    pub fn enabled_methods(&self) -> impl Iterator<Item = MfaMethod> + '_ {
        MfaMethod::ALL
            .into_iter()
            .filter(|method| self.is_enabled(*method))
    }
}

/// An authenticated user as seen by the gate for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    identity: Identity,
    flags: MfaFlags,
}

impl Principal {
    /// Creates a principal from an identity and its current flags.
    #[must_use]
    pub fn new(identity: Identity, flags: MfaFlags) -> Self {
        Self { identity, flags }
    }

    /// Returns the principal's identity.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns the principal's second-factor flags.
    #[must_use]
    pub fn flags(&self) -> MfaFlags {
        self.flags
    }

    /// See [`MfaFlags::has_second_factor`].
    #[must_use]
    pub fn has_second_factor(&self) -> bool {
        self.flags.has_second_factor()
    }
}
