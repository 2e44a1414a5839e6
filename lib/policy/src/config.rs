//! Validated enforcement configuration.

use crate::error::ConfigurationError;
use crate::paths::PathPrefixes;
use crate::settings::EnforcementSettings;
use mfa_gate_core::ExemptionSet;
use rootcause::prelude::Report;
use std::time::Duration;

/// Process-wide enforcement configuration.
///
/// Built once at startup from [`EnforcementSettings`] and never mutated.
/// Construction guarantees that the redirect target is reachable without a
/// second factor.
#[derive(Debug, Clone)]
pub struct EnforcementConfig {
    enabled: bool,
    exemptions: ExemptionSet,
    allowed_paths: PathPrefixes,
    api_paths: PathPrefixes,
    redirect_target: String,
    legacy_disable_enabled: bool,
    allow_safe_methods: bool,
    session_cookie_names: Vec<String>,
    lookup_timeout: Duration,
}

impl EnforcementConfig {
    /// Validates settings.
    ///
    /// Both `enabled` and `legacy_disable_enabled` may be true at once: the
    /// request path always redirects, and disabling stays a batch action.
    ///
    /// # Errors
    ///
    /// Returns an error if the redirect target is not an absolute path or is
    /// not covered by the allowed prefixes, if a prefix list contains an
    /// entry matching every path, or if the lookup timeout is zero.
    pub fn from_settings(settings: EnforcementSettings) -> Result<Self, Report<ConfigurationError>> {
        let allowed_paths = PathPrefixes::new(
            settings
                .allowed_path_prefixes
                .iter()
                .chain(settings.additional_allowed_path_prefixes.iter()),
        )
        .ok_or(ConfigurationError::EmptyPathPrefix {
            list: "allowed_path_prefixes",
        })?;

        let api_paths = PathPrefixes::new(&settings.api_path_prefixes).ok_or(
            ConfigurationError::EmptyPathPrefix {
                list: "api_path_prefixes",
            },
        )?;

        let redirect_target = settings.redirect_target.trim().to_string();
        if !redirect_target.starts_with('/') || redirect_target.starts_with("//") {
            return Err(ConfigurationError::InvalidRedirectTarget {
                target: redirect_target,
                reason: "must be an absolute path on this host".to_string(),
            }
            .into());
        }

        let redirect_path = redirect_target
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        if !allowed_paths.covers(redirect_path) {
            return Err(ConfigurationError::RedirectTargetNotAllowed {
                target: redirect_target,
            }
            .into());
        }

        if settings.lookup_timeout_ms == 0 {
            return Err(ConfigurationError::ZeroLookupTimeout.into());
        }

        Ok(Self {
            enabled: settings.enabled,
            exemptions: settings.exempt_identities.iter().collect(),
            allowed_paths,
            api_paths,
            redirect_target,
            legacy_disable_enabled: settings.legacy_disable_enabled,
            allow_safe_methods: settings.allow_safe_methods,
            session_cookie_names: settings.session_cookie_names,
            lookup_timeout: Duration::from_millis(settings.lookup_timeout_ms),
        })
    }

    /// Returns a copy with the given prefixes appended to the allowed list.
    ///
    /// Used for paths the hosting process serves itself.
    #[must_use]
    pub fn with_extra_allowed_paths<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let merged: Vec<String> = self
            .allowed_paths
            .iter()
            .map(str::to_string)
            .chain(extra.into_iter().map(|p| p.as_ref().to_string()))
            .collect();
        if let Some(paths) = PathPrefixes::new(merged) {
            self.allowed_paths = paths;
        }
        self
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn exemptions(&self) -> &ExemptionSet {
        &self.exemptions
    }

    #[must_use]
    pub fn allowed_paths(&self) -> &PathPrefixes {
        &self.allowed_paths
    }

    #[must_use]
    pub fn api_paths(&self) -> &PathPrefixes {
        &self.api_paths
    }

    #[must_use]
    pub fn redirect_target(&self) -> &str {
        &self.redirect_target
    }

    #[must_use]
    pub fn legacy_disable_enabled(&self) -> bool {
        self.legacy_disable_enabled
    }

    #[must_use]
    pub fn allow_safe_methods(&self) -> bool {
        self.allow_safe_methods
    }

    #[must_use]
    pub fn session_cookie_names(&self) -> &[String] {
        &self.session_cookie_names
    }

    #[must_use]
    pub fn lookup_timeout(&self) -> Duration {
        self.lookup_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mfa_gate_core::Identity;

    fn enabled_settings() -> EnforcementSettings {
        EnforcementSettings {
            enabled: true,
            ..EnforcementSettings::default()
        }
    }

    #[test]
    fn default_settings_validate() {
        let config = EnforcementConfig::from_settings(enabled_settings()).expect("valid");
        assert!(config.enabled());
        assert_eq!(config.redirect_target(), "/profile");
        assert!(config.allowed_paths().covers("/profile/security"));
        assert_eq!(config.lookup_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn redirect_target_outside_allowed_prefixes_is_rejected() {
        let settings = EnforcementSettings {
            redirect_target: "/settings/2fa".to_string(),
            ..enabled_settings()
        };
        let err = EnforcementConfig::from_settings(settings).expect_err("should reject");
        assert!(err.to_string().contains("/settings/2fa"));
    }

    #[test]
    fn redirect_target_is_checked_without_query_or_fragment() {
        let settings = EnforcementSettings {
            redirect_target: "/profile?tab=security#2fa".to_string(),
            ..enabled_settings()
        };
        assert!(EnforcementConfig::from_settings(settings).is_ok());
    }

    #[test]
    fn redirect_target_is_validated_even_when_disabled() {
        let settings = EnforcementSettings {
            enabled: false,
            redirect_target: "/nowhere".to_string(),
            ..EnforcementSettings::default()
        };
        assert!(EnforcementConfig::from_settings(settings).is_err());
    }

    #[test]
    fn relative_or_external_redirect_is_rejected() {
        for target in ["profile", "//evil.example.com/profile", "https://x/profile"] {
            let settings = EnforcementSettings {
                redirect_target: target.to_string(),
                ..enabled_settings()
            };
            let err = EnforcementConfig::from_settings(settings).expect_err(target);
            assert!(err.to_string().contains("invalid redirect target"), "{target}");
        }
    }

    #[test]
    fn catch_all_prefix_is_rejected() {
        let settings = EnforcementSettings {
            additional_allowed_path_prefixes: vec!["/".to_string()],
            ..enabled_settings()
        };
        let err = EnforcementConfig::from_settings(settings).expect_err("should reject");
        assert!(err.to_string().contains("allowed_path_prefixes"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let settings = EnforcementSettings {
            lookup_timeout_ms: 0,
            ..enabled_settings()
        };
        assert!(EnforcementConfig::from_settings(settings).is_err());
    }

    #[test]
    fn both_postures_may_be_enabled() {
        let settings = EnforcementSettings {
            legacy_disable_enabled: true,
            ..enabled_settings()
        };
        let config = EnforcementConfig::from_settings(settings).expect("valid");
        assert!(config.enabled());
        assert!(config.legacy_disable_enabled());
    }

    #[test]
    fn exemptions_are_normalized() {
        let settings = EnforcementSettings {
            exempt_identities: vec!["Admin@Example.com".to_string()],
            ..enabled_settings()
        };
        let config = EnforcementConfig::from_settings(settings).expect("valid");
        assert!(config.exemptions().contains(&Identity::new("admin@example.com")));
    }

    #[test]
    fn extra_allowed_paths_are_appended() {
        let config = EnforcementConfig::from_settings(enabled_settings())
            .expect("valid")
            .with_extra_allowed_paths(["/mfa-gate"]);
        assert!(config.allowed_paths().covers("/mfa-gate/watcher.js"));
        assert!(config.allowed_paths().covers("/profile"));
    }
}
