//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the gate server,
//! loaded via the `config` crate from environment variables.
//!
//! See [`EnforcementSettings`] for the enforcement options, read from the
//! `ENFORCEMENT__*` variables.

use crate::error::ServerError;
use mfa_gate_policy::{
    ConfigurationError, ENFORCEMENT_ENV_ALIASES, EnforcementConfig, EnforcementSettings,
    config_builder,
};
use rootcause::prelude::Report;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address the gate listens on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Base URL of the protected application.
    pub upstream_url: String,

    /// Principal lookup against the protected application.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Browser watcher bundle.
    #[serde(default)]
    pub watcher: WatcherAssetsConfig,

    /// Second-factor enforcement.
    #[serde(default)]
    pub enforcement: EnforcementSettings,
}

/// Where the protected application answers "who am I".
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Path on the upstream, called with the inbound `Cookie` and
    /// `Authorization` headers.
    #[serde(default = "default_whoami_path")]
    pub whoami_path: String,
}

/// Static files of the browser watcher.
#[derive(Debug, Clone, Deserialize)]
pub struct WatcherAssetsConfig {
    /// Directory holding the compiled bundle. Nothing is served when unset.
    #[serde(default)]
    pub assets_dir: Option<PathBuf>,

    /// Path the bundle is served under. Always reachable without a second
    /// factor.
    #[serde(default = "default_mount_path")]
    pub mount_path: String,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_whoami_path() -> String {
    "/auth/authenticated".to_string()
}

fn default_mount_path() -> String {
    "/mfa-gate".to_string()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            whoami_path: default_whoami_path(),
        }
    }
}

impl Default for WatcherAssetsConfig {
    fn default() -> Self {
        Self {
            assets_dir: None,
            mount_path: default_mount_path(),
        }
    }
}

impl WatcherAssetsConfig {
    /// Mount path with exactly one leading `/` and no trailing `/`.
    #[must_use]
    pub fn normalized_mount_path(&self) -> String {
        format!("/{}", self.mount_path.trim().trim_matches('/'))
    }

    /// Normalized mount path, checked to be routable below the root.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is empty or `/`, contains a route
    /// parameter or wildcard, or has a `.`/`..` segment.
    pub fn validated_mount_path(&self) -> Result<String, Report<ConfigurationError>> {
        let path = self.normalized_mount_path();
        let invalid = |reason| ConfigurationError::InvalidMountPath {
            path: self.mount_path.clone(),
            reason,
        };
        if path == "/" {
            return Err(invalid("the root cannot be shared with the protected application").into());
        }
        if path.contains(['{', '}', '*']) {
            return Err(invalid("route parameters and wildcards are not allowed").into());
        }
        if path.split('/').any(|segment| matches!(segment, "." | "..")) {
            return Err(invalid("dot segments are not allowed").into());
        }
        Ok(path)
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, Report<ConfigurationError>> {
        let load = |err: config::ConfigError| ConfigurationError::Load {
            details: err.to_string(),
        };
        Ok(config_builder(ENFORCEMENT_ENV_ALIASES)
            .map_err(load)?
            .build()
            .map_err(load)?
            .try_deserialize()
            .map_err(load)?)
    }

    /// Validates the enforcement settings.
    ///
    /// The watcher mount path is appended to the allowed prefixes when a
    /// bundle is served, so the modal can load for non-compliant users.
    ///
    /// # Errors
    ///
    /// Returns an error if the enforcement settings are inconsistent, or the
    /// bundle is served under an invalid mount path.
    pub fn enforcement_config(&self) -> Result<EnforcementConfig, Report<ConfigurationError>> {
        let config = EnforcementConfig::from_settings(self.enforcement.clone())?;
        Ok(match self.watcher.assets_dir {
            Some(_) => {
                let mount_path = self.watcher.validated_mount_path()?;
                config.with_extra_allowed_paths([format!("{mount_path}/")])
            }
            None => config,
        })
    }

    /// Parses the upstream base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if `upstream_url` is not an absolute http(s) URL.
    pub fn upstream(&self) -> Result<reqwest::Url, Report<ServerError>> {
        let invalid = |reason: String| ServerError::InvalidUpstream {
            url: self.upstream_url.clone(),
            reason,
        };
        let url = reqwest::Url::parse(&self.upstream_url).map_err(|err| invalid(err.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", url.scheme())).into());
        }
        Ok(url)
    }

    /// Full URL of the upstream "who am I" endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream URL or the path is invalid.
    pub fn whoami_url(&self) -> Result<reqwest::Url, Report<ServerError>> {
        let upstream = self.upstream()?;
        Ok(upstream
            .join(&self.identity.whoami_path)
            .map_err(|err| ServerError::InvalidUpstream {
                url: format!("{}{}", self.upstream_url, self.identity.whoami_path),
                reason: err.to_string(),
            })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(upstream_url: &str) -> ServerConfig {
        ServerConfig {
            listen_addr: default_listen_addr(),
            upstream_url: upstream_url.to_string(),
            identity: IdentityConfig::default(),
            watcher: WatcherAssetsConfig::default(),
            enforcement: EnforcementSettings::default(),
        }
    }

    #[test]
    fn identity_and_watcher_have_correct_defaults() {
        assert_eq!(IdentityConfig::default().whoami_path, "/auth/authenticated");
        let watcher = WatcherAssetsConfig::default();
        assert!(watcher.assets_dir.is_none());
        assert_eq!(watcher.normalized_mount_path(), "/mfa-gate");
    }

    #[test]
    fn mount_path_is_normalized() {
        let watcher = WatcherAssetsConfig {
            assets_dir: None,
            mount_path: "assets/watcher/".to_string(),
        };
        assert_eq!(watcher.normalized_mount_path(), "/assets/watcher");
    }

    #[test]
    fn whoami_url_joins_upstream() {
        let url = config("http://zou:5000").whoami_url().expect("valid");
        assert_eq!(url.as_str(), "http://zou:5000/auth/authenticated");
    }

    #[test]
    fn upstream_must_be_http() {
        assert!(config("ftp://zou").upstream().is_err());
        assert!(config("not a url").upstream().is_err());
    }

    #[test]
    fn served_watcher_bundle_is_allowed() {
        let mut config = config("http://zou:5000");
        config.enforcement.enabled = true;
        config.watcher.assets_dir = Some(PathBuf::from("/srv/mfa-gate"));

        let enforcement = config.enforcement_config().expect("valid");
        assert!(enforcement.allowed_paths().covers("/mfa-gate/watcher.js"));
    }

    #[test]
    fn root_or_empty_mount_path_is_rejected_when_served() {
        for mount_path in ["/", "", "  //  "] {
            let mut config = config("http://zou:5000");
            config.watcher.assets_dir = Some(PathBuf::from("/srv/mfa-gate"));
            config.watcher.mount_path = mount_path.to_string();

            let err = config.enforcement_config().expect_err("must be rejected");
            assert!(err.to_string().contains("invalid mount path"), "{mount_path:?}");
        }
    }

    #[test]
    fn unroutable_mount_paths_are_rejected() {
        for mount_path in ["/{bundle}", "/assets/*rest", "/assets/../api"] {
            let watcher = WatcherAssetsConfig {
                assets_dir: None,
                mount_path: mount_path.to_string(),
            };
            assert!(watcher.validated_mount_path().is_err(), "{mount_path}");
        }
    }

    #[test]
    fn root_mount_path_is_ignored_when_nothing_is_served() {
        let mut config = config("http://zou:5000");
        config.watcher.mount_path = "/".to_string();
        assert!(config.enforcement_config().is_ok());
    }

    #[test]
    fn watcher_mount_is_not_allowed_when_not_served() {
        let config = config("http://zou:5000");
        let enforcement = config.enforcement_config().expect("valid");
        assert!(!enforcement.allowed_paths().covers("/mfa-gate/watcher.js"));
    }
}
