//! Audit tool configuration.
//!
//! Shares the `ENFORCEMENT__*` settings with the gate server and reads the
//! database location from `DATABASE__*`, or from the `DB_*` variables of
//! the legacy container deployment.

use crate::error::AuditError;
use mfa_gate_core::ExemptionSet;
use mfa_gate_policy::{ENFORCEMENT_ENV_ALIASES, EnforcementSettings, config_builder_from};
use rootcause::prelude::Report;
use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;

/// Legacy database variables and the settings keys they feed.
pub const DATABASE_ENV_ALIASES: &[(&str, &str)] = &[
    ("DB_HOST", "database.host"),
    ("DB_PORT", "database.port"),
    ("DB_USER", "database.user"),
    ("DB_PASSWORD", "database.password"),
    ("DB_DB", "database.name"),
];

#[derive(Debug, Deserialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub enforcement: EnforcementSettings,
}

/// Connection to the protected application's database.
#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_name")]
    pub name: String,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_user() -> String {
    "postgres".to_string()
}

fn default_name() -> String {
    "zoudb".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: String::new(),
            name: default_name(),
        }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .finish()
    }
}

impl DatabaseConfig {
    #[must_use]
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name)
    }
}

impl AuditConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be read or deserialized.
    pub fn from_env() -> Result<Self, Report<AuditError>> {
        let vars = std::env::vars_os()
            .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        Self::from_vars(vars)
    }

    /// Loads configuration from the given environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be read or deserialized.
    pub fn from_vars(vars: config::Map<String, String>) -> Result<Self, Report<AuditError>> {
        let aliases: Vec<(&str, &str)> = ENFORCEMENT_ENV_ALIASES
            .iter()
            .chain(DATABASE_ENV_ALIASES)
            .copied()
            .collect();
        let load = |err: config::ConfigError| AuditError::Config {
            details: err.to_string(),
        };
        Ok(config_builder_from(&aliases, vars)
            .map_err(load)?
            .build()
            .map_err(load)?
            .try_deserialize()
            .map_err(load)?)
    }

    /// Identities that are never reported as needing action or disabled.
    #[must_use]
    pub fn exemptions(&self) -> ExemptionSet {
        self.enforcement.exempt_identities.iter().collect()
    }
}
