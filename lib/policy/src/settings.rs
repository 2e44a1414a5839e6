//! Raw enforcement settings, loaded via the `config` crate.
//!
//! Settings come from environment variables with `__` as the nesting
//! separator (`ENFORCEMENT__ENABLED=true`). The variable names used by the
//! legacy container deployment are honoured as lower-priority aliases,
//! see [`ENFORCEMENT_ENV_ALIASES`].

use config::{Config, ConfigError, Environment, Map, builder::DefaultState};
use serde::{Deserialize, Deserializer};

/// Legacy environment variables and the settings keys they feed.
///
/// The structured names win when both are set.
pub const ENFORCEMENT_ENV_ALIASES: &[(&str, &str)] = &[
    ("REQUIRE_2FA", "enforcement.enabled"),
    ("2FA_EXEMPT_USERS", "enforcement.exempt_identities"),
    (
        "LEGACY_DISABLE_NONCOMPLIANT",
        "enforcement.legacy_disable_enabled",
    ),
];

/// Starts a configuration builder over the process environment.
///
/// See [`config_builder_from`].
///
/// # Errors
///
/// Returns an error if an alias key is not a valid configuration path.
pub fn config_builder(
    aliases: &[(&str, &str)],
) -> Result<config::builder::ConfigBuilder<DefaultState>, ConfigError> {
    let vars = std::env::vars_os()
        .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)))
        .collect();
    config_builder_from(aliases, vars)
}

/// Starts a configuration builder over the given environment variables.
///
/// Each `(variable, key)` alias present in `vars` becomes a default for
/// `key`; the structured `SECTION__KEY` variables are layered on top.
///
/// # Errors
///
/// Returns an error if an alias key is not a valid configuration path.
pub fn config_builder_from(
    aliases: &[(&str, &str)],
    vars: Map<String, String>,
) -> Result<config::builder::ConfigBuilder<DefaultState>, ConfigError> {
    let mut builder = Config::builder();
    for (variable, key) in aliases {
        if let Some(value) = vars.get(*variable) {
            builder = builder.set_default(*key, value.as_str())?;
        }
    }
    Ok(builder.add_source(
        Environment::default()
            .separator("__")
            .try_parsing(true)
            .source(Some(vars)),
    ))
}

/// Second-factor enforcement settings as read from configuration.
///
/// Turned into an [`EnforcementConfig`](crate::EnforcementConfig) by
/// validation before use.
#[derive(Debug, Clone, Deserialize)]
pub struct EnforcementSettings {
    /// Master switch.
    #[serde(default)]
    pub enabled: bool,

    /// Identities that bypass enforcement. Comma-separated or a list.
    #[serde(default, deserialize_with = "comma_separated")]
    pub exempt_identities: Vec<String>,

    /// Paths reachable without a second factor.
    /// Replaces the built-in list when set.
    #[serde(
        default = "default_allowed_path_prefixes",
        deserialize_with = "comma_separated"
    )]
    pub allowed_path_prefixes: Vec<String>,

    /// Deployment-specific prefixes appended to `allowed_path_prefixes`.
    #[serde(default, deserialize_with = "comma_separated")]
    pub additional_allowed_path_prefixes: Vec<String>,

    /// Self-service page non-compliant users are sent to.
    #[serde(default = "default_redirect_target")]
    pub redirect_target: String,

    /// Switches the audit tool's `enforce` command from report-only to
    /// disabling accounts. Has no effect on the request path.
    #[serde(default)]
    pub legacy_disable_enabled: bool,

    /// Lets `GET`/`HEAD` from non-compliant users through and stops only
    /// writes, leaving the browser watcher to block the UI.
    #[serde(default)]
    pub allow_safe_methods: bool,

    /// Prefixes of API paths; non-compliant requests there get a JSON 403
    /// instead of a redirect.
    #[serde(
        default = "default_api_path_prefixes",
        deserialize_with = "comma_separated"
    )]
    pub api_path_prefixes: Vec<String>,

    /// Cookies that carry the upstream session.
    #[serde(
        default = "default_session_cookie_names",
        deserialize_with = "comma_separated"
    )]
    pub session_cookie_names: Vec<String>,

    /// Upper bound for one principal lookup, in milliseconds.
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
}

fn default_allowed_path_prefixes() -> Vec<String> {
    const ROUTES: &[&str] = &[
        // Authentication
        "auth/login",
        "auth/logout",
        "auth/authenticated",
        "auth/register",
        // Second-factor setup
        "auth/totp",
        "auth/fido",
        "auth/email-otp",
        "auth/recovery-codes",
        "actions/persons/enable-totp",
        "actions/persons/disable-totp",
        "actions/persons/enable-email-otp",
        "actions/persons/disable-email-otp",
        "actions/persons/register-fido-device",
        "actions/persons/unregister-fido-device",
        "actions/persons/generate-recovery-codes",
    ];
    const SHELL: &[&str] = &["static/", "config", "_health", "health", "profile"];

    ROUTES
        .iter()
        .flat_map(|route| [format!("api/{route}"), (*route).to_string()])
        .chain(SHELL.iter().map(|path| (*path).to_string()))
        .collect()
}

fn default_redirect_target() -> String {
    "/profile".to_string()
}

fn default_api_path_prefixes() -> Vec<String> {
    vec!["api/".to_string(), "data/".to_string(), "actions/".to_string()]
}

fn default_session_cookie_names() -> Vec<String> {
    vec!["access_token_cookie".to_string()]
}

fn default_lookup_timeout_ms() -> u64 {
    2000
}

impl Default for EnforcementSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            exempt_identities: Vec::new(),
            allowed_path_prefixes: default_allowed_path_prefixes(),
            additional_allowed_path_prefixes: Vec::new(),
            redirect_target: default_redirect_target(),
            legacy_disable_enabled: false,
            allow_safe_methods: false,
            api_path_prefixes: default_api_path_prefixes(),
            session_cookie_names: default_session_cookie_names(),
            lookup_timeout_ms: default_lookup_timeout_ms(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListOrString {
    List(Vec<String>),
    String(String),
}

fn comma_separated<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = match ListOrString::deserialize(deserializer)? {
        ListOrString::List(list) => list,
        ListOrString::String(joined) => joined.split(',').map(str::to_string).collect(),
    };
    Ok(entries
        .into_iter()
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Wrapper {
        #[serde(default)]
        enforcement: EnforcementSettings,
    }

    fn load(pairs: &[(&str, &str)]) -> EnforcementSettings {
        let mut builder = Config::builder();
        for (key, value) in pairs {
            builder = builder
                .set_override(*key, *value)
                .expect("valid override key");
        }
        builder
            .build()
            .expect("config builds")
            .try_deserialize::<Wrapper>()
            .expect("settings deserialize")
            .enforcement
    }

    #[test]
    fn defaults_are_disabled_with_profile_redirect() {
        let settings = EnforcementSettings::default();
        assert!(!settings.enabled);
        assert_eq!(settings.redirect_target, "/profile");
        assert_eq!(settings.lookup_timeout_ms, 2000);
        assert!(settings.allowed_path_prefixes.contains(&"profile".to_string()));
    }

    #[test]
    fn default_prefixes_include_api_and_bare_forms() {
        let prefixes = default_allowed_path_prefixes();
        assert!(prefixes.contains(&"api/auth/login".to_string()));
        assert!(prefixes.contains(&"auth/login".to_string()));
        assert!(prefixes.contains(&"api/actions/persons/register-fido-device".to_string()));
        assert!(prefixes.contains(&"static/".to_string()));
    }

    #[test]
    fn exempt_identities_accept_comma_separated_string() {
        let settings = load(&[
            ("enforcement.enabled", "yes"),
            (
                "enforcement.exempt_identities",
                "admin@example.com, ops@example.com ,",
            ),
        ]);
        assert!(settings.enabled);
        assert_eq!(
            settings.exempt_identities,
            vec!["admin@example.com", "ops@example.com"]
        );
    }

    fn load_env(vars: &[(&str, &str)]) -> EnforcementSettings {
        let vars = vars
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect();
        config_builder_from(ENFORCEMENT_ENV_ALIASES, vars)
            .expect("valid aliases")
            .build()
            .expect("config builds")
            .try_deserialize::<Wrapper>()
            .expect("settings deserialize")
            .enforcement
    }

    #[test]
    fn legacy_variables_feed_enforcement_settings() {
        let settings = load_env(&[
            ("REQUIRE_2FA", "True"),
            ("2FA_EXEMPT_USERS", "Admin@Example.com, ops@example.com"),
            ("LEGACY_DISABLE_NONCOMPLIANT", "true"),
        ]);
        assert!(settings.enabled);
        assert!(settings.legacy_disable_enabled);
        assert_eq!(
            settings.exempt_identities,
            vec!["Admin@Example.com", "ops@example.com"]
        );
    }

    #[test]
    fn structured_variables_win_over_legacy_ones() {
        let settings = load_env(&[
            ("REQUIRE_2FA", "false"),
            ("ENFORCEMENT__ENABLED", "true"),
            ("2FA_EXEMPT_USERS", "legacy@example.com"),
            ("ENFORCEMENT__EXEMPT_IDENTITIES", "ops@example.com"),
        ]);
        assert!(settings.enabled);
        assert_eq!(settings.exempt_identities, vec!["ops@example.com"]);
    }

    #[test]
    fn unset_variables_leave_defaults() {
        let settings = load_env(&[("UNRELATED", "1")]);
        assert!(!settings.enabled);
        assert!(settings.exempt_identities.is_empty());
        assert_eq!(settings.redirect_target, "/profile");
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let settings = load(&[("enforcement.legacy_disable_enabled", "true")]);
        assert!(!settings.enabled);
        assert!(settings.legacy_disable_enabled);
        assert_eq!(settings.api_path_prefixes, default_api_path_prefixes());
        assert_eq!(
            settings.session_cookie_names,
            vec!["access_token_cookie".to_string()]
        );
    }
}
