//! Watcher configuration.

use crate::location::ConfigurationArea;
use serde::Deserialize;
use std::time::Duration;

/// Options the host page passes when starting the watcher.
#[derive(Debug, Clone, Deserialize)]
pub struct WatcherConfig {
    /// "Who am I" endpoint, relative to the page origin.
    #[serde(default = "default_whoami_url")]
    pub whoami_url: String,

    /// Where the "configure" action navigates to.
    #[serde(default = "default_configuration_url")]
    pub configuration_url: String,

    /// Route prefixes that make up the self-service configuration area.
    /// Matched against the path and against the fragment route.
    #[serde(default = "default_configuration_area")]
    pub configuration_area: Vec<String>,

    /// Endpoint that ends the upstream session.
    #[serde(default = "default_logout_url")]
    pub logout_url: String,

    /// Page shown after logging out.
    #[serde(default = "default_login_url")]
    pub login_url: String,

    /// Delay between status polls while no definitive answer is known.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Polls before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Element holding the application UI, made inert behind the modal.
    #[serde(default = "default_app_root_selector")]
    pub app_root_selector: String,
}

fn default_whoami_url() -> String {
    "/api/auth/authenticated".to_string()
}

fn default_configuration_url() -> String {
    "/profile".to_string()
}

fn default_configuration_area() -> Vec<String> {
    vec!["/profile".to_string()]
}

fn default_logout_url() -> String {
    "/api/auth/logout".to_string()
}

fn default_login_url() -> String {
    "/login".to_string()
}

fn default_poll_interval_ms() -> u64 {
    200
}

fn default_max_attempts() -> u32 {
    50
}

fn default_app_root_selector() -> String {
    "#app".to_string()
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            whoami_url: default_whoami_url(),
            configuration_url: default_configuration_url(),
            configuration_area: default_configuration_area(),
            logout_url: default_logout_url(),
            login_url: default_login_url(),
            poll_interval_ms: default_poll_interval_ms(),
            max_attempts: default_max_attempts(),
            app_root_selector: default_app_root_selector(),
        }
    }
}

impl WatcherConfig {
    /// Returns the polling schedule.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_attempts: self.max_attempts.max(1),
        }
    }

    /// Returns the configuration area matcher.
    #[must_use]
    pub fn configuration_area(&self) -> ConfigurationArea {
        ConfigurationArea::new(&self.configuration_area)
    }
}

/// Fixed-interval, capped polling schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait between two polls.
    pub interval: Duration,
    /// Total polls, including the first one. At least 1.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        WatcherConfig::default().retry_policy()
    }
}
