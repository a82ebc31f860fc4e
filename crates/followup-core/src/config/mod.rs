mod defaults;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::FollowupError;
use defaults::*;

/// Top-level followup configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub followup: GeneralConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub desktop: DesktopConfig,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Record store config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Outbound email provider (Resend-compatible HTTP API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Provider API key. Overridden by `RESEND_API_KEY`.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_email_base_url")]
    pub base_url: String,
    #[serde(default = "default_email_from")]
    pub from: String,
    /// HTTP request timeout for a single send.
    #[serde(default = "default_email_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: String::new(),
            base_url: default_email_base_url(),
            from: default_email_from(),
            timeout_secs: default_email_timeout(),
        }
    }
}

/// Periodic sweep configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Upper bound on a single delivery inside a sweep. 0 = no bound.
    #[serde(default = "default_delivery_timeout")]
    pub delivery_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: default_poll_interval(),
            delivery_timeout_secs: default_delivery_timeout(),
        }
    }
}

/// HTTP API configuration: cron trigger and reminder edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Bearer token for the application endpoints. Empty = no auth (local use).
    #[serde(default)]
    pub api_key: String,
    /// Shared secret the external cron passes as `?token=`. Empty = cron route disabled.
    #[serde(default)]
    pub cron_secret: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_api_host(),
            port: default_api_port(),
            api_key: String::new(),
            cron_secret: String::new(),
        }
    }
}

/// Permission the user has given for desktop notifications.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPermission {
    Granted,
    Denied,
    /// Never asked. The first due reminder asks once.
    #[default]
    Unset,
}

/// Local desktop notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesktopConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub permission: NotificationPermission,
    #[serde(default = "default_notification_title")]
    pub title: String,
    /// Icon passed to the notification daemon, if any.
    #[serde(default)]
    pub icon: Option<String>,
    /// Opened when a notification is clicked, e.g. the web UI.
    #[serde(default)]
    pub open_url: Option<String>,
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            permission: NotificationPermission::default(),
            title: default_notification_title(),
            icon: None,
            open_url: None,
        }
    }
}

impl Config {
    /// Apply secrets from the environment on top of file values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(key) = non_empty("RESEND_API_KEY") {
            self.email.api_key = key;
        }
        if let Some(secret) = non_empty("CRON_SECRET") {
            self.api.cron_secret = secret;
        }
        if let Some(key) = non_empty("FOLLOWUP_API_KEY") {
            self.api.api_key = key;
        }
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist. Environment overrides
/// are applied either way.
pub fn load(path: &str) -> Result<Config, FollowupError> {
    let path = Path::new(path);
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FollowupError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| FollowupError::Config(format!("failed to parse config: {e}")))?
    } else {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        Config::default()
    };

    config.apply_env_overrides();
    Ok(config)
}
