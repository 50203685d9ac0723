//! Configuration module
//!
//! Resolves which snapshot store and which notifier a detector uses.
//! Sources, lowest precedence first: an optional `dfdrift.toml` in the
//! working directory, `.env` plus the process environment (`DFDRIFT_*`),
//! then explicit overrides supplied by the caller or the CLI.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;
use validator::Validate;

/// Directory used by the local store when nothing else is configured
pub const DEFAULT_STORAGE_DIR: &str = ".dfdrift_schemas";
/// Name of the single history document, locally and remotely
pub const DOCUMENT_NAME: &str = "schemas.json";
/// Object-storage namespace used when no prefix is configured
pub const DEFAULT_PREFIX: &str = "dfdrift";
pub const DEFAULT_GCS_ENDPOINT: &str = "https://storage.googleapis.com";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

const ENV_PREFIX: &str = "DFDRIFT";

static BUCKET_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9._-]*[a-z0-9]$").expect("bucket regex is valid"));

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration sources: {0}")]
    Source(#[from] config::ConfigError),

    #[error("Missing required setting: {0}")]
    MissingVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Raw, unresolved settings. Every field is optional so that the same
/// shape serves the file/environment layer and the explicit-override layer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsOverrides {
    pub storage_path: Option<String>,
    pub gcs_bucket: Option<String>,
    pub gcs_prefix: Option<String>,
    pub gcs_endpoint: Option<String>,
    pub gcs_access_token: Option<String>,
    pub slack_webhook_url: Option<String>,
    pub slack_bot_token: Option<String>,
    pub slack_channel: Option<String>,
    pub http_timeout_secs: Option<u64>,
}

impl SettingsOverrides {
    /// Field-wise merge: values set on `self` win over `fallback`
    pub fn or(self, fallback: SettingsOverrides) -> SettingsOverrides {
        SettingsOverrides {
            storage_path: self.storage_path.or(fallback.storage_path),
            gcs_bucket: self.gcs_bucket.or(fallback.gcs_bucket),
            gcs_prefix: self.gcs_prefix.or(fallback.gcs_prefix),
            gcs_endpoint: self.gcs_endpoint.or(fallback.gcs_endpoint),
            gcs_access_token: self.gcs_access_token.or(fallback.gcs_access_token),
            slack_webhook_url: self.slack_webhook_url.or(fallback.slack_webhook_url),
            slack_bot_token: self.slack_bot_token.or(fallback.slack_bot_token),
            slack_channel: self.slack_channel.or(fallback.slack_channel),
            http_timeout_secs: self.http_timeout_secs.or(fallback.http_timeout_secs),
        }
    }
}

/// Object-storage store configuration
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct ObjectStoreSettings {
    #[validate(
        length(min = 3, max = 222, message = "Bucket name must be between 3 and 222 characters"),
        custom(function = "validate_bucket_name")
    )]
    pub bucket: String,
    /// Always normalized to end in exactly one `/`
    pub prefix: String,
    pub endpoint: String,
    pub access_token: Option<String>,
}

impl ObjectStoreSettings {
    /// Key of the history document inside the bucket
    pub fn object_key(&self) -> String {
        format!("{}{}", self.prefix, DOCUMENT_NAME)
    }
}

/// Which snapshot store to build
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreSettings {
    Local { dir: PathBuf },
    Object(ObjectStoreSettings),
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings::Local {
            dir: PathBuf::from(DEFAULT_STORAGE_DIR),
        }
    }
}

/// Which notifier to build
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NotifierSettings {
    #[default]
    Console,
    SlackWebhook { url: Url },
    SlackBot { token: String, channel: String },
}

/// Complete, validated settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub store: StoreSettings,
    pub notifier: NotifierSettings,
    pub http_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store: StoreSettings::default(),
            notifier: NotifierSettings::default(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl Settings {
    /// Load settings from the file and environment layers only
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(SettingsOverrides::default())
    }

    /// Load settings, letting `overrides` win over file and environment
    pub fn load_with(overrides: SettingsOverrides) -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();

        let layered = Self::read_sources(None)?;
        Self::resolve(overrides.or(layered))
    }

    /// Same as `load_with`, but reads the environment layer from `env`
    /// instead of the process environment.
    pub fn from_env_map(
        env: HashMap<String, String>,
        overrides: SettingsOverrides,
    ) -> Result<Self, ConfigError> {
        let layered = Self::read_sources(Some(env))?;
        Self::resolve(overrides.or(layered))
    }

    fn read_sources(env: Option<HashMap<String, String>>) -> Result<SettingsOverrides, ConfigError> {
        let raw = config::Config::builder()
            .add_source(config::File::with_name("dfdrift").required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .source(env),
            )
            .build()?;

        Ok(raw.try_deserialize()?)
    }

    /// Turn raw values into a validated store + notifier selection
    pub fn resolve(raw: SettingsOverrides) -> Result<Self, ConfigError> {
        let store = match non_empty(raw.gcs_bucket) {
            Some(bucket) => {
                let object = ObjectStoreSettings {
                    bucket,
                    prefix: normalize_prefix(raw.gcs_prefix.as_deref().unwrap_or(DEFAULT_PREFIX)),
                    endpoint: non_empty(raw.gcs_endpoint)
                        .unwrap_or_else(|| DEFAULT_GCS_ENDPOINT.to_string())
                        .trim_end_matches('/')
                        .to_string(),
                    access_token: non_empty(raw.gcs_access_token),
                };
                object
                    .validate()
                    .map_err(|e| ConfigError::InvalidValue(format!("gcs_bucket: {}", e)))?;
                StoreSettings::Object(object)
            }
            None => StoreSettings::Local {
                dir: non_empty(raw.storage_path)
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR)),
            },
        };

        let notifier = Self::resolve_notifier(
            non_empty(raw.slack_webhook_url),
            non_empty(raw.slack_bot_token),
            non_empty(raw.slack_channel),
        )?;

        let http_timeout = match raw.http_timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS) {
            0 => {
                return Err(ConfigError::InvalidValue(
                    "http_timeout_secs must be at least 1".to_string(),
                ))
            }
            secs => Duration::from_secs(secs),
        };

        Ok(Self {
            store,
            notifier,
            http_timeout,
        })
    }

    fn resolve_notifier(
        webhook_url: Option<String>,
        bot_token: Option<String>,
        channel: Option<String>,
    ) -> Result<NotifierSettings, ConfigError> {
        // Webhook is preferred whenever it is configured
        if let Some(raw_url) = webhook_url {
            return Ok(NotifierSettings::SlackWebhook {
                url: parse_webhook_url(&raw_url)?,
            });
        }

        match (bot_token, channel) {
            (Some(token), Some(channel)) => Ok(NotifierSettings::SlackBot { token, channel }),
            (Some(_), None) => Err(ConfigError::MissingVar(format!(
                "{}_SLACK_CHANNEL (required with a bot token)",
                ENV_PREFIX
            ))),
            (None, Some(_)) => Err(ConfigError::MissingVar(format!(
                "{}_SLACK_BOT_TOKEN (required with a channel)",
                ENV_PREFIX
            ))),
            (None, None) => Ok(NotifierSettings::Console),
        }
    }
}

/// Strip leading separators and force exactly one trailing separator.
/// An empty prefix falls back to the default namespace.
pub fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        format!("{}/", DEFAULT_PREFIX)
    } else {
        format!("{}/", trimmed)
    }
}

fn parse_webhook_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidValue(format!("slack_webhook_url: {}", e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidValue(format!(
            "slack_webhook_url: unsupported scheme '{}'",
            other
        ))),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validate a GCS bucket name
fn validate_bucket_name(name: &str) -> Result<(), validator::ValidationError> {
    if !BUCKET_NAME.is_match(name) {
        let mut err = validator::ValidationError::new("invalid_bucket");
        err.message = Some(
            "Bucket names use lowercase letters, digits, dots, dashes and underscores, and must start and end with a letter or digit."
                .into(),
        );
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::from_env_map(HashMap::new(), SettingsOverrides::default()).unwrap();
        assert_eq!(settings.store, StoreSettings::default());
        assert_eq!(settings.notifier, NotifierSettings::Console);
        assert_eq!(settings.http_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_env_selects_object_store() {
        let settings = Settings::from_env_map(
            env(&[("DFDRIFT_GCS_BUCKET", "pipeline-schemas"), ("DFDRIFT_GCS_PREFIX", "/prod")]),
            SettingsOverrides::default(),
        )
        .unwrap();

        match settings.store {
            StoreSettings::Object(object) => {
                assert_eq!(object.bucket, "pipeline-schemas");
                assert_eq!(object.prefix, "prod/");
                assert_eq!(object.object_key(), "prod/schemas.json");
                assert_eq!(object.endpoint, DEFAULT_GCS_ENDPOINT);
            }
            other => panic!("expected object store, got {:?}", other),
        }
    }

    #[test]
    fn test_overrides_win_over_env() {
        let overrides = SettingsOverrides {
            gcs_bucket: Some("from-args".to_string()),
            ..Default::default()
        };
        let settings =
            Settings::from_env_map(env(&[("DFDRIFT_GCS_BUCKET", "from-env")]), overrides).unwrap();

        match settings.store {
            StoreSettings::Object(object) => assert_eq!(object.bucket, "from-args"),
            other => panic!("expected object store, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_bucket_name() {
        let result = Settings::from_env_map(
            env(&[("DFDRIFT_GCS_BUCKET", "Not_A_Bucket!")]),
            SettingsOverrides::default(),
        );
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_webhook_preferred_over_bot() {
        let settings = Settings::from_env_map(
            env(&[
                ("DFDRIFT_SLACK_WEBHOOK_URL", "https://hooks.slack.com/services/T/B/X"),
                ("DFDRIFT_SLACK_BOT_TOKEN", "xoxb-token"),
                ("DFDRIFT_SLACK_CHANNEL", "#data-alerts"),
            ]),
            SettingsOverrides::default(),
        )
        .unwrap();

        assert!(matches!(settings.notifier, NotifierSettings::SlackWebhook { .. }));
    }

    #[test]
    fn test_bot_token_requires_channel() {
        let result = Settings::from_env_map(
            env(&[("DFDRIFT_SLACK_BOT_TOKEN", "xoxb-token")]),
            SettingsOverrides::default(),
        );
        assert!(matches!(result, Err(ConfigError::MissingVar(_))));
    }

    #[test]
    fn test_rejects_non_http_webhook() {
        let overrides = SettingsOverrides {
            slack_webhook_url: Some("ftp://example.com/hook".to_string()),
            ..Default::default()
        };
        let result = Settings::from_env_map(HashMap::new(), overrides);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = Settings::from_env_map(
            env(&[("DFDRIFT_HTTP_TIMEOUT_SECS", "0")]),
            SettingsOverrides::default(),
        );
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));

        let overrides = SettingsOverrides {
            http_timeout_secs: Some(3),
            ..Default::default()
        };
        let settings =
            Settings::from_env_map(env(&[("DFDRIFT_HTTP_TIMEOUT_SECS", "0")]), overrides).unwrap();
        assert_eq!(settings.http_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("dfdrift"), "dfdrift/");
        assert_eq!(normalize_prefix("/team/prod/"), "team/prod/");
        assert_eq!(normalize_prefix("//nested//"), "nested/");
        assert_eq!(normalize_prefix(""), "dfdrift/");
        assert_eq!(normalize_prefix("/"), "dfdrift/");
    }
}
