//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use serde::Deserialize;
use tracing::warn;

use crate::{AppError, Result};

/// Keyring service under which credentials are stored.
pub const KEYRING_SERVICE: &str = "event-herald";

/// Day-gate and heartbeat timing.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ScheduleConfig {
    /// Fixed UTC offset of the operating timezone, in hours.
    #[serde(default = "default_timezone_offset_hours")]
    pub timezone_offset_hours: i32,
    /// Delay between two heartbeats.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    /// Local hour at which the status report is sent.
    #[serde(default)]
    pub report_hour: u32,
    /// Local hour at which the digest thread is published.
    #[serde(default = "default_digest_hour")]
    pub digest_hour: u32,
    /// Local hour at which birthday congratulations are posted.
    #[serde(default = "default_birthday_hour")]
    pub birthday_hour: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone_offset_hours: default_timezone_offset_hours(),
            heartbeat_interval_seconds: default_heartbeat_interval(),
            report_hour: 0,
            digest_hour: default_digest_hour(),
            birthday_hour: default_birthday_hour(),
        }
    }
}

impl ScheduleConfig {
    /// The operating timezone as a fixed offset.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the offset is outside ±23 hours.
    pub fn timezone(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.timezone_offset_hours * 3600).ok_or_else(|| {
            AppError::Config(format!(
                "timezone_offset_hours out of range: {}",
                self.timezone_offset_hours
            ))
        })
    }
}

fn default_timezone_offset_hours() -> i32 {
    3
}

fn default_heartbeat_interval() -> u64 {
    300
}

fn default_digest_hour() -> u32 {
    6
}

fn default_birthday_hour() -> u32 {
    8
}

/// Gemini analyzer settings. The API key is loaded at runtime.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AnalyzerConfig {
    /// Generative model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// API key (populated at runtime).
    #[serde(skip)]
    pub api_key: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: String::new(),
        }
    }
}

fn default_model() -> String {
    "gemini-2.5-flash".into()
}

/// X publisher settings. The access token is loaded at runtime.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PublisherConfig {
    /// Username of the publishing account, used for mention lookups.
    #[serde(default)]
    pub account_username: String,
    /// OAuth 2.0 user-context access token (populated at runtime).
    #[serde(skip)]
    pub access_token: String,
}

fn default_http_port() -> u16 {
    8787
}

fn default_ipc_name() -> String {
    "event-herald".into()
}

fn default_retention_days() -> u32 {
    30
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Path to the `SQLite` database file.
    pub db_path: PathBuf,
    /// Telegram chat id of the monitored source channel.
    pub source_channel_id: String,
    /// Public link prefix for source messages; derived from the channel id when empty.
    #[serde(default)]
    pub source_url_prefix: String,
    /// Loopback HTTP port for `/health` and `/state`.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Named pipe / Unix socket identifier.
    #[serde(default = "default_ipc_name")]
    pub ipc_name: String,
    /// Days before log entries are purged.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Heartbeat and day-gate timing.
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Analyzer settings.
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    /// Publisher settings.
    #[serde(default)]
    pub publisher: PublisherConfig,
    /// Telegram bot token (populated at runtime).
    #[serde(skip)]
    pub telegram_bot_token: String,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load API credentials from OS keychain with env-var fallback.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if any credential is missing from both
    /// the keychain and the environment.
    pub async fn load_credentials(&mut self) -> Result<()> {
        self.telegram_bot_token =
            load_credential("telegram_bot_token", "TELEGRAM_BOT_TOKEN").await?;
        self.analyzer.api_key = load_credential("gemini_api_key", "GEMINI_API_KEY").await?;
        self.publisher.access_token =
            load_credential("twitter_access_token", "TWITTER_ACCESS_TOKEN").await?;
        Ok(())
    }

    /// Link to a message in the source channel.
    #[must_use]
    pub fn source_url(&self, message_id: i64) -> String {
        if self.source_url_prefix.is_empty() {
            let channel = self
                .source_channel_id
                .strip_prefix("-100")
                .unwrap_or(&self.source_channel_id);
            format!("https://t.me/c/{channel}/{message_id}")
        } else {
            format!(
                "{}/{message_id}",
                self.source_url_prefix.trim_end_matches('/')
            )
        }
    }

    /// Path of the file holding the IPC shared secret for this instance.
    #[must_use]
    pub fn ipc_token_path(&self) -> PathBuf {
        self.db_path.with_extension("ipc-token")
    }

    fn validate(&mut self) -> Result<()> {
        if self.source_channel_id.trim().is_empty() {
            return Err(AppError::Config(
                "source_channel_id must not be empty".into(),
            ));
        }

        if self.schedule.heartbeat_interval_seconds == 0 {
            return Err(AppError::Config(
                "heartbeat_interval_seconds must be greater than zero".into(),
            ));
        }

        let hours = [
            ("report_hour", self.schedule.report_hour),
            ("digest_hour", self.schedule.digest_hour),
            ("birthday_hour", self.schedule.birthday_hour),
        ];
        for (name, hour) in hours {
            if hour > 23 {
                return Err(AppError::Config(format!("{name} must be 0-23, got {hour}")));
            }
        }

        self.schedule.timezone()?;
        Ok(())
    }
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<String> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(value),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            warn!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    env::var(env_key).map_err(|_| {
        AppError::Config(format!(
            "credential {keyring_key} not found in keychain or {env_key} env var"
        ))
    })
}
