//! SMTP and run configuration.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing or invalid config: {0}")]
    Env(#[from] config::ConfigError),

    #[error("invalid sender address: {0}")]
    InvalidSender(String),
}

/// Configuration for one dispatch run. Immutable once the run starts; a new
/// run takes a fresh config, re-verified with [`probe`](super::probe).
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    /// SMTP server hostname.
    #[serde(rename = "smtp_host")]
    pub host: String,

    /// SMTP server port (default: 587).
    #[serde(rename = "smtp_port", default = "default_port")]
    pub port: u16,

    /// Sender address.
    #[serde(rename = "smtp_from")]
    pub from: String,

    /// Optional display name for the sender.
    #[serde(rename = "smtp_from_name", default)]
    pub from_name: Option<String>,

    /// SMTP username for authentication.
    #[serde(rename = "smtp_username", default)]
    pub username: Option<String>,

    /// SMTP password or app-password token.
    #[serde(rename = "smtp_password", default)]
    pub password: Option<String>,

    /// TLS mode: "starttls" (default), "tls", or "none".
    #[serde(rename = "smtp_tls", default = "default_tls")]
    pub tls: String,

    /// Connection timeout in seconds (default: 10).
    #[serde(rename = "smtp_timeout", default = "default_timeout")]
    pub timeout: u64,

    /// Concurrent worker count (default: 3, minimum 1).
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Retries after the first attempt (default: 3), so a message is tried
    /// at most `max_retries + 1` times.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay in milliseconds (default: 5000); doubles per
    /// attempt.
    #[serde(default = "default_backoff_ms")]
    pub backoff_base_ms: u64,

    /// Backoff ceiling in milliseconds (default: 300 000).
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
}

fn default_port() -> u16 {
    587
}

fn default_tls() -> String {
    "starttls".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_workers() -> usize {
    3
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    5_000
}

fn default_backoff_cap_ms() -> u64 {
    300_000
}

impl SmtpConfig {
    /// Load configuration from the environment.
    ///
    /// Reads `SMTP_HOST`, `SMTP_PORT`, `SMTP_FROM`, `SMTP_FROM_NAME`,
    /// `SMTP_USERNAME`, `SMTP_PASSWORD`, `SMTP_TLS`, `SMTP_TIMEOUT`,
    /// `WORKERS`, `MAX_RETRIES`, `BACKOFF_BASE_MS`, `BACKOFF_CAP_MS`.
    /// A `.env` file is honored when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }
}
