use std::time::Duration;

use chrono::FixedOffset;
use reqwest::Url;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::metrika::client::DEFAULT_BASE_URL;
use crate::secrets::SecretSource;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub metrika: MetrikaConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Either a full `url`, or Postgres connection parts with a password secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: SecretSource,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_port() -> u16 {
    5432
}

fn default_max_connections() -> u32 {
    10
}

impl DatabaseConfig {
    /// The connection URL, with the password secret resolved and
    /// percent-encoded when the URL is assembled from parts.
    pub fn connection_url(&self) -> Result<String, ConfigError> {
        if let Some(url) = self.url.as_deref().filter(|u| !u.is_empty()) {
            return Ok(url.to_string());
        }

        let (Some(host), Some(database), Some(username)) = (
            self.host.as_deref(),
            self.database.as_deref(),
            self.username.as_deref(),
        ) else {
            return Err(ConfigError::Validation {
                message: "database needs either url or host, database and username".to_string(),
            });
        };

        let invalid = |what: &str| ConfigError::Validation {
            message: format!("database {what} cannot be used in a connection URL"),
        };

        let mut url = Url::parse(&format!("postgres://{host}:{}/{database}", self.port))
            .map_err(|_| invalid("host or name"))?;
        url.set_username(username).map_err(|_| invalid("username"))?;

        if self.password.is_configured() {
            let password = self
                .password
                .resolve()
                .map_err(|source| ConfigError::Secret {
                    name: "database.password",
                    source,
                })?;
            url.set_password(Some(password.expose_secret()))
                .map_err(|_| invalid("password"))?;
        }

        Ok(url.into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetrikaConfig {
    /// Counter (tag) id the logs are exported from.
    pub counter: u64,
    /// OAuth token with access to the Logs API.
    pub token: SecretSource,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Offset of the counter's time zone. Exported timestamps are local to it.
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout() -> u64 {
    300
}

impl MetrikaConfig {
    pub fn utc_offset(&self) -> Result<FixedOffset, ConfigError> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| ConfigError::Validation {
                message: format!(
                    "metrika.utc_offset_minutes out of range: {}",
                    self.utc_offset_minutes
                ),
            })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Intervals of the three periodic routines, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_create_interval")]
    pub create_interval_secs: u64,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_process_interval")]
    pub process_interval_secs: u64,
}

fn default_create_interval() -> u64 {
    4 * 60 * 60
}

fn default_refresh_interval() -> u64 {
    5
}

fn default_process_interval() -> u64 {
    60
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            create_interval_secs: default_create_interval(),
            refresh_interval_secs: default_refresh_interval(),
            process_interval_secs: default_process_interval(),
        }
    }
}

impl ScheduleConfig {
    pub fn create_interval(&self) -> Duration {
        Duration::from_secs(self.create_interval_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn process_interval(&self) -> Duration {
        Duration::from_secs(self.process_interval_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// `EnvFilter` directives, used when `RUST_LOG` is not set.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_filter(),
        }
    }
}
