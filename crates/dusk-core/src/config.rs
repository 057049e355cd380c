//! dusk.toml configuration parser.
//!
//! Every scheduling key is required and has no default; a missing key is
//! fatal at startup. Each key may also come from the environment, which
//! wins over the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// File-level shape; everything optional until validated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConfig {
    pub notify_lead_minutes: Option<u32>,
    pub shutdown_window_minutes: Option<u32>,
    pub from_address: Option<String>,
    pub postpone_callback_url: Option<String>,
    pub token_store_name: Option<String>,
    pub token_ttl_minutes: Option<u32>,
    pub postpone_by_hours: Option<u32>,
    pub call_timeout_secs: Option<u64>,
    pub daemon: Option<DaemonConfig>,
    pub notifier: Option<NotifierConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_interval")]
    pub evaluate_interval_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            data_dir: default_data_dir(),
            evaluate_interval_secs: default_interval(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/dusk")
}

fn default_interval() -> u64 {
    60
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Mail relay endpoint. Without it notices are only logged.
    pub webhook_url: Option<String>,
}

/// Validated configuration injected into the evaluator and handler.
#[derive(Debug, Clone, PartialEq)]
pub struct DuskConfig {
    pub notify_lead_minutes: u32,
    pub shutdown_window_minutes: u32,
    pub from_address: String,
    pub postpone_callback_url: String,
    pub token_store_name: String,
    pub token_ttl_minutes: u32,
    pub postpone_by_hours: u32,
    pub call_timeout_secs: u64,
    pub daemon: DaemonConfig,
    pub notifier: NotifierConfig,
}

/// (config key, environment variable) pairs for the required settings.
const ENV_KEYS: [(&str, &str); 7] = [
    ("notify_lead_minutes", "SEND_EMAIL_BEFORE_MIN"),
    ("shutdown_window_minutes", "EC2_SHUTDOWN_WINDOW"),
    ("from_address", "EMAIL_FROM_ADDRESS"),
    ("postpone_callback_url", "API_GATEWAY_POSTPONE_ENDPOINT"),
    ("token_store_name", "DYNAMODB_TABLE_NAME"),
    ("token_ttl_minutes", "TOKEN_TTL_MIN"),
    ("postpone_by_hours", "POSTPONE_SHUTDOWN_BY_HRS"),
];

fn env_name(key: &'static str) -> &'static str {
    ENV_KEYS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, env)| *env)
        .unwrap_or(key)
}

impl RawConfig {
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Overlay values from `lookup` (normally `std::env::var`).
    pub fn apply_env<F>(mut self, lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn number(key: &'static str, value: &str) -> CoreResult<u32> {
            value
                .trim()
                .parse()
                .map_err(|e: std::num::ParseIntError| CoreError::ConfigurationInvalid {
                    key,
                    reason: e.to_string(),
                })
        }

        for (key, env) in ENV_KEYS {
            let Some(value) = lookup(env) else { continue };
            match key {
                "notify_lead_minutes" => self.notify_lead_minutes = Some(number(key, &value)?),
                "shutdown_window_minutes" => {
                    self.shutdown_window_minutes = Some(number(key, &value)?)
                }
                "from_address" => self.from_address = Some(value),
                "postpone_callback_url" => self.postpone_callback_url = Some(value),
                "token_store_name" => self.token_store_name = Some(value),
                "token_ttl_minutes" => self.token_ttl_minutes = Some(number(key, &value)?),
                "postpone_by_hours" => self.postpone_by_hours = Some(number(key, &value)?),
                _ => {}
            }
        }
        Ok(self)
    }

    pub fn validate(self) -> CoreResult<DuskConfig> {
        fn required<T>(value: Option<T>, key: &'static str) -> CoreResult<T> {
            value.ok_or(CoreError::ConfigurationMissing {
                key,
                env: env_name(key),
            })
        }
        fn non_empty(value: Option<String>, key: &'static str) -> CoreResult<String> {
            required(value.filter(|v| !v.trim().is_empty()), key)
        }

        let config = DuskConfig {
            notify_lead_minutes: required(self.notify_lead_minutes, "notify_lead_minutes")?,
            shutdown_window_minutes: required(
                self.shutdown_window_minutes,
                "shutdown_window_minutes",
            )?,
            from_address: non_empty(self.from_address, "from_address")?,
            postpone_callback_url: non_empty(self.postpone_callback_url, "postpone_callback_url")?,
            token_store_name: non_empty(self.token_store_name, "token_store_name")?,
            token_ttl_minutes: required(self.token_ttl_minutes, "token_ttl_minutes")?,
            postpone_by_hours: required(self.postpone_by_hours, "postpone_by_hours")?,
            call_timeout_secs: self.call_timeout_secs.unwrap_or(10),
            daemon: self.daemon.unwrap_or_default(),
            notifier: self.notifier.unwrap_or_default(),
        };

        if config.postpone_by_hours == 0 {
            return Err(CoreError::ConfigurationInvalid {
                key: "postpone_by_hours",
                reason: "must be at least 1".to_string(),
            });
        }
        if config.token_ttl_minutes == 0 {
            return Err(CoreError::ConfigurationInvalid {
                key: "token_ttl_minutes",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(config)
    }
}

impl DuskConfig {
    /// Load from an optional file, then the process environment.
    pub fn load(path: Option<&Path>) -> CoreResult<Self> {
        let raw = match path {
            Some(p) => RawConfig::from_file(p)?,
            None => RawConfig::default(),
        };
        raw.apply_env(|key| std::env::var(key).ok())?.validate()
    }

    pub fn call_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.call_timeout_secs)
    }

    pub fn token_ttl_secs(&self) -> i64 {
        i64::from(self.token_ttl_minutes) * 60
    }
}
