//! Configuration management
//!
//! Layers, lowest priority first: built-in defaults, the config document
//! (YAML or JSON by extension), then `APISUITE_SETTINGS__*` environment
//! variables (`APISUITE_SETTINGS__CONCURRENCY=4`).
//!
//! The config document holds engine `settings` plus free-form keys; the
//! free-form keys become the lowest-priority variable layer.

use std::path::Path;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Environment variable prefix for settings overrides
pub const SETTINGS_ENV_PREFIX: &str = "APISUITE_SETTINGS__";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Engine settings
    #[serde(default)]
    pub settings: Settings,

    /// Free-form default variables (every other top-level key)
    #[serde(flatten)]
    pub variables: Map<String, Value>,
}

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Default per-request timeout in milliseconds
    #[serde(alias = "request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Number of tests run concurrently (1 = sequential)
    pub concurrency: usize,
    /// User-Agent header sent with every request
    #[serde(alias = "user_agent")]
    pub user_agent: String,
    /// Accept invalid TLS certificates
    pub insecure: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            concurrency: 1,
            user_agent: format!("apisuite/{}", env!("CARGO_PKG_VERSION")),
            insecure: false,
        }
    }
}

impl Settings {
    /// Default request timeout
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = match p.extension().and_then(|e| e.to_str()) {
                Some("json") => figment.merge(Json::file(p)),
                _ => figment.merge(Yaml::file(p)),
            };
        }

        figment = figment.merge(
            Env::prefixed(SETTINGS_ENV_PREFIX).map(|key| format!("settings.{key}").into()),
        );

        let config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        if config.settings.concurrency == 0 {
            return Err(Error::Config("settings.concurrency must be at least 1".to_string()));
        }
        Ok(config)
    }
}
