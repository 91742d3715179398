//! Runtime settings for the tripwire binary
//!
//! Settings are layered: built-in defaults, then an optional settings file,
//! then `TRIPWIRE__`-prefixed environment variables
//! (`TRIPWIRE__APPLY__MAX_ATTEMPTS=6`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tripwire_engine::RetryPolicy;

/// Top-level settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Apply behaviour
    #[serde(default)]
    pub apply: ApplySettings,

    /// State file used when `--state` is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level or filter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Apply configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplySettings {
    /// Budget for a whole pass in seconds; unset means no limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Attempts per throttled call, first attempt included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay")]
    pub base_delay_millis: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_millis: u64,
}

impl Default for ApplySettings {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            max_attempts: default_max_attempts(),
            base_delay_millis: default_base_delay(),
            max_delay_millis: default_max_delay(),
        }
    }
}

impl ApplySettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_millis),
            max_delay: Duration::from_millis(self.max_delay_millis),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_attempts() -> u32 {
    4
}

fn default_base_delay() -> u64 {
    250
}

fn default_max_delay() -> u64 {
    8_000
}

impl Settings {
    /// Load settings from an optional file and the process environment
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        Self::load_with_env(path, None)
    }

    /// Like [`Settings::load`], reading variables from `env` when given
    pub fn load_with_env(
        path: Option<&str>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&Settings::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("TRIPWIRE")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        builder.build()?.try_deserialize()
    }
}
