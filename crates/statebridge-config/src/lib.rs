//! Layered configuration for the statebridge daemon.
//!
//! Values are merged from defaults, an optional configuration file
//! (`--config-path` or `STATEBRIDGE_CONFIG_PATH`), `STATEBRIDGE_*`
//! environment variables and command-line flags, later layers winning.

mod defaults;


use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use statebridge_protocol::ErrorPolicy;
use strum::{Display, EnumString};

pub use self::defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_MAX_LINE_BYTES, DEFAULT_STORE_KEY, default_error_policy,
    default_log_filter, default_log_filter_string, default_log_format, default_max_line_bytes,
    default_store_key_string,
};

/// Layout of log lines written to stderr.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Terse human-readable lines.
    Compact,
}

/// Error returned when text names no [`LogFormat`].
pub type LogFormatParseError = strum::ParseError;

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "STATEBRIDGE")]
pub struct Config {
    /// `tracing` filter expression, e.g. `info` or `statebridge_host=debug`.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Log output format.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Whether failed requests are answered with `error` messages.
    #[ortho_config(default = default_error_policy())]
    pub error_policy: ErrorPolicy,
    /// Key of the store served to clients.
    #[ortho_config(default = default_store_key_string())]
    pub store_key: String,
    /// JSON document seeding the served store; `{}` when unset.
    #[serde(default)]
    pub seed_path: Option<Utf8PathBuf>,
    /// Longest inbound line accepted, in bytes. Longer lines are dropped.
    #[ortho_config(default = default_max_line_bytes())]
    pub max_line_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            error_policy: default_error_policy(),
            store_key: default_store_key_string(),
            seed_path: None,
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

impl Config {
    /// Filter expression handed to the log subscriber.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Error policy applied by the host adapter.
    #[must_use]
    pub const fn error_policy(&self) -> ErrorPolicy {
        self.error_policy
    }

    /// Key of the served store.
    #[must_use]
    pub fn store_key(&self) -> &str {
        &self.store_key
    }

    /// Seed document location, if any.
    #[must_use]
    pub fn seed_path(&self) -> Option<&Utf8Path> {
        self.seed_path.as_deref()
    }

    /// Inbound line limit in bytes.
    #[must_use]
    pub const fn max_line_bytes(&self) -> usize {
        self.max_line_bytes
    }
}
