//! Log output for the daemon.
//!
//! Stdout carries protocol messages, so every log line goes to stderr. The
//! subscriber is installed once per process; the filter expression is checked
//! on every call so a bad configuration is rejected even after a subscriber
//! exists.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use statebridge_config::{Config, LogFormat};
use tracing::{Subscriber, info, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

const TELEMETRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::telemetry");

static INSTALLED_FORMAT: OnceCell<LogFormat> = OnceCell::new();

/// Proof that logging is set up, naming the format actually in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryHandle {
    format: LogFormat,
}

impl TelemetryHandle {
    /// Format of the installed subscriber. Later configurations do not
    /// change it.
    #[must_use]
    pub const fn format(self) -> LogFormat {
        self.format
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter expression does not parse.
    #[error("invalid log filter '{filter}': {message}")]
    Filter {
        /// The rejected expression.
        filter: String,
        /// Parser diagnostic.
        message: String,
    },
    /// Another subscriber already owns the global default.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the stderr subscriber on first use.
///
/// # Examples
///
/// ```rust
/// use statebridge_config::{Config, LogFormat};
/// use statebridged::telemetry;
///
/// # fn main() -> Result<(), statebridged::TelemetryError> {
/// let first = telemetry::initialise(&Config::default())?;
/// let compact = Config {
///     log_format: LogFormat::Compact,
///     ..Config::default()
/// };
/// let second = telemetry::initialise(&compact)?;
/// assert_eq!(second.format(), first.format());
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Fails when the filter expression is invalid or another subscriber is
/// already installed.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    let filter = parse_filter(config.log_filter())?;
    INSTALLED_FORMAT
        .get_or_try_init(|| install(filter, config.log_format()))
        .map(|format| TelemetryHandle { format: *format })
}

fn parse_filter(expression: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(expression).map_err(|error| TelemetryError::Filter {
        filter: expression.to_owned(),
        message: error.to_string(),
    })
}

fn install(filter: EnvFilter, format: LogFormat) -> Result<LogFormat, TelemetryError> {
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(fmt::time::UtcTime::rfc_3339());

    let subscriber: Box<dyn Subscriber + Send + Sync> = match format {
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    };
    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)?;
    info!(target: TELEMETRY_TARGET, %format, "telemetry installed");
    Ok(format)
}
