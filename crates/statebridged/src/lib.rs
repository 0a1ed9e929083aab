//! The statebridge daemon.
//!
//! `statebridged` owns one JSON document store and serves it to a single
//! client over stdin and stdout, one protocol message per line. Startup
//! loads [`statebridge_config::Config`], installs structured logging on
//! stderr and reads the optional seed document. The session ends when stdin
//! closes.
//!
//! The document store understands four actions, described in [`document`].

mod bootstrap;
pub mod document;
mod health;
mod stdio;
pub mod telemetry;


use std::io;
use std::sync::Arc;

pub use self::bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use self::health::{HealthReporter, StructuredHealthReporter};
pub use self::stdio::{LineConnection, SessionStats, serve_lines};
pub use self::telemetry::{TelemetryError, TelemetryHandle};

pub(crate) const DOCUMENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::document");
pub(crate) const STDIO_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::stdio");

/// Failures that end the daemon.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Startup failed.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// Reading stdin failed.
    #[error("failed to read stdin: {0}")]
    Input(#[from] io::Error),
}

/// Bootstraps the daemon and serves stdin and stdout until stdin closes.
///
/// # Errors
///
/// Returns bootstrap failures and stdin read errors.
pub fn run(loader: &dyn ConfigLoader) -> Result<SessionStats, RunError> {
    let daemon = bootstrap_with(loader, Arc::new(StructuredHealthReporter::new()))?;
    let stats = daemon.serve(io::stdin().lock(), io::stdout())?;
    Ok(stats)
}
