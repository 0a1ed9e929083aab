//! Daemon bootstrap orchestration.

use std::fs;
use std::io::{self, BufRead, Write};
use std::rc::Rc;
use std::sync::Arc;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};
use statebridge_config::Config;
use statebridge_diff::Value;
use statebridge_host::{HostAdapter, HostContainer};
use thiserror::Error;

use crate::document::document_store;
use crate::health::HealthReporter;
use crate::stdio::{LineConnection, SessionStats, serve_lines};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    ///
    /// # Errors
    ///
    /// Returns the loader's aggregated configuration error.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader returning a fixed configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps a configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The seed document could not be read.
    #[error("failed to read seed document '{path}': {source}")]
    SeedRead {
        /// Configured seed location.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The seed document is not valid JSON.
    #[error("seed document '{path}' is not valid JSON: {source}")]
    SeedFormat {
        /// Configured seed location.
        path: Utf8PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

/// A bootstrapped daemon, ready to serve one session.
pub struct Daemon {
    config: Config,
    host: HostContainer,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn HealthReporter>,
}

impl Daemon {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The served host.
    #[must_use]
    pub const fn host(&self) -> &HostContainer {
        &self.host
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Serves the host to one client: messages are read from `input` and
    /// replies written to `output`, one per line, until `input` closes.
    ///
    /// The adapter is destroyed at end of input; the host keeps its state.
    ///
    /// # Errors
    ///
    /// Returns the first read error on `input`.
    pub fn serve<R, W>(&self, input: R, output: W) -> io::Result<SessionStats>
    where
        R: BufRead,
        W: Write + 'static,
    {
        let adapter = HostAdapter::new(
            self.host.clone(),
            Rc::new(LineConnection::new(output)),
            self.config.error_policy(),
        );
        let served = serve_lines(input, self.config.max_line_bytes(), |line| {
            adapter.handle_message(line);
        });
        adapter.destroy();
        let stats = served?;
        self.reporter.session_finished(&stats);
        Ok(stats)
    }
}

/// Bootstraps the daemon using the supplied collaborators.
///
/// # Errors
///
/// Fails when configuration, telemetry or the seed document cannot be
/// loaded.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();

    let prepared = prepare(loader);
    match prepared {
        Ok((config, telemetry, seed)) => {
            let host = HostContainer::single(config.store_key(), document_store(seed));
            reporter.bootstrap_succeeded(&config);
            Ok(Daemon {
                config,
                host,
                telemetry,
                reporter,
            })
        }
        Err(error) => {
            reporter.bootstrap_failed(&error);
            Err(error)
        }
    }
}

fn prepare(loader: &dyn ConfigLoader) -> Result<(Config, TelemetryHandle, Value), BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    let telemetry =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;
    let seed = load_seed(&config)?;
    Ok((config, telemetry, seed))
}

/// Reads the configured seed document; an empty object when none is set.
fn load_seed(config: &Config) -> Result<Value, BootstrapError> {
    let Some(path) = config.seed_path() else {
        return Ok(Value::object::<String, _>([]));
    };
    let text = fs::read_to_string(path).map_err(|source| BootstrapError::SeedRead {
        path: path.to_owned(),
        source,
    })?;
    let json: serde_json::Value =
        serde_json::from_str(&text).map_err(|source| BootstrapError::SeedFormat {
            path: path.to_owned(),
            source,
        })?;
    Ok(Value::from(json))
}
