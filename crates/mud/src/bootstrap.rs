//! Server bootstrap orchestration.

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;
use tracing::info;

use mu_config::Config;
use mu_store::{Store, StoreError};

use crate::context::PersistentContext;
use crate::health::HealthReporter;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

const BOOTSTRAP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::bootstrap");

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the server configuration.
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

/// Loader returning a configuration resolved elsewhere.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps an already-resolved configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
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
    /// The configured maildir could not be opened.
    #[error("failed to open the message store: {source}")]
    Store {
        /// Underlying store error.
        #[source]
        source: StoreError,
    },
}

/// Everything needed to start serving requests.
pub struct Server {
    config: Config,
    context: PersistentContext,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn HealthReporter>,
}

impl Server {
    /// The resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The process-wide context.
    #[must_use]
    pub fn context(&self) -> &PersistentContext {
        &self.context
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// The reporter used during bootstrap.
    #[must_use]
    pub fn reporter(&self) -> Arc<dyn HealthReporter> {
        Arc::clone(&self.reporter)
    }

    /// Splits the server into its configuration, context and reporter.
    #[must_use]
    pub fn into_parts(self) -> (Config, PersistentContext, Arc<dyn HealthReporter>) {
        (self.config, self.context, self.reporter)
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Server")
            .field("config", &self.config)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Bootstraps the server using the supplied collaborators.
///
/// Loads the configuration, installs telemetry and opens the message store.
/// When a maildir is configured it is indexed before the server starts;
/// otherwise the store starts empty.
///
/// # Errors
///
/// Returns the first failing step; the reporter sees the same error.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
) -> Result<Server, BootstrapError> {
    reporter.bootstrap_starting();

    let fail = |error: BootstrapError| {
        reporter.bootstrap_failed(&error);
        error
    };

    let config = loader
        .load()
        .map_err(|source| fail(BootstrapError::Configuration { source }))?;

    let telemetry = telemetry::initialise(&config)
        .map_err(|source| fail(BootstrapError::Telemetry { source }))?;

    let store = open_store(&config).map_err(|source| fail(BootstrapError::Store { source }))?;

    reporter.bootstrap_succeeded(&config);
    Ok(Server {
        config,
        context: PersistentContext::new(store),
        telemetry,
        reporter,
    })
}

fn open_store(config: &Config) -> Result<Store, StoreError> {
    let Some(root) = config.maildir() else {
        return Ok(Store::new());
    };
    let store = Store::open(root.as_std_path())?;
    let stats = store.index(root.as_std_path(), |_| {})?;
    info!(
        target: BOOTSTRAP_TARGET,
        maildir = %root,
        processed = stats.processed,
        "initial index completed"
    );
    Ok(store)
}
