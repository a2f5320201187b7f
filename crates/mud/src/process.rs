//! Process entry point: bootstrap, then serve in the configured mode.

use std::io;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use mu_config::ServiceMode;

use crate::bootstrap::{BootstrapError, ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::bus::SocketBus;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::service::{Service, ServiceError};
use crate::stdio::serve_stdio;

const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");

/// Errors that end the process with a failure status.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Bootstrapping the server failed.
    #[error("server bootstrap failed: {source}")]
    Bootstrap {
        /// Underlying bootstrap error.
        #[source]
        source: BootstrapError,
    },
    /// The bus service could not start.
    #[error("bus service failed: {source}")]
    Service {
        /// Underlying service error.
        #[source]
        source: ServiceError,
    },
    /// Reading requests from stdin failed.
    #[error("stdio session failed: {source}")]
    Stdio {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl From<BootstrapError> for LaunchError {
    fn from(source: BootstrapError) -> Self {
        Self::Bootstrap { source }
    }
}

impl From<ServiceError> for LaunchError {
    fn from(source: ServiceError) -> Self {
        Self::Service { source }
    }
}

impl From<io::Error> for LaunchError {
    fn from(source: io::Error) -> Self {
        Self::Stdio { source }
    }
}

/// Runs the server using the production collaborators.
///
/// # Errors
///
/// See [`run_server_with`].
pub fn run_server() -> Result<(), LaunchError> {
    run_server_with(&SystemConfigLoader, Arc::new(StructuredHealthReporter::new()))
}

/// Runs the server with injected collaborators.
///
/// In bus mode this returns once the service has stopped; in stdio mode
/// once the input ends or `quit` is received.
///
/// # Errors
///
/// Returns bootstrap, service startup and stdio read failures.
pub fn run_server_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
) -> Result<(), LaunchError> {
    let server = bootstrap_with(loader, reporter)?;
    let (config, mut context, reporter) = server.into_parts();
    info!(target: PROCESS_TARGET, mode = %config.mode(), "starting server");

    match config.mode() {
        ServiceMode::Bus => {
            let bus = SocketBus::new(config.bus_socket().clone());
            let mut service = Service::new(bus, context, reporter);
            service.run(config.bus_suffix())?;
        }
        ServiceMode::Stdio => {
            serve_stdio(&mut context, io::stdin().lock(), io::stdout().lock())?;
            reporter.stopped();
        }
    }

    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}
