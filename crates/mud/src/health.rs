//! Structured health reporting for server lifecycle events.

use std::sync::Arc;

use mu_config::Config;
use mu_store::ErrorCode;

use crate::bootstrap::BootstrapError;
use crate::bus::{BusName, ObjectPath};

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once the well-known bus name is owned.
    fn name_acquired(&self, name: &BusName);

    /// Invoked once the service object is published.
    fn object_published(&self, path: &ObjectPath);

    /// Invoked after each request has been answered.
    fn request_completed(&self, error: Option<ErrorCode>);

    /// Invoked when the loop is asked to stop, by `quit` or a signal.
    fn shutdown_requested(&self, reason: &str);

    /// Invoked after the service has released its name.
    fn stopped(&self);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn name_acquired(&self, name: &BusName) {
        (**self).name_acquired(name);
    }

    fn object_published(&self, path: &ObjectPath) {
        (**self).object_published(path);
    }

    fn request_completed(&self, error: Option<ErrorCode>) {
        (**self).request_completed(error);
    }

    fn shutdown_requested(&self, reason: &str) {
        (**self).shutdown_requested(reason);
    }

    fn stopped(&self) {
        (**self).stopped();
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting server bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            socket = %config.bus_socket(),
            mode = %config.mode(),
            maildir = ?config.maildir(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            "server bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "server bootstrap failed"
        );
    }

    fn name_acquired(&self, name: &BusName) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "name_acquired",
            name = %name,
            "bus name acquired"
        );
    }

    fn object_published(&self, path: &ObjectPath) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "object_published",
            path = %path,
            "service object published"
        );
    }

    fn request_completed(&self, error: Option<ErrorCode>) {
        match error {
            None => tracing::debug!(
                target: HEALTH_TARGET,
                event = "request_completed",
                "request answered"
            ),
            Some(code) => tracing::debug!(
                target: HEALTH_TARGET,
                event = "request_completed",
                code = code.code(),
                "request answered with an error"
            ),
        }
    }

    fn shutdown_requested(&self, reason: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "shutdown_requested",
            reason,
            "shutting down"
        );
    }

    fn stopped(&self) {
        tracing::info!(target: HEALTH_TARGET, event = "stopped", "server stopped");
    }
}
