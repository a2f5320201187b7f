//! Test double for [`HealthReporter`] that records lifecycle events.

use std::sync::Mutex;

use mu_config::Config;
use mu_store::ErrorCode;

use crate::bootstrap::BootstrapError;
use crate::bus::{BusName, ObjectPath};
use crate::health::HealthReporter;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    NameAcquired(String),
    ObjectPublished(String),
    RequestCompleted(Option<ErrorCode>),
    ShutdownRequested(String),
    Stopped,
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn name_acquired(&self, name: &BusName) {
        self.record(HealthEvent::NameAcquired(name.to_string()));
    }

    fn object_published(&self, path: &ObjectPath) {
        self.record(HealthEvent::ObjectPublished(path.to_string()));
    }

    fn request_completed(&self, error: Option<ErrorCode>) {
        self.record(HealthEvent::RequestCompleted(error));
    }

    fn shutdown_requested(&self, reason: &str) {
        self.record(HealthEvent::ShutdownRequested(reason.to_owned()));
    }

    fn stopped(&self) {
        self.record(HealthEvent::Stopped);
    }
}
