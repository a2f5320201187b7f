//! Shared doubles and fixtures for the server test suites.

mod bus;
mod config_loader;
mod maildir;
mod reporter;

pub use bus::RecordingBus;
pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use maildir::MaildirFixture;
pub use reporter::{HealthEvent, RecordingHealthReporter};
