//! Layered configuration for the mu server.
//!
//! Values are resolved from built-in defaults, a TOML file
//! (`--config-path` or `MUD_CONFIG_PATH`), `MUD_*` environment variables and
//! command-line flags, later sources overriding earlier ones.

mod defaults;
mod logging;
mod mode;
mod socket;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_TCP_PORT, RUNTIME_NAMESPACE, default_bus_socket,
    default_log_filter, default_log_filter_string, default_log_format, default_mode,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use mode::ServiceMode;
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "MUD")]
pub struct Config {
    /// Endpoint of the local message bus.
    #[ortho_config(default = default_bus_socket())]
    pub bus_socket: SocketEndpoint,
    /// Optional suffix appended to the well-known bus name so several
    /// stores can be served side by side.
    pub bus_suffix: Option<String>,
    /// Request transport.
    #[ortho_config(default = default_mode())]
    pub mode: ServiceMode,
    /// Maildir root opened at startup.
    pub maildir: Option<Utf8PathBuf>,
    /// `tracing` filter directive.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Log output format.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bus_socket: default_bus_socket(),
            bus_suffix: None,
            mode: default_mode(),
            maildir: None,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Endpoint of the local message bus.
    #[must_use]
    pub fn bus_socket(&self) -> &SocketEndpoint {
        &self.bus_socket
    }

    /// Suffix for the well-known bus name, if any.
    #[must_use]
    pub fn bus_suffix(&self) -> Option<&str> {
        self.bus_suffix.as_deref()
    }

    /// Request transport.
    #[must_use]
    pub fn mode(&self) -> ServiceMode {
        self.mode
    }

    /// Maildir root opened at startup, if any.
    #[must_use]
    pub fn maildir(&self) -> Option<&Utf8PathBuf> {
        self.maildir.as_ref()
    }

    /// `tracing` filter directive.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
