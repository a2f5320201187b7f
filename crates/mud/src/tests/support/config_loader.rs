//! Configuration loaders for scenarios covering success and failure paths.

use std::ffi::OsString;
use std::sync::Arc;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;

use mu_config::{Config, SocketEndpoint};

use crate::bootstrap::ConfigLoader;

/// Loader pointing the bus socket into a temporary directory, optionally
/// with a maildir.
pub struct TestConfigLoader {
    socket_dir: TempDir,
    maildir: Option<Utf8PathBuf>,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temporary directory for socket");
        Self {
            socket_dir: dir,
            maildir: None,
        }
    }

    /// Configures the maildir opened at startup.
    #[must_use]
    pub fn with_maildir(mut self, maildir: impl Into<Utf8PathBuf>) -> Self {
        self.maildir = Some(maildir.into());
        self
    }

    fn socket_path(&self) -> Utf8PathBuf {
        let path = self.socket_dir.path().join("bus.sock");
        Utf8PathBuf::from_path_buf(path).expect("temporary socket path was not valid UTF-8")
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Config {
            bus_socket: SocketEndpoint::unix(self.socket_path()),
            maildir: self.maildir.clone(),
            ..Config::default()
        })
    }
}

/// Loader that intentionally fails by passing an invalid socket URL.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("mud"),
            OsString::from("--bus-socket"),
            OsString::from("invalid://socket"),
        ];
        Config::load_from_iter(args)
    }
}
