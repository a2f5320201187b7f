use camino::Utf8PathBuf;
use std::env;

#[cfg(unix)]
use libc::geteuid;

#[cfg(unix)]
use dirs::runtime_dir;

use crate::logging::LogFormat;
use crate::mode::ServiceMode;
use crate::socket::SocketEndpoint;

/// TCP port used for the bus when Unix domain sockets are not available.
pub const DEFAULT_TCP_PORT: u16 = 9797;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Name of the directory, below the runtime directory, holding bus sockets.
pub const RUNTIME_NAMESPACE: &str = "mu";

/// Default log filter expression.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default request transport.
pub fn default_mode() -> ServiceMode {
    ServiceMode::Bus
}

/// Computes the default bus endpoint.
///
/// On Unix this is `$XDG_RUNTIME_DIR/mu/bus.sock`, falling back to a
/// per-user directory under the system temporary directory.
pub fn default_bus_socket() -> SocketEndpoint {
    default_bus_socket_inner()
}

#[cfg(unix)]
fn default_bus_socket_inner() -> SocketEndpoint {
    let (mut base, per_user) = match runtime_dir().and_then(|p| Utf8PathBuf::from_path_buf(p).ok())
    {
        Some(dir) => (dir, false),
        None => (fallback_base_directory(), true),
    };

    base.push(RUNTIME_NAMESPACE);
    if per_user {
        let uid = unsafe { geteuid() };
        base.push(format!("uid-{uid}"));
    }
    SocketEndpoint::unix(base.join("bus.sock"))
}

#[cfg(unix)]
fn fallback_base_directory() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(not(unix))]
fn default_bus_socket_inner() -> SocketEndpoint {
    SocketEndpoint::tcp("127.0.0.1", DEFAULT_TCP_PORT)
}
