//! Errors raised by the local message bus.

use std::io;
use std::net::SocketAddr;

use mu_config::SocketPreparationError;
use thiserror::Error;

/// Failures while owning names, publishing objects or talking to the bus.
#[derive(Debug, Error)]
pub enum BusError {
    /// Another live process already owns the name.
    #[error("bus name {name} is already owned")]
    NameTaken {
        /// The contested name.
        name: String,
    },
    /// An object is already published at the path.
    #[error("object {path} is already published")]
    ObjectExists {
        /// The contested path.
        path: String,
    },
    /// No name is owned, so nothing can be published.
    #[error("no bus name is owned")]
    NotConnected,
    /// The socket directory could not be prepared.
    #[error("failed to prepare bus socket: {source}")]
    Prepare {
        /// Underlying filesystem error.
        #[source]
        source: SocketPreparationError,
    },
    /// The TCP host did not resolve.
    #[error("failed to resolve TCP address {host}:{port}: {source}")]
    Resolve {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
        /// Resolver error.
        #[source]
        source: io::Error,
    },
    /// The TCP host resolved to nothing usable.
    #[error("no TCP addresses resolved for {host}:{port}")]
    ResolveEmpty {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
    },
    /// Binding the TCP listener failed.
    #[error("failed to bind TCP listener at {addr}: {source}")]
    BindTcp {
        /// Resolved address.
        addr: SocketAddr,
        /// Bind error.
        #[source]
        source: io::Error,
    },
    /// Unix sockets are not available on this platform.
    #[cfg(not(unix))]
    #[error("unix sockets are unsupported for endpoint {endpoint}")]
    UnsupportedUnix {
        /// Configured endpoint.
        endpoint: String,
    },
    /// Binding the Unix listener failed.
    #[cfg(unix)]
    #[error("failed to bind unix listener at {path}: {source}")]
    BindUnix {
        /// Socket path.
        path: String,
        /// Bind error.
        #[source]
        source: io::Error,
    },
    /// A non-socket file occupies the socket path.
    #[cfg(unix)]
    #[error("unix socket path {path} is not a socket")]
    UnixNotSocket {
        /// Socket path.
        path: String,
    },
    /// A stale socket file could not be inspected or removed.
    #[cfg(unix)]
    #[error("failed to clear stale unix socket {path}: {source}")]
    UnixCleanup {
        /// Socket path.
        path: String,
        /// Filesystem error.
        #[source]
        source: io::Error,
    },
    /// Switching the listener to non-blocking mode failed.
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Connecting to a bus endpoint failed.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        /// Endpoint the client tried.
        endpoint: String,
        /// Connect error.
        #[source]
        source: io::Error,
    },
    /// Reading or writing a frame failed.
    #[error("bus I/O failed: {0}")]
    Io(#[from] io::Error),
    /// A frame could not be encoded or decoded.
    #[error("malformed bus frame: {0}")]
    Frame(#[from] serde_json::Error),
    /// The peer closed the connection before replying.
    #[error("connection closed before the reply arrived")]
    Disconnected,
    /// The bus rejected a call.
    #[error("bus error {name}: {message}")]
    Remote {
        /// Error name such as `unknown_object`.
        name: String,
        /// Description.
        message: String,
    },
}
