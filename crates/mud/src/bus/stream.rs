//! Byte streams carrying bus frames.

use std::io::{self, Read, Write};
use std::net::TcpStream;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

use mu_config::SocketEndpoint;

use super::errors::BusError;

/// A connected bus socket.
#[derive(Debug)]
pub(crate) enum ConnectionStream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl ConnectionStream {
    /// Connects to a listening endpoint.
    pub(crate) fn connect(endpoint: &SocketEndpoint) -> Result<Self, BusError> {
        let connect_error = |source| BusError::Connect {
            endpoint: endpoint.to_string(),
            source,
        };
        match endpoint {
            SocketEndpoint::Tcp { host, port } => TcpStream::connect((host.as_str(), *port))
                .map(Self::Tcp)
                .map_err(connect_error),
            #[cfg(unix)]
            SocketEndpoint::Unix { path } => UnixStream::connect(path.as_std_path())
                .map(Self::Unix)
                .map_err(connect_error),
            #[cfg(not(unix))]
            SocketEndpoint::Unix { .. } => Err(BusError::UnsupportedUnix {
                endpoint: endpoint.to_string(),
            }),
        }
    }

    /// A second handle to the same socket, used for writing while another
    /// thread reads.
    pub(crate) fn try_clone(&self) -> io::Result<Self> {
        match self {
            Self::Tcp(stream) => stream.try_clone().map(Self::Tcp),
            #[cfg(unix)]
            Self::Unix(stream) => stream.try_clone().map(Self::Unix),
        }
    }

    /// Closes both directions so a blocked reader wakes up.
    pub(crate) fn shutdown(&self) {
        let _ = match self {
            Self::Tcp(stream) => stream.shutdown(std::net::Shutdown::Both),
            #[cfg(unix)]
            Self::Unix(stream) => stream.shutdown(std::net::Shutdown::Both),
        };
    }
}

impl Read for ConnectionStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for ConnectionStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
        }
    }
}
