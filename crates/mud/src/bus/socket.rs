//! Local message bus over Unix or TCP sockets.
//!
//! Owning a name binds a listener at the endpoint derived from the configured
//! bus socket, so a second process asking for the same name finds the socket
//! alive and is refused. Each accepted connection gets a reader thread that
//! decodes [`BusMessage::Call`] frames and forwards `execute` calls to the
//! loop; replies and notifications are written back from the loop thread.

use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Read};
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use mu_config::SocketEndpoint;
use mu_sexp::Sexp;
use tracing::{debug, info, warn};

#[cfg(unix)]
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};
#[cfg(unix)]
use std::path::Path;

use super::errors::BusError;
use super::message::BusMessage;
use super::name::BusName;
use super::stream::ConnectionStream;
use super::{
    BUS_TARGET, Bus, CallHandle, EXECUTE_METHOD, EventSender, LoopEvent, MANAGED_OBJECTS_METHOD,
    MANAGER_PATH, NameHandle, ObjectPath,
};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Largest frame accepted from a client.
pub(crate) const MAX_FRAME_BYTES: usize = 1024 * 1024;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the loop thread and connection threads.
#[derive(Debug, Default)]
struct Shared {
    objects: Mutex<HashMap<String, EventSender>>,
    connections: Mutex<HashMap<u64, Arc<Mutex<ConnectionStream>>>>,
    next_id: AtomicU64,
}

impl Shared {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn send_to(&self, connection: u64, frame: &BusMessage) -> bool {
        let Some(writer) = lock(&self.connections).get(&connection).cloned() else {
            return false;
        };
        let mut stream = lock(&writer);
        if let Err(error) = frame.write_to(&mut *stream) {
            warn!(target: BUS_TARGET, connection, %error, "failed to write bus frame");
        }
        true
    }

    /// Routes one inbound frame. Returns a frame to send straight back when
    /// the bus answers the call itself.
    fn route(&self, connection: u64, line: &str) -> Option<BusMessage> {
        let frame = match BusMessage::parse(line) {
            Ok(frame) => frame,
            Err(error) => return Some(BusMessage::error(0, "malformed_frame", error.to_string())),
        };
        let BusMessage::Call {
            serial,
            path,
            method,
            payload,
        } = frame
        else {
            return Some(BusMessage::error(
                0,
                "unexpected_frame",
                "clients may only send calls",
            ));
        };

        if path == MANAGER_PATH && method == MANAGED_OBJECTS_METHOD {
            let mut paths: Vec<String> = lock(&self.objects).keys().cloned().collect();
            paths.sort();
            let listing = Sexp::list(paths.into_iter().map(Sexp::string));
            return Some(BusMessage::Reply {
                serial,
                payload: listing.to_string(),
            });
        }

        let Some(events) = lock(&self.objects).get(&path).cloned() else {
            return Some(BusMessage::error(
                serial,
                "unknown_object",
                format!("no object at {path}"),
            ));
        };
        if method != EXECUTE_METHOD {
            return Some(BusMessage::error(
                serial,
                "unknown_method",
                format!("{path} has no method {method}"),
            ));
        }

        let call = CallHandle::new(connection, serial);
        debug!(target: BUS_TARGET, %call, "forwarding method call");
        if events.send(LoopEvent::MethodCall { call, payload }).is_err() {
            return Some(BusMessage::error(
                serial,
                "service_unavailable",
                "the service loop has stopped",
            ));
        }
        None
    }

    fn disconnect_all(&self) {
        let connections: Vec<_> = lock(&self.connections).drain().collect();
        for (_, writer) in connections {
            lock(&writer).shutdown();
        }
    }
}

#[derive(Debug)]
struct OwnedName {
    name: BusName,
    shutdown: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

/// Bus implementation backed by one listening socket per owned name.
#[derive(Debug)]
pub struct SocketBus {
    endpoint: SocketEndpoint,
    shared: Arc<Shared>,
    names: Mutex<HashMap<u64, OwnedName>>,
}

impl SocketBus {
    /// Creates a bus whose names are served next to `endpoint`.
    #[must_use]
    pub fn new(endpoint: SocketEndpoint) -> Self {
        Self {
            endpoint,
            shared: Arc::new(Shared::default()),
            names: Mutex::new(HashMap::new()),
        }
    }

    /// Endpoint a client must connect to in order to reach `name`.
    #[must_use]
    pub fn endpoint_for(&self, name: &BusName) -> SocketEndpoint {
        self.endpoint.for_name(name.as_str())
    }
}

impl Bus for SocketBus {
    fn own_name(&self, name: &BusName) -> Result<NameHandle, BusError> {
        let endpoint = self.endpoint_for(name);
        endpoint
            .prepare_filesystem()
            .map_err(|source| BusError::Prepare { source })?;
        let listener = Listener::bind(&endpoint, name)?;
        listener.set_nonblocking()?;

        let id = self.shared.next_id();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shared = Arc::clone(&self.shared);
        let flag = Arc::clone(&shutdown);
        let thread = thread::spawn(move || run_accept_loop(&listener, &shared, &flag));
        lock(&self.names).insert(
            id,
            OwnedName {
                name: name.clone(),
                shutdown,
                thread: Some(thread),
            },
        );
        info!(target: BUS_TARGET, %name, %endpoint, "bus name owned");
        Ok(NameHandle::new(id))
    }

    fn release_name(&self, handle: NameHandle) {
        let Some(mut owned) = lock(&self.names).remove(&handle.id()) else {
            return;
        };
        owned.shutdown.store(true, Ordering::SeqCst);
        if let Some(thread) = owned.thread.take()
            && thread.join().is_err()
        {
            warn!(target: BUS_TARGET, name = %owned.name, "listener thread panicked");
        }
        lock(&self.shared.objects).clear();
        self.shared.disconnect_all();
        info!(target: BUS_TARGET, name = %owned.name, "bus name released");
    }

    fn publish_object(&self, path: &ObjectPath, events: EventSender) -> Result<(), BusError> {
        if lock(&self.names).is_empty() {
            return Err(BusError::NotConnected);
        }
        let mut objects = lock(&self.shared.objects);
        if objects.contains_key(path.as_str()) {
            return Err(BusError::ObjectExists {
                path: path.to_string(),
            });
        }
        objects.insert(path.as_str().to_owned(), events);
        info!(target: BUS_TARGET, %path, manager = MANAGER_PATH, "object published");
        Ok(())
    }

    fn complete_call(&self, call: CallHandle, reply: String) {
        let frame = BusMessage::Reply {
            serial: call.serial(),
            payload: reply,
        };
        if !self.shared.send_to(call.connection(), &frame) {
            debug!(target: BUS_TARGET, %call, "caller disconnected before the reply");
        }
    }

    fn emit_notification(&self, payload: String) {
        let frame = BusMessage::Notification { payload };
        let connections: Vec<u64> = lock(&self.shared.connections).keys().copied().collect();
        for connection in connections {
            self.shared.send_to(connection, &frame);
        }
    }
}

impl Drop for SocketBus {
    fn drop(&mut self) {
        let ids: Vec<u64> = lock(&self.names).keys().copied().collect();
        for id in ids {
            self.release_name(NameHandle::new(id));
        }
    }
}

#[derive(Debug)]
enum Listener {
    Tcp(TcpListener, SocketEndpoint),
    #[cfg(unix)]
    Unix(UnixListener, SocketEndpoint),
}

impl Listener {
    fn bind(endpoint: &SocketEndpoint, name: &BusName) -> Result<Self, BusError> {
        match endpoint {
            SocketEndpoint::Tcp { host, port } => {
                Ok(Self::Tcp(bind_tcp(host, *port, name)?, endpoint.clone()))
            }
            #[cfg(unix)]
            SocketEndpoint::Unix { path } => Ok(Self::Unix(
                bind_unix(path.as_std_path(), name)?,
                endpoint.clone(),
            )),
            #[cfg(not(unix))]
            SocketEndpoint::Unix { .. } => Err(BusError::UnsupportedUnix {
                endpoint: endpoint.to_string(),
            }),
        }
    }

    fn set_nonblocking(&self) -> Result<(), BusError> {
        let result = match self {
            Self::Tcp(listener, _) => listener.set_nonblocking(true),
            #[cfg(unix)]
            Self::Unix(listener, _) => listener.set_nonblocking(true),
        };
        result.map_err(|source| {
            self.cleanup();
            BusError::NonBlocking { source }
        })
    }

    fn endpoint(&self) -> &SocketEndpoint {
        match self {
            Self::Tcp(_, endpoint) => endpoint,
            #[cfg(unix)]
            Self::Unix(_, endpoint) => endpoint,
        }
    }

    fn accept(&self) -> io::Result<Option<ConnectionStream>> {
        let accepted = match self {
            Self::Tcp(listener, _) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(ConnectionStream::Tcp(stream))
            }),
            #[cfg(unix)]
            Self::Unix(listener, _) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(ConnectionStream::Unix(stream))
            }),
        };
        match accepted {
            Ok(stream) => Ok(Some(stream)),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(error),
        }
    }

    fn cleanup(&self) {
        #[cfg(unix)]
        if let Self::Unix(_, SocketEndpoint::Unix { path }) = self
            && let Err(error) = fs::remove_file(path.as_std_path())
            && error.kind() != io::ErrorKind::NotFound
        {
            warn!(target: BUS_TARGET, %error, %path, "failed to remove unix socket file");
        }
    }
}

fn run_accept_loop(listener: &Listener, shared: &Arc<Shared>, shutdown: &AtomicBool) {
    debug!(target: BUS_TARGET, endpoint = %listener.endpoint(), "bus listener active");
    let mut last_error = None::<io::ErrorKind>;
    while !shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok(Some(stream)) => {
                last_error = None;
                let shared = Arc::clone(shared);
                thread::spawn(move || serve_connection(&shared, stream));
            }
            Ok(None) => thread::sleep(ACCEPT_BACKOFF),
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(target: BUS_TARGET, %error, "bus accept error");
                }
                last_error = Some(kind);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
    listener.cleanup();
}

fn serve_connection(shared: &Shared, stream: ConnectionStream) {
    let id = shared.next_id();
    let writer = match stream.try_clone() {
        Ok(writer) => Arc::new(Mutex::new(writer)),
        Err(error) => {
            warn!(target: BUS_TARGET, %error, "failed to clone connection");
            return;
        }
    };
    lock(&shared.connections).insert(id, writer);
    debug!(target: BUS_TARGET, connection = id, "client connected");

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        match read_frame(&mut reader, &mut line) {
            Ok(0) => break,
            Ok(_) if line.trim().is_empty() => {}
            Ok(_) => {
                if let Some(frame) = shared.route(id, &line) {
                    shared.send_to(id, &frame);
                }
            }
            Err(error) => {
                debug!(target: BUS_TARGET, connection = id, %error, "connection read failed");
                shared.send_to(id, &BusMessage::error(0, "read_failed", error.to_string()));
                break;
            }
        }
    }

    lock(&shared.connections).remove(&id);
    debug!(target: BUS_TARGET, connection = id, "client disconnected");
}

/// Reads one newline-terminated frame of at most [`MAX_FRAME_BYTES`].
fn read_frame<R: BufRead>(reader: &mut R, line: &mut String) -> io::Result<usize> {
    let limit = u64::try_from(MAX_FRAME_BYTES).unwrap_or(u64::MAX) + 1;
    let read = reader.by_ref().take(limit).read_line(line)?;
    if read > MAX_FRAME_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "frame exceeds maximum size",
        ));
    }
    Ok(read)
}

fn bind_tcp(host: &str, port: u16, name: &BusName) -> Result<TcpListener, BusError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| BusError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?;
    let addr = addrs
        .find(|addr| matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_)))
        .ok_or_else(|| BusError::ResolveEmpty {
            host: host.to_owned(),
            port,
        })?;
    TcpListener::bind(addr).map_err(|source| {
        if source.kind() == io::ErrorKind::AddrInUse {
            BusError::NameTaken {
                name: name.to_string(),
            }
        } else {
            BusError::BindTcp { addr, source }
        }
    })
}

#[cfg(unix)]
fn bind_unix(path: &Path, name: &BusName) -> Result<UnixListener, BusError> {
    let cleanup_error = |source| BusError::UnixCleanup {
        path: path.display().to_string(),
        source,
    };
    if path.exists() {
        let metadata = fs::symlink_metadata(path).map_err(cleanup_error)?;
        if !metadata.file_type().is_socket() {
            return Err(BusError::UnixNotSocket {
                path: path.display().to_string(),
            });
        }
        match UnixStream::connect(path) {
            Ok(_live) => {
                return Err(BusError::NameTaken {
                    name: name.to_string(),
                });
            }
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
                ) =>
            {
                fs::remove_file(path).map_err(cleanup_error)?;
            }
            Err(error) => return Err(cleanup_error(error)),
        }
    }

    UnixListener::bind(path).map_err(|source| BusError::BindUnix {
        path: path.display().to_string(),
        source,
    })
}
