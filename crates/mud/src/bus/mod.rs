//! Message-bus seam used by the service loop.
//!
//! The service owns a well-known name, publishes one object exposing an
//! `execute` method and answers each call exactly once. Everything the loop
//! needs from the bus is captured by the [`Bus`] trait so the loop can run
//! against the local [`SocketBus`] in production and a test double in tests.
//!
//! Inbound calls never re-enter the loop: the bus forwards them as
//! [`LoopEvent::MethodCall`] on the [`EventSender`] handed to
//! [`Bus::publish_object`], and the loop drains events one at a time.

mod client;
mod errors;
mod message;
mod name;
mod socket;
mod stream;

use std::fmt;
use std::sync::mpsc::Sender;

pub use self::client::{BusClient, CallOutcome};
pub use self::errors::BusError;
pub use self::message::BusMessage;
pub use self::name::{BASE_BUS_NAME, BusName, BusNameError};
pub use self::socket::SocketBus;

/// Tracing target for bus operations.
pub(crate) const BUS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::bus");

/// Path of the object manager exporting the service object.
pub const MANAGER_PATH: &str = "/mu";

/// Path of the service object. The manager path is a prefix of it.
pub const SERVICE_PATH: &str = "/mu/cache";

/// The single method exposed by the service object.
pub const EXECUTE_METHOD: &str = "execute";

/// Method on the manager object listing the published object paths.
pub const MANAGED_OBJECTS_METHOD: &str = "managed_objects";

/// Channel end through which the bus delivers events to the loop.
pub type EventSender = Sender<LoopEvent>;

/// Events processed by the service loop, strictly in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    /// A client invoked `execute` with a request payload.
    MethodCall {
        /// Handle used to complete the call.
        call: CallHandle,
        /// Request text.
        payload: String,
    },
    /// A terminating signal was delivered to the process.
    Signal(i32),
}

/// Opaque handle identifying one pending method call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallHandle {
    connection: u64,
    serial: u64,
}

impl CallHandle {
    /// Creates a handle for call `serial` received on `connection`.
    #[must_use]
    pub const fn new(connection: u64, serial: u64) -> Self {
        Self { connection, serial }
    }

    /// Identifier of the connection the call arrived on.
    #[must_use]
    pub const fn connection(&self) -> u64 {
        self.connection
    }

    /// Caller-chosen serial echoed in the reply.
    #[must_use]
    pub const fn serial(&self) -> u64 {
        self.serial
    }
}

impl fmt::Display for CallHandle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.connection, self.serial)
    }
}

/// Proof of name ownership, returned to [`Bus::release_name`].
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct NameHandle {
    id: u64,
}

impl NameHandle {
    /// Wraps a bus-specific ownership identifier.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self { id }
    }

    /// The ownership identifier.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }
}

/// Path of an object published on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectPath(String);

impl ObjectPath {
    /// Wraps a path such as `/mu/cache`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// The path of the service object.
    #[must_use]
    pub fn service() -> Self {
        Self::new(SERVICE_PATH)
    }

    /// The path as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Operations the service loop needs from a message bus.
pub trait Bus {
    /// Claims `name`. Fails when another live owner holds it.
    fn own_name(&self, name: &BusName) -> Result<NameHandle, BusError>;

    /// Gives up a name claimed with [`own_name`](Self::own_name).
    fn release_name(&self, handle: NameHandle);

    /// Exports the object at `path` below the [`MANAGER_PATH`] manager.
    /// Calls to its `execute` method are forwarded to `events`.
    fn publish_object(&self, path: &ObjectPath, events: EventSender) -> Result<(), BusError>;

    /// Completes a pending call with the reply text.
    fn complete_call(&self, call: CallHandle, reply: String);

    /// Broadcasts an out-of-band notification to every connected client.
    fn emit_notification(&self, payload: String);
}

impl<B: Bus + ?Sized> Bus for &B {
    fn own_name(&self, name: &BusName) -> Result<NameHandle, BusError> {
        (**self).own_name(name)
    }

    fn release_name(&self, handle: NameHandle) {
        (**self).release_name(handle);
    }

    fn publish_object(&self, path: &ObjectPath, events: EventSender) -> Result<(), BusError> {
        (**self).publish_object(path, events)
    }

    fn complete_call(&self, call: CallHandle, reply: String) {
        (**self).complete_call(call, reply);
    }

    fn emit_notification(&self, payload: String) {
        (**self).emit_notification(payload);
    }
}
