//! Client side of the local message bus.

use std::io::{BufRead, BufReader};

use mu_config::SocketEndpoint;

use super::errors::BusError;
use super::message::BusMessage;
use super::stream::ConnectionStream;
use super::{EXECUTE_METHOD, SERVICE_PATH};

/// Everything received while waiting for one reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOutcome {
    /// The reply text.
    pub reply: String,
    /// Out-of-band notifications received before the reply, in order.
    pub notifications: Vec<String>,
}

/// A blocking connection to a bus name.
#[derive(Debug)]
pub struct BusClient {
    reader: BufReader<ConnectionStream>,
    writer: ConnectionStream,
    next_serial: u64,
}

impl BusClient {
    /// Connects to the endpoint serving a name, as returned by
    /// [`SocketBus::endpoint_for`](super::SocketBus::endpoint_for).
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Connect`] when nothing listens at `endpoint`.
    pub fn connect(endpoint: &SocketEndpoint) -> Result<Self, BusError> {
        let stream = ConnectionStream::connect(endpoint)?;
        let writer = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
            next_serial: 1,
        })
    }

    /// Invokes `execute` on the service object.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub fn execute(&mut self, request: &str) -> Result<CallOutcome, BusError> {
        self.call(SERVICE_PATH, EXECUTE_METHOD, request)
    }

    /// Invokes `method` on the object at `path` and waits for its reply.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Remote`] when the bus rejects the call and
    /// [`BusError::Disconnected`] when the connection closes first.
    pub fn call(
        &mut self,
        path: &str,
        method: &str,
        payload: &str,
    ) -> Result<CallOutcome, BusError> {
        let serial = self.next_serial;
        self.next_serial += 1;
        BusMessage::Call {
            serial,
            path: path.to_owned(),
            method: method.to_owned(),
            payload: payload.to_owned(),
        }
        .write_to(&mut self.writer)?;

        let mut notifications = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Err(BusError::Disconnected);
            }
            if line.trim().is_empty() {
                continue;
            }
            match BusMessage::parse(&line)? {
                BusMessage::Notification { payload } => notifications.push(payload),
                BusMessage::Reply {
                    serial: replied,
                    payload,
                } if replied == serial => {
                    return Ok(CallOutcome {
                        reply: payload,
                        notifications,
                    });
                }
                BusMessage::Error {
                    serial: failed,
                    name,
                    message,
                } if failed == serial || failed == 0 => {
                    return Err(BusError::Remote { name, message });
                }
                _ => {}
            }
        }
    }
}
