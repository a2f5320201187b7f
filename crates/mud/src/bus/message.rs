//! JSONL frames exchanged between bus clients and the server.

use std::io::Write;

use serde::{Deserialize, Serialize};

use super::errors::BusError;

/// One frame on a bus connection. Each frame is a single JSON line.
///
/// ```json
/// {"kind":"call","serial":1,"path":"/mu/cache","method":"execute","payload":"(ping)"}
/// {"kind":"notification","payload":"(:info index :status running :processed 10)"}
/// {"kind":"reply","serial":1,"payload":"(:pong \"mu\" ...)"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BusMessage {
    /// Client to server: invoke `method` on the object at `path`.
    Call {
        /// Caller-chosen identifier echoed in the reply.
        serial: u64,
        /// Target object path.
        path: String,
        /// Method name.
        method: String,
        /// Method argument.
        payload: String,
    },
    /// Server to client: the single reply to call `serial`.
    Reply {
        /// Serial of the call being answered.
        serial: u64,
        /// Reply text.
        payload: String,
    },
    /// Server to client: the bus itself rejected call `serial`.
    Error {
        /// Serial of the rejected call, zero when it could not be read.
        serial: u64,
        /// Error name.
        name: String,
        /// Description.
        message: String,
    },
    /// Server to every client: an out-of-band message.
    Notification {
        /// Notification text.
        payload: String,
    },
}

impl BusMessage {
    /// Builds a bus-level error frame.
    pub fn error(serial: u64, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            serial,
            name: name.into(),
            message: message.into(),
        }
    }

    /// Decodes one frame.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Frame`] when the line is not a valid frame.
    pub fn parse(line: &str) -> Result<Self, BusError> {
        Ok(serde_json::from_str(line.trim_end())?)
    }

    /// Writes the frame followed by a newline and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error when encoding or writing fails.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<(), BusError> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        writer.write_all(&line)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_tagged_by_kind() {
        let mut output = Vec::new();
        BusMessage::Notification {
            payload: "(:info index)".to_owned(),
        }
        .write_to(&mut output)
        .expect("write frame");

        let line = String::from_utf8(output).expect("valid utf8");
        assert!(line.contains(r#""kind":"notification""#));
        assert!(line.ends_with('\n'));
    }

    #[test]
    fn parses_call_frames() {
        let frame = BusMessage::parse(
            r#"{"kind":"call","serial":7,"path":"/mu/cache","method":"execute","payload":"(ping)"}"#,
        )
        .expect("parse frame");
        assert_eq!(
            frame,
            BusMessage::Call {
                serial: 7,
                path: "/mu/cache".to_owned(),
                method: "execute".to_owned(),
                payload: "(ping)".to_owned(),
            }
        );
    }

    #[test]
    fn rejects_unknown_kinds() {
        assert!(BusMessage::parse(r#"{"kind":"bogus"}"#).is_err());
    }
}
