//! Error types for request dispatch failures.
//!
//! Every variant maps to exactly one [`ErrorCode`], which together with the
//! display text becomes the `(:error <code> :message "...")` fragment sent to
//! the client.

use mu_sexp::ParseError;
use mu_store::{ErrorCode, StoreError};
use thiserror::Error;

/// Errors surfaced while decoding or executing a request.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The request text is not a well-formed command expression.
    #[error("malformed request: {message}")]
    MalformedRequest {
        message: String,
        #[source]
        source: Option<ParseError>,
    },

    /// The command name is not in the command table.
    #[error("unknown command '{name}'")]
    UnknownCommand { name: String },

    /// A command argument is missing or has the wrong type.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The engine rejected the operation.
    #[error("{0}")]
    Domain(#[from] StoreError),
}

impl CommandError {
    /// Error code reported to the client.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MalformedRequest { .. } => ErrorCode::Parsing,
            Self::UnknownCommand { .. } => ErrorCode::Command,
            Self::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            Self::Domain(error) => error.code(),
        }
    }

    /// Creates a malformed-request error from a parser failure.
    pub fn from_parse_error(source: ParseError) -> Self {
        Self::MalformedRequest {
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Creates a malformed-request error with a custom message.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRequest {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an unknown-command error.
    pub fn unknown_command(name: impl Into<String>) -> Self {
        Self::UnknownCommand { name: name.into() }
    }

    /// Creates an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}
