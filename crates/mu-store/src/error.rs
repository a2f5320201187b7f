//! Error values shared by every engine operation.

use std::fmt;

use thiserror::Error;

/// Stable numeric error codes reported to clients.
///
/// The numbers are part of the wire protocol: clients match on them, so new
/// codes are only ever appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    /// The caller may not perform the operation.
    AccessDenied = 100,
    /// The command itself is unknown or unusable.
    Command,
    /// A file could not be read or written.
    File,
    /// Indexing failed.
    Index,
    /// An unexpected internal failure.
    Internal,
    /// A command argument was missing or malformed.
    InvalidArgument,
    /// A message could not be parsed.
    Message,
    /// A query produced no matches.
    NoMatches,
    /// The requested item does not exist.
    NotFound,
    /// Request text could not be parsed.
    Parsing,
    /// A query expression was rejected.
    Query,
    /// The store was written by an incompatible version.
    SchemaMismatch,
    /// The store itself failed.
    Store,
}

impl ErrorCode {
    /// Returns the numeric value carried on the wire.
    #[must_use]
    pub const fn code(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.code())
    }
}

impl From<ErrorCode> for u32 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Failure raised by the store, the query engine or message parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StoreError {
    code: ErrorCode,
    message: String,
}

impl StoreError {
    /// Creates an error carrying `code` and a human-readable message.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Shorthand for an [`ErrorCode::Internal`] failure.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// Shorthand for an [`ErrorCode::NotFound`] failure.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Shorthand for an [`ErrorCode::Query`] failure.
    #[must_use]
    pub fn query(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Query, message)
    }

    /// Shorthand for an [`ErrorCode::File`] failure.
    #[must_use]
    pub fn file(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::File, message)
    }

    /// The error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// The human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}
