//! Symbolic-expression codec for the mu command protocol.
//!
//! Requests and replies exchanged with the mu server are small parenthesised
//! expressions such as `(find :query "maildir:/inbox" :maxnum 10)`. This crate
//! provides the value type used on both sides of that exchange together with
//! the text codec:
//!
//! - [`parse`] turns one line of request text into a [`Sexp`]
//! - [`escape`] renders a string as a quoted literal that [`parse_string_literal`]
//!   reads back unchanged
//! - [`compose_error`] builds the error fragment returned when a request fails
//!
//! Rendering is provided by the [`std::fmt::Display`] implementation on
//! [`Sexp`], which always produces text that [`parse`] accepts.

mod escape;
mod parser;
mod value;

pub use escape::{escape, parse_string_literal};
pub use parser::{MAX_DEPTH, ParseError, parse};
pub use value::Sexp;

/// Builds the error fragment `(:error <code> :message "<message>")`.
///
/// Both fields are carried verbatim; the message is escaped when the value is
/// rendered.
#[must_use]
pub fn compose_error(code: u32, message: &str) -> Sexp {
    Sexp::list([
        Sexp::keyword("error"),
        Sexp::number(i64::from(code)),
        Sexp::keyword("message"),
        Sexp::string(message),
    ])
}
