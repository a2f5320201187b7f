//! Request dispatch for the command server.
//!
//! A request is one expression whose head names a command and whose tail
//! carries keyword arguments:
//!
//! ```text
//! (find :query "maildir:/inbox" :maxnum 10)
//! ```
//!
//! [`handle_request`] is the single boundary every request passes through.
//! It parses the text, looks the command up in the request's
//! [`CommandTable`], runs the handler, turns any failure into one
//! `(:error <code> :message "...")` fragment appended after whatever the
//! handler already produced, and sends the reply exactly once.

mod arguments;
mod commands;
mod errors;
mod table;

use mu_sexp::Sexp;
use mu_store::ErrorCode;
use tracing::{debug, warn};

use crate::context::RequestContext;

pub use self::arguments::Arguments;
pub use self::errors::CommandError;
pub use self::table::{CommandInfo, CommandTable, Handler};

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Runs the command named by the head of `request`.
///
/// # Errors
///
/// Returns `MalformedRequest` when the head is not a symbol,
/// `UnknownCommand` when no handler is registered for it, and whatever the
/// handler itself returns.
pub fn invoke(ctx: &mut RequestContext<'_>, request: &Sexp) -> Result<(), CommandError> {
    let name = request
        .head()
        .and_then(Sexp::as_symbol)
        .ok_or_else(|| CommandError::malformed(format!("expected (command ...), found {request}")))?;
    let info = ctx
        .commands()
        .get(name)
        .copied()
        .ok_or_else(|| CommandError::unknown_command(name))?;
    let arguments = Arguments::parse(request.tail())?;
    debug!(target: DISPATCH_TARGET, command = info.name, "invoking command");
    (info.handler)(ctx, &arguments)
}

/// Parses and runs `text`, then sends the reply.
///
/// Returns the error code reported to the client, if any.
pub fn handle_request(ctx: &mut RequestContext<'_>, text: &str) -> Option<ErrorCode> {
    let outcome = mu_sexp::parse(text)
        .map_err(CommandError::from_parse_error)
        .and_then(|request| invoke(ctx, &request));

    let reported = match outcome {
        Ok(()) => None,
        Err(error) => {
            let message = match &error {
                CommandError::Domain(source) => source.message().to_owned(),
                other => other.to_string(),
            };
            warn!(target: DISPATCH_TARGET, code = %error.code(), %message, "request failed");
            Some(ctx.channel_mut().report_error(error.code(), &message))
        }
    };

    if let Err(error) = ctx.channel_mut().send_response() {
        warn!(target: DISPATCH_TARGET, %error, "reply was already sent by the handler");
    }
    reported
}
