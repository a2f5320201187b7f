//! The command server over standard input and output.
//!
//! Requests arrive one per line. Every reply fragment and out-of-band
//! message is written as its own frame (see
//! [`write_frame`](crate::response::write_frame)) so a client can split the
//! output stream without parsing expressions.

use std::cell::RefCell;
use std::io::{self, BufRead, Write};

use tracing::{debug, info};

use crate::context::{PersistentContext, RequestContext};
use crate::dispatch::handle_request;
use crate::response::ResponseChannel;

const STDIO_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::stdio");

/// Serves requests read from `reader` until end of input or `quit`.
///
/// # Errors
///
/// Returns an error when reading a request fails.
pub fn serve_stdio<R, W>(context: &mut PersistentContext, reader: R, writer: W) -> io::Result<()>
where
    R: BufRead,
    W: Write,
{
    let writer = RefCell::new(writer);
    info!(target: STDIO_TARGET, "serving requests on stdio");
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let terminate = {
            let mut ctx = RequestContext::new(context, ResponseChannel::framed(&writer));
            let reported = handle_request(&mut ctx, &line);
            debug!(target: STDIO_TARGET, error = ?reported, "request answered");
            ctx.terminate_requested()
        };
        if terminate {
            context.request_terminate();
            break;
        }
    }
    info!(target: STDIO_TARGET, "stdio session finished");
    Ok(())
}
