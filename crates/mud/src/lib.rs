//! The mu command server.
//!
//! The server exposes a mail store over a local message bus. It owns the
//! well-known name `nl.djcbsoftware.Mu.Maildir` (optionally with a suffix so
//! several stores can be served side by side) and publishes one object,
//! `/mu/cache`, whose `execute` method takes a request expression:
//!
//! ```text
//! (find :query "maildir:/inbox" :maxnum 10)
//! ```
//!
//! Each call is answered exactly once. The reply is the newline-joined list
//! of fragments the command produced; failures add a final
//! `(:error <code> :message "...")` fragment. Long-running commands such as
//! `index` also broadcast out-of-band progress notifications while they run.
//!
//! Everything runs on one thread: the bus forwards calls and the signal
//! thread forwards `SIGINT`, `SIGHUP` and `SIGTERM` into a single event
//! queue, and the [`Service`] handles those events strictly in order. The
//! same commands can also be served over stdin/stdout (see [`serve_stdio`]).

mod bootstrap;
pub mod bus;
mod context;
pub mod dispatch;
mod health;
mod process;
mod response;
mod service;
mod stdio;
mod telemetry;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Server, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use context::{PersistentContext, RequestContext};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{LaunchError, run_server, run_server_with};
pub use response::{ChannelError, FRAME_END, FRAME_START, ResponseChannel, write_frame};
pub use service::{Service, ServiceError, ServiceState, TERMINATING_SIGNALS};
pub use stdio::serve_stdio;
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
