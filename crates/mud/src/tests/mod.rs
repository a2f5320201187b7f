//! Test suites for the command server.

mod behaviour;
mod dispatch_behaviour;
mod support;
