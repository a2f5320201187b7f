//! Service lifecycle on the message bus.
//!
//! [`Service::run`] claims the well-known name, publishes the service
//! object, forwards terminating signals into the loop and then handles
//! events one at a time, in arrival order, until a `quit` request or a
//! signal asks it to stop. The reply to `quit` is always sent before the
//! loop exits. On the way out the name is released.

use std::io;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bus::{
    Bus, BusError, BusName, BusNameError, CallHandle, EventSender, LoopEvent, NameHandle,
    ObjectPath,
};
use crate::context::{PersistentContext, RequestContext};
use crate::dispatch::handle_request;
use crate::health::HealthReporter;
use crate::response::ResponseChannel;

const SERVICE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::service");

/// Signals that stop the service.
pub const TERMINATING_SIGNALS: [i32; 3] = [SIGINT, SIGHUP, SIGTERM];

/// Where the service is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Nothing has been claimed yet.
    Unregistered,
    /// The well-known name is owned.
    NameAcquired,
    /// The service object is reachable.
    ObjectPublished,
    /// Events are being processed.
    Running,
    /// A stop was requested; no further events are handled.
    Terminating,
    /// The name was released.
    Stopped,
}

/// Failures that prevent the service from starting.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The configured suffix does not form a valid bus name.
    #[error(transparent)]
    InvalidName(#[from] BusNameError),
    /// The bus refused the name.
    #[error("failed to own bus name {name}: {source}")]
    OwnName {
        /// Requested name.
        name: String,
        /// Bus failure.
        #[source]
        source: BusError,
    },
    /// The service object could not be published.
    #[error("failed to publish {path}: {source}")]
    Publish {
        /// Object path.
        path: String,
        /// Bus failure.
        #[source]
        source: BusError,
    },
    /// Signal handlers could not be installed.
    #[error("failed to install signal handlers: {source}")]
    Signals {
        /// OS error.
        #[source]
        source: io::Error,
    },
}

/// The bus-facing command server.
pub struct Service<B: Bus> {
    bus: B,
    context: PersistentContext,
    reporter: Arc<dyn HealthReporter>,
    state: ServiceState,
    events: Receiver<LoopEvent>,
    sender: EventSender,
}

impl<B: Bus> Service<B> {
    /// Creates an unregistered service.
    pub fn new(bus: B, context: PersistentContext, reporter: Arc<dyn HealthReporter>) -> Self {
        let (sender, events) = mpsc::channel();
        Self {
            bus,
            context,
            reporter,
            state: ServiceState::Unregistered,
            events,
            sender,
        }
    }

    /// A sender feeding this service's event loop.
    #[must_use]
    pub fn event_sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ServiceState {
        self.state
    }

    /// The process-wide context.
    #[must_use]
    pub fn context(&self) -> &PersistentContext {
        &self.context
    }

    /// The bus the service talks to.
    #[must_use]
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Claims the name for `suffix` and publishes the service object.
    ///
    /// The suffix is validated before the bus is contacted. If publishing
    /// fails the name is released again.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidName`], [`ServiceError::OwnName`] or
    /// [`ServiceError::Publish`].
    pub fn start(&mut self, suffix: Option<&str>) -> Result<NameHandle, ServiceError> {
        let name = BusName::with_suffix(suffix)?;
        let handle = self
            .bus
            .own_name(&name)
            .map_err(|source| ServiceError::OwnName {
                name: name.to_string(),
                source,
            })?;
        self.state = ServiceState::NameAcquired;
        self.reporter.name_acquired(&name);

        let path = ObjectPath::service();
        if let Err(source) = self.bus.publish_object(&path, self.sender.clone()) {
            self.shutdown(handle);
            return Err(ServiceError::Publish {
                path: path.to_string(),
                source,
            });
        }
        self.state = ServiceState::ObjectPublished;
        self.reporter.object_published(&path);
        Ok(handle)
    }

    /// Handles queued events without blocking.
    ///
    /// Returns `true` once a stop was requested; remaining events stay
    /// queued and are never handled.
    pub fn process_pending(&mut self) -> bool {
        self.enter_running();
        while let Ok(event) = self.events.try_recv() {
            if self.handle_event(event).is_break() {
                return true;
            }
        }
        false
    }

    /// Handles events until a stop is requested.
    pub fn run_loop(&mut self) {
        self.enter_running();
        info!(target: SERVICE_TARGET, "service loop running");
        while let Ok(event) = self.events.recv() {
            if self.handle_event(event).is_break() {
                break;
            }
        }
    }

    /// Releases the name and marks the service stopped.
    pub fn shutdown(&mut self, handle: NameHandle) {
        self.bus.release_name(handle);
        self.state = ServiceState::Stopped;
        self.reporter.stopped();
    }

    /// Starts, serves until stopped, then shuts down.
    ///
    /// # Errors
    ///
    /// Returns the startup failure; the loop is not entered in that case.
    pub fn run(&mut self, suffix: Option<&str>) -> Result<(), ServiceError> {
        let handle = self.start(suffix)?;
        let signals = match SignalForwarder::install(self.event_sender()) {
            Ok(signals) => signals,
            Err(source) => {
                self.shutdown(handle);
                return Err(ServiceError::Signals { source });
            }
        };
        self.run_loop();
        signals.close();
        self.shutdown(handle);
        Ok(())
    }

    fn enter_running(&mut self) {
        if self.state == ServiceState::ObjectPublished {
            self.state = ServiceState::Running;
        }
    }

    fn handle_event(&mut self, event: LoopEvent) -> ControlFlow<()> {
        match event {
            LoopEvent::MethodCall { call, payload } => {
                if self.answer(call, &payload) {
                    self.request_stop("quit");
                    return ControlFlow::Break(());
                }
                ControlFlow::Continue(())
            }
            LoopEvent::Signal(signal) => {
                info!(target: SERVICE_TARGET, signal, "terminating signal received");
                self.request_stop(&format!("signal {signal}"));
                ControlFlow::Break(())
            }
        }
    }

    /// Answers one call. Returns whether the request asked to terminate.
    fn answer(&self, call: CallHandle, payload: &str) -> bool {
        debug!(target: SERVICE_TARGET, %call, "handling method call");
        let channel = ResponseChannel::for_call(&self.bus, call);
        let mut ctx = RequestContext::new(&self.context, channel);
        let reported = handle_request(&mut ctx, payload);
        let terminate = ctx.terminate_requested();
        drop(ctx);
        self.reporter.request_completed(reported);
        terminate
    }

    fn request_stop(&mut self, reason: &str) {
        self.context.request_terminate();
        self.state = ServiceState::Terminating;
        self.reporter.shutdown_requested(reason);
    }
}

/// Forwards terminating signals into the loop as [`LoopEvent::Signal`].
struct SignalForwarder {
    handle: Handle,
    thread: Option<thread::JoinHandle<()>>,
}

impl SignalForwarder {
    fn install(events: EventSender) -> io::Result<Self> {
        let mut signals = Signals::new(TERMINATING_SIGNALS)?;
        let handle = signals.handle();
        let thread = thread::spawn(move || {
            for signal in signals.forever() {
                if events.send(LoopEvent::Signal(signal)).is_err() {
                    break;
                }
            }
        });
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    fn close(mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!(target: SERVICE_TARGET, "signal forwarding thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use mockall::mock;
    use mockall::predicate::always;
    use mu_store::{ErrorCode, Store};

    use super::*;
    use crate::StructuredHealthReporter;

    mock! {
        Bus {}
        impl Bus for Bus {
            fn own_name(&self, name: &BusName) -> Result<NameHandle, BusError>;
            fn release_name(&self, handle: NameHandle);
            fn publish_object(&self, path: &ObjectPath, events: EventSender) -> Result<(), BusError>;
            fn complete_call(&self, call: CallHandle, reply: String);
            fn emit_notification(&self, payload: String);
        }
    }

    fn service(bus: MockBus) -> Service<MockBus> {
        Service::new(
            bus,
            PersistentContext::new(Store::new()),
            Arc::new(StructuredHealthReporter::new()),
        )
    }

    #[test]
    fn invalid_suffix_never_reaches_the_bus() {
        let mut bus = MockBus::new();
        bus.expect_own_name().never();
        bus.expect_publish_object().never();
        let mut service = service(bus);

        let error = service.run(Some("not-valid")).expect_err("invalid suffix");

        let ServiceError::InvalidName(name_error) = error else {
            panic!("unexpected error {error:?}");
        };
        assert_eq!(name_error.code(), ErrorCode::InvalidArgument);
        assert_eq!(service.state(), ServiceState::Unregistered);
    }

    #[test]
    fn taken_names_stop_startup() {
        let mut bus = MockBus::new();
        bus.expect_own_name().times(1).returning(|name| {
            Err(BusError::NameTaken {
                name: name.to_string(),
            })
        });
        bus.expect_publish_object().never();
        let mut service = service(bus);

        let error = service.start(None).expect_err("name taken");
        assert!(matches!(error, ServiceError::OwnName { .. }), "{error:?}");
        assert_eq!(service.state(), ServiceState::Unregistered);
    }

    #[test]
    fn failed_publication_releases_the_name() {
        let mut bus = MockBus::new();
        bus.expect_own_name()
            .times(1)
            .returning(|_| Ok(NameHandle::new(1)));
        bus.expect_publish_object()
            .with(always(), always())
            .times(1)
            .returning(|path, _| {
                Err(BusError::ObjectExists {
                    path: path.to_string(),
                })
            });
        bus.expect_release_name().times(1).return_const(());
        let mut service = service(bus);

        let error = service.start(Some("work")).expect_err("publish fails");
        assert!(matches!(error, ServiceError::Publish { .. }), "{error:?}");
        assert_eq!(service.state(), ServiceState::Stopped);
    }

    #[test]
    fn signals_stop_the_loop_before_later_calls() {
        let mut bus = MockBus::new();
        bus.expect_complete_call().never();
        let mut service = service(bus);
        let sender = service.event_sender();
        sender.send(LoopEvent::Signal(SIGTERM)).expect("queue signal");
        sender
            .send(LoopEvent::MethodCall {
                call: CallHandle::new(1, 1),
                payload: "(ping)".to_owned(),
            })
            .expect("queue call");

        assert!(service.process_pending());
        assert_eq!(service.state(), ServiceState::Terminating);
        assert!(service.context().terminate_requested());
    }
}
