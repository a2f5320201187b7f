//! Process-wide and per-request execution state.
//!
//! A [`PersistentContext`] lives for the whole process and owns the store
//! and query handles. Every request gets a short-lived [`RequestContext`]
//! that borrows those handles, carries its own command table and terminate
//! flag, and owns the [`ResponseChannel`] for the call being answered.

use mu_store::{Query, Store};

use crate::dispatch::CommandTable;
use crate::response::ResponseChannel;

/// State shared by every request handled by this process.
#[derive(Debug)]
pub struct PersistentContext {
    store: Store,
    query: Query,
    commands: CommandTable,
    terminate: bool,
}

impl PersistentContext {
    /// Builds the context over an opened store.
    #[must_use]
    pub fn new(store: Store) -> Self {
        let query = Query::new(&store);
        Self {
            store,
            query,
            commands: CommandTable::builtin(),
            terminate: false,
        }
    }

    /// The message store.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The query engine bound to [`store`](Self::store).
    #[must_use]
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// The command table every request starts from.
    #[must_use]
    pub fn commands(&self) -> &CommandTable {
        &self.commands
    }

    /// Records that the process should stop after the current event.
    pub fn request_terminate(&mut self) {
        self.terminate = true;
    }

    /// True once a termination was requested.
    #[must_use]
    pub fn terminate_requested(&self) -> bool {
        self.terminate
    }
}

/// State for answering exactly one call.
///
/// The store and query are borrowed from the [`PersistentContext`]; dropping
/// a request context never affects them.
pub struct RequestContext<'p> {
    store: &'p Store,
    query: &'p Query,
    commands: CommandTable,
    terminate: bool,
    channel: ResponseChannel<'p>,
}

impl<'p> RequestContext<'p> {
    /// Creates the context for one call answered through `channel`.
    #[must_use]
    pub fn new(persistent: &'p PersistentContext, channel: ResponseChannel<'p>) -> Self {
        Self {
            store: &persistent.store,
            query: &persistent.query,
            commands: persistent.commands.clone(),
            terminate: false,
            channel,
        }
    }

    /// The shared message store.
    #[must_use]
    pub fn store(&self) -> &'p Store {
        self.store
    }

    /// The shared query engine.
    #[must_use]
    pub fn query(&self) -> &'p Query {
        self.query
    }

    /// Commands available to this request.
    #[must_use]
    pub fn commands(&self) -> &CommandTable {
        &self.commands
    }

    /// The channel answering this call.
    pub fn channel_mut(&mut self) -> &mut ResponseChannel<'p> {
        &mut self.channel
    }

    /// Asks the service to stop once this request has been answered.
    pub fn request_terminate(&mut self) {
        self.terminate = true;
    }

    /// True when a handler asked the service to stop.
    #[must_use]
    pub fn terminate_requested(&self) -> bool {
        self.terminate
    }
}

impl std::fmt::Debug for RequestContext<'_> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RequestContext")
            .field("commands", &self.commands)
            .field("terminate", &self.terminate)
            .finish_non_exhaustive()
    }
}
