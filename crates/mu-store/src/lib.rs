//! Message store and query engine backing the mu server.
//!
//! The store keeps a headers-only record for each message in a maildir tree
//! and hands out cheap, cloneable handles so that long-lived server state and
//! short-lived request contexts can refer to the same index. Queries return a
//! [`MsgIter`], a forward-only cursor implementing [`MessageIterator`].

mod error;
mod iter;
mod message;
mod query;
mod store;

pub use error::{ErrorCode, StoreError};
pub use iter::{MessageIterator, MsgIter, ThreadInfo};
pub use message::{DocId, Field, Flag, Message};
pub use query::{Query, QueryOptions, SortField};
pub use store::{IndexStats, Store};
