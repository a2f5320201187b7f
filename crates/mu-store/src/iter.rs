//! Lazy cursors over query results.

use mu_sexp::Sexp;

use crate::message::{DocId, Message};

/// Position of a match inside its conversation thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    /// Sortable thread path such as `0a:1`.
    pub path: String,
    /// Nesting depth, zero for thread roots.
    pub level: usize,
}

impl ThreadInfo {
    /// Creates thread information.
    #[must_use]
    pub fn new(path: impl Into<String>, level: usize) -> Self {
        Self {
            path: path.into(),
            level,
        }
    }

    /// Renders `(:path "<path>" :level <n>)`.
    #[must_use]
    pub fn to_sexp(&self) -> Sexp {
        let level = i64::try_from(self.level).unwrap_or(i64::MAX);
        Sexp::plist([
            ("path", Sexp::string(self.path.as_str())),
            ("level", Sexp::number(level)),
        ])
    }
}

/// A forward-only cursor over matched messages.
///
/// Consumers stop once [`is_done`](Self::is_done) reports true and must call
/// [`advance`](Self::advance) after every item, including unreadable ones.
pub trait MessageIterator {
    /// True when no current item remains.
    fn is_done(&self) -> bool;

    /// True when the current item's backing file can be read.
    fn current_is_readable(&self) -> bool;

    /// Renders the current item in headers-only form, or `None` when done.
    fn serialize_headers_only(&self) -> Option<Sexp>;

    /// Moves to the next item.
    fn advance(&mut self);
}

/// Result cursor produced by [`Query::run`](crate::Query::run).
#[derive(Debug, Clone, Default)]
pub struct MsgIter {
    matches: Vec<(DocId, Message)>,
    position: usize,
}

impl MsgIter {
    pub(crate) const fn new(matches: Vec<(DocId, Message)>) -> Self {
        Self {
            matches,
            position: 0,
        }
    }

    /// Number of matches, readable or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// True when the query matched nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Document id of the current item.
    #[must_use]
    pub fn current_docid(&self) -> Option<DocId> {
        self.current().map(|(docid, _)| *docid)
    }

    /// Thread placement of the current item. Results are flat, so every
    /// match is a root keyed by its position.
    #[must_use]
    pub fn current_thread_info(&self) -> Option<ThreadInfo> {
        self.current()
            .map(|_| ThreadInfo::new(format!("{:x}", self.position), 0))
    }

    fn current(&self) -> Option<&(DocId, Message)> {
        self.matches.get(self.position)
    }
}

impl MessageIterator for MsgIter {
    fn is_done(&self) -> bool {
        self.position >= self.matches.len()
    }

    fn current_is_readable(&self) -> bool {
        self.current().is_some_and(|(_, message)| message.is_readable())
    }

    fn serialize_headers_only(&self) -> Option<Sexp> {
        let (docid, message) = self.current()?;
        let thread = self.current_thread_info()?;
        Some(message.to_sexp(*docid, &thread))
    }

    fn advance(&mut self) {
        if !self.is_done() {
            self.position += 1;
        }
    }
}
