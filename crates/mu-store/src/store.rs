//! The shared message store.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use crate::error::{ErrorCode, StoreError};
use crate::message::{DocId, Message};

const INDEX_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::index");

/// Counters reported while and after indexing a maildir tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Message files visited.
    pub processed: usize,
    /// Messages added to the store for the first time.
    pub updated: usize,
    /// Entries dropped because their file disappeared.
    pub removed: usize,
}

#[derive(Debug)]
struct Index {
    root: Option<PathBuf>,
    next_docid: DocId,
    messages: BTreeMap<DocId, Message>,
    by_path: HashMap<PathBuf, DocId>,
}

impl Default for Index {
    fn default() -> Self {
        Self {
            root: None,
            next_docid: 1,
            messages: BTreeMap::new(),
            by_path: HashMap::new(),
        }
    }
}

impl Index {
    fn upsert(&mut self, message: Message) -> (DocId, bool) {
        if let Some(&docid) = self.by_path.get(message.path()) {
            self.messages.insert(docid, message);
            return (docid, false);
        }
        let docid = self.next_docid;
        self.next_docid += 1;
        self.by_path.insert(message.path().to_path_buf(), docid);
        self.messages.insert(docid, message);
        (docid, true)
    }

    fn remove(&mut self, docid: DocId) -> Option<Message> {
        let message = self.messages.remove(&docid)?;
        self.by_path.remove(message.path());
        Some(message)
    }
}

/// Cloneable handle to one message store.
///
/// Clones share the same underlying index, so a change made through one
/// handle is visible through every other.
#[derive(Debug, Clone, Default)]
pub struct Store {
    inner: Arc<RwLock<Index>>,
}

impl Store {
    /// Creates an empty store with no maildir root.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store rooted at the maildir `root`.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorCode::File`] error when `root` is not a directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root_dir = root.into();
        if !root_dir.is_dir() {
            return Err(StoreError::file(format!(
                "maildir {} is not a directory",
                root_dir.display()
            )));
        }
        let store = Self::new();
        store.write()?.root = Some(root_dir);
        Ok(store)
    }

    /// The maildir root, when one is configured.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorCode::Internal`] error if the store lock is poisoned.
    pub fn root(&self) -> Result<Option<PathBuf>, StoreError> {
        Ok(self.read()?.root.clone())
    }

    /// Number of messages in the store.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorCode::Internal`] error if the store lock is poisoned.
    pub fn count(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.messages.len())
    }

    /// Parses the file at `path` and adds it, replacing any entry for the
    /// same path while keeping its document id.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorCode::File`] error when the file cannot be read.
    pub fn add(&self, path: &Path) -> Result<DocId, StoreError> {
        let root = self.root()?;
        let message = Message::from_file(path, root.as_deref())?;
        self.add_message(message)
    }

    /// Adds an already-parsed message.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorCode::Internal`] error if the store lock is poisoned.
    pub fn add_message(&self, message: Message) -> Result<DocId, StoreError> {
        let (docid, _) = self.write()?.upsert(message);
        Ok(docid)
    }

    /// Removes the message with `docid`.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorCode::NotFound`] error when no such message exists.
    pub fn remove(&self, docid: DocId) -> Result<(), StoreError> {
        self.write()?
            .remove(docid)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(format!("no message with docid {docid}")))
    }

    /// Returns a copy of the message with `docid`.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorCode::NotFound`] error when no such message exists.
    pub fn get(&self, docid: DocId) -> Result<Message, StoreError> {
        self.read()?
            .messages
            .get(&docid)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("no message with docid {docid}")))
    }

    /// Indexes every message below `root`.
    ///
    /// Message files live in `cur/` and `new/` directories at any depth.
    /// `progress` is called after each such directory with the running
    /// totals. Entries under `root` whose file has gone are dropped at the
    /// end. Unparseable files are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorCode::Index`] error when `root` cannot be walked.
    pub fn index<F>(&self, root: &Path, mut progress: F) -> Result<IndexStats, StoreError>
    where
        F: FnMut(&IndexStats),
    {
        let mut leaves = Vec::new();
        collect_message_dirs(root, &mut leaves).map_err(|error| {
            StoreError::new(
                ErrorCode::Index,
                format!("cannot walk {}: {error}", root.display()),
            )
        })?;
        leaves.sort();

        let store_root = {
            let mut index = self.write()?;
            index.root.get_or_insert_with(|| root.to_path_buf()).clone()
        };

        let mut stats = IndexStats::default();
        let mut seen = HashSet::new();
        for leaf in leaves {
            for path in message_files(&leaf) {
                stats.processed += 1;
                match Message::from_file(&path, Some(&store_root)) {
                    Ok(message) => {
                        let (docid, inserted) = self.write()?.upsert(message);
                        if inserted {
                            stats.updated += 1;
                        }
                        debug!(target: INDEX_TARGET, docid, path = %path.display(), "indexed message");
                    }
                    Err(error) => {
                        warn!(target: INDEX_TARGET, path = %path.display(), %error, "skipping message");
                    }
                }
                seen.insert(path);
            }
            progress(&stats);
        }

        let mut index = self.write()?;
        let stale: Vec<DocId> = index
            .messages
            .iter()
            .filter(|(_, message)| {
                message.path().starts_with(root) && !seen.contains(message.path())
            })
            .map(|(docid, _)| *docid)
            .collect();
        for docid in stale {
            index.remove(docid);
            stats.removed += 1;
        }
        Ok(stats)
    }

    pub(crate) fn snapshot(&self) -> Result<Vec<(DocId, Message)>, StoreError> {
        Ok(self
            .read()?
            .messages
            .iter()
            .map(|(docid, message)| (*docid, message.clone()))
            .collect())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Index>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::internal("store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Index>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::internal("store lock poisoned"))
    }
}

fn collect_message_dirs(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for listed in fs::read_dir(dir)? {
        let entry = listed?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let path = entry.path();
        match entry.file_name().to_str() {
            Some("cur" | "new") => out.push(path),
            Some("tmp") => {}
            _ => collect_message_dirs(&path, out)?,
        }
    }
    Ok(())
}

fn message_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
        .map(|entry| entry.path())
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    use super::*;

    fn write_message(root: &Path, relative: &str, subject: &str) -> PathBuf {
        let path = root.join(relative);
        let parent = path.parent().expect("message path has a parent");
        fs::create_dir_all(parent).expect("create maildir");
        fs::write(&path, format!("Subject: {subject}\nFrom: a@example.org\n\nbody\n"))
            .expect("write message");
        path
    }

    #[fixture]
    fn maildir() -> TempDir {
        let root = TempDir::new().expect("tempdir");
        write_message(root.path(), "inbox/cur/1:2,S", "first");
        write_message(root.path(), "inbox/new/2", "second");
        write_message(root.path(), "archive/2023/cur/3", "third");
        fs::create_dir_all(root.path().join("inbox/tmp")).expect("create tmp");
        fs::write(root.path().join("inbox/tmp/partial"), "Subject: no\n").expect("write tmp");
        root
    }

    #[rstest]
    fn index_walks_cur_and_new(maildir: TempDir) {
        let store = Store::new();
        let mut calls = Vec::new();
        let stats = store
            .index(maildir.path(), |progress| calls.push(*progress))
            .expect("index maildir");

        assert_eq!(stats.processed, 3);
        assert_eq!(stats.updated, 3);
        assert_eq!(calls.len(), 3);
        assert_eq!(store.count().expect("count"), 3);
        assert_eq!(store.root().expect("root").as_deref(), Some(maildir.path()));
    }

    #[rstest]
    fn reindex_keeps_docids_and_drops_stale_entries(maildir: TempDir) {
        let store = Store::new();
        store.index(maildir.path(), |_| {}).expect("first index");
        fs::remove_file(maildir.path().join("inbox/new/2")).expect("remove message");

        let stats = store.index(maildir.path(), |_| {}).expect("second index");

        assert_eq!(stats.processed, 2);
        assert_eq!(stats.updated, 0);
        assert_eq!(stats.removed, 1);
        assert_eq!(store.count().expect("count"), 2);
    }

    #[rstest]
    fn clones_share_state(maildir: TempDir) {
        let store = Store::open(maildir.path()).expect("open store");
        let clone = store.clone();
        let docid = clone
            .add(&maildir.path().join("inbox/cur/1:2,S"))
            .expect("add message");

        assert_eq!(store.count().expect("count"), 1);
        assert_eq!(store.get(docid).expect("get").maildir(), "/inbox");
    }

    #[test]
    fn adding_the_same_path_twice_keeps_the_docid() {
        let store = Store::new();
        let first = store
            .add_message(Message::new("/m/cur/1", "/m"))
            .expect("add");
        let second = store
            .add_message(Message::new("/m/cur/1", "/m").with_subject("edited"))
            .expect("re-add");
        assert_eq!(first, second);
        assert_eq!(store.count().expect("count"), 1);
    }

    #[test]
    fn removing_unknown_docid_is_not_found() {
        let error = Store::new().remove(42).expect_err("unknown docid");
        assert_eq!(error.code(), ErrorCode::NotFound);
    }

    #[test]
    fn opening_a_missing_root_fails() {
        let error = Store::open("/nonexistent/maildir").expect_err("missing root");
        assert_eq!(error.code(), ErrorCode::File);
    }
}
