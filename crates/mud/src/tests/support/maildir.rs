//! Temporary maildir trees.

use std::fs;
use std::path::{Path, PathBuf};

use camino::Utf8PathBuf;
use tempfile::TempDir;

/// A maildir in a temporary directory, removed on drop.
pub struct MaildirFixture {
    root: TempDir,
}

impl MaildirFixture {
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: TempDir::new().expect("failed to create temporary maildir"),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    #[must_use]
    pub fn utf8_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.root.path().to_path_buf())
            .expect("temporary maildir path was not valid UTF-8")
    }

    /// Writes a message at `relative` below the root and returns its path.
    pub fn write_message(&self, relative: &str, subject: &str) -> PathBuf {
        let path = self.root.path().join(relative);
        let parent = path.parent().expect("message path has a parent");
        fs::create_dir_all(parent).expect("failed to create maildir folder");
        fs::write(
            &path,
            format!(
                "From: Ann <ann@example.org>\nTo: bob@example.org\nSubject: {subject}\n\
                 Date: Mon, 1 Jan 2024 10:00:00 +0000\n\nbody\n"
            ),
        )
        .expect("failed to write message");
        path
    }
}
