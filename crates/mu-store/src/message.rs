//! Headers-only message records parsed from maildir files.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use mu_sexp::Sexp;
use strum::{Display, EnumString};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc2822;

use crate::error::StoreError;
use crate::iter::ThreadInfo;

/// Document identifier assigned by the store.
pub type DocId = u32;

/// Maildir flags carried in the file name (`:2,FS`) or implied by `new/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Flag {
    /// `D`: the message is a draft.
    Draft,
    /// `F`: the message is flagged.
    Flagged,
    /// `P`: the message was forwarded.
    Passed,
    /// `R`: the message was replied to.
    Replied,
    /// `S`: the message was seen.
    Seen,
    /// `T`: the message is marked for deletion.
    Trashed,
    /// The message still sits in `new/`.
    New,
}

impl Flag {
    const fn from_maildir_letter(letter: char) -> Option<Self> {
        match letter {
            'D' => Some(Self::Draft),
            'F' => Some(Self::Flagged),
            'P' => Some(Self::Passed),
            'R' => Some(Self::Replied),
            'S' => Some(Self::Seen),
            'T' => Some(Self::Trashed),
            _ => None,
        }
    }
}

/// A searchable header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Field {
    /// The `From:` header.
    From,
    /// The `To:` header.
    To,
    /// The `Cc:` header.
    Cc,
    /// The `Subject:` header.
    Subject,
    /// The maildir folder, relative to the store root.
    Maildir,
    /// The `Message-Id:` header without angle brackets.
    #[strum(serialize = "msgid")]
    MessageId,
}

/// The header portion of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    path: PathBuf,
    maildir: String,
    subject: Option<String>,
    from: Option<String>,
    to: Option<String>,
    cc: Option<String>,
    date: Option<i64>,
    message_id: Option<String>,
    flags: Vec<Flag>,
}

impl Message {
    /// Creates an empty record for the file at `path` in folder `maildir`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, maildir: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            maildir: maildir.into(),
            subject: None,
            from: None,
            to: None,
            cc: None,
            date: None,
            message_id: None,
            flags: Vec::new(),
        }
    }

    /// Sets the subject.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Sets the sender.
    #[must_use]
    pub fn with_sender(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Sets the recipients.
    #[must_use]
    pub fn with_to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    /// Sets the date as seconds since the Unix epoch.
    #[must_use]
    pub const fn with_date(mut self, date: i64) -> Self {
        self.date = Some(date);
        self
    }

    /// Parses the header block of the file at `path`.
    ///
    /// `root` is the store's maildir root and is used to derive the folder
    /// name; without it the folder is named after its own directory.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorCode::File`](crate::ErrorCode::File) error when the
    /// file cannot be read.
    pub fn from_file(path: &Path, root: Option<&Path>) -> Result<Self, StoreError> {
        let bytes = fs::read(path)
            .map_err(|error| StoreError::file(format!("cannot read {}: {error}", path.display())))?;
        let text = String::from_utf8_lossy(&bytes);

        let mut message = Self::new(path, maildir_of(path, root));
        for (name, value) in parse_headers(&text) {
            match name.as_str() {
                "subject" => message.subject = Some(value),
                "from" => message.from = Some(value),
                "to" => message.to = Some(value),
                "cc" => message.cc = Some(value),
                "date" => {
                    message.date = OffsetDateTime::parse(&value, &Rfc2822)
                        .ok()
                        .map(OffsetDateTime::unix_timestamp);
                }
                "message-id" => {
                    message.message_id =
                        Some(value.trim_start_matches('<').trim_end_matches('>').to_owned());
                }
                _ => {}
            }
        }
        message.flags = flags_of(path);
        Ok(message)
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Folder name relative to the store root, such as `/inbox`.
    #[must_use]
    pub fn maildir(&self) -> &str {
        &self.maildir
    }

    /// The subject, when present.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// The sender, when present.
    #[must_use]
    pub fn sender(&self) -> Option<&str> {
        self.from.as_deref()
    }

    /// The date in seconds since the Unix epoch, when present and parseable.
    #[must_use]
    pub const fn date(&self) -> Option<i64> {
        self.date
    }

    /// Maildir flags.
    #[must_use]
    pub fn flags(&self) -> &[Flag] {
        &self.flags
    }

    /// Returns the value of a searchable field.
    #[must_use]
    pub fn field(&self, field: Field) -> Option<&str> {
        match field {
            Field::From => self.from.as_deref(),
            Field::To => self.to.as_deref(),
            Field::Cc => self.cc.as_deref(),
            Field::Subject => self.subject.as_deref(),
            Field::Maildir => Some(&self.maildir),
            Field::MessageId => self.message_id.as_deref(),
        }
    }

    /// True while the backing file can still be opened.
    #[must_use]
    pub fn is_readable(&self) -> bool {
        File::open(&self.path).is_ok()
    }

    /// Renders the headers-only form sent to clients.
    #[must_use]
    pub fn to_sexp(&self, docid: DocId, thread: &ThreadInfo) -> Sexp {
        let mut pairs = vec![
            ("docid", Sexp::from(docid)),
            ("path", Sexp::string(self.path.display().to_string())),
            ("maildir", Sexp::string(self.maildir.as_str())),
        ];
        let headers = [
            ("subject", &self.subject),
            ("from", &self.from),
            ("to", &self.to),
            ("cc", &self.cc),
            ("message-id", &self.message_id),
        ];
        for (key, header) in headers {
            if let Some(text) = header {
                pairs.push((key, Sexp::string(text.as_str())));
            }
        }
        if let Some(date) = self.date {
            pairs.push(("date", Sexp::number(date)));
        }
        if !self.flags.is_empty() {
            pairs.push((
                "flags",
                Sexp::list(self.flags.iter().map(|flag| Sexp::symbol(flag.to_string()))),
            ));
        }
        pairs.push(("meta", thread.to_sexp()));
        Sexp::plist(pairs)
    }
}

/// Splits the header block into lower-cased names and unfolded values.
fn parse_headers(text: &str) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            break;
        }
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_owned()));
        }
    }
    headers
}

/// Derives the folder name: the directory holding `cur/` or `new/`.
fn maildir_of(path: &Path, root: Option<&Path>) -> String {
    let Some(folder) = path.parent().and_then(Path::parent) else {
        return String::from("/");
    };
    let relative = match root {
        Some(base) => folder.strip_prefix(base).ok().map(Path::to_path_buf),
        None => folder.file_name().map(PathBuf::from),
    };
    let components: Vec<String> = relative
        .iter()
        .flat_map(|suffix| suffix.components())
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("/{}", components.join("/"))
}

fn flags_of(path: &Path) -> Vec<Flag> {
    let mut flags: Vec<Flag> = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .and_then(|name| name.rsplit_once(":2,").map(|(_, letters)| letters.to_owned()))
        .map(|letters| letters.chars().filter_map(Flag::from_maildir_letter).collect())
        .unwrap_or_default();
    let in_new = path
        .parent()
        .and_then(Path::file_name)
        .is_some_and(|dir| dir == "new");
    if in_new {
        flags.push(Flag::New);
    }
    flags.sort_unstable();
    flags.dedup();
    flags
}
