//! Query expressions evaluated against a [`Store`].

use std::str::FromStr;

use strum::{Display, EnumString};

use crate::error::StoreError;
use crate::iter::MsgIter;
use crate::message::{DocId, Field, Message};
use crate::store::Store;

/// Field used to order results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SortField {
    /// Message date, oldest first.
    #[default]
    Date,
    /// Subject, case-insensitively.
    Subject,
    /// Sender, case-insensitively.
    From,
}

/// Options applied when running a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Ordering of the results.
    pub sort: SortField,
    /// Reverse the ordering.
    pub reverse: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Term {
    Field(Field, String),
    Any(String),
}

impl Term {
    fn matches(&self, message: &Message) -> bool {
        match self {
            Self::Field(Field::Maildir, folder) => message.maildir() == folder.as_str(),
            Self::Field(field, needle) => contains(message.field(*field), needle),
            Self::Any(needle) => [Field::Subject, Field::From, Field::To]
                .into_iter()
                .any(|field| contains(message.field(field), needle)),
        }
    }
}

fn contains(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|value| value.to_lowercase().contains(needle))
}

/// Splits a query expression into conjunctive terms.
///
/// An empty expression, `*` or `""` yields no terms and therefore matches
/// every message.
fn parse_terms(expr: &str) -> Result<Vec<Term>, StoreError> {
    let trimmed = expr.trim();
    if matches!(trimmed, "" | "*" | "\"\"") {
        return Ok(Vec::new());
    }
    trimmed.split_whitespace().map(parse_term).collect()
}

/// A `field:value` term when the prefix names a field, otherwise a bare word
/// searched in the usual headers.
fn parse_term(word: &str) -> Result<Term, StoreError> {
    let Some((name, value)) = word.split_once(':') else {
        return Ok(Term::Any(word.to_lowercase()));
    };
    let Ok(field) = Field::from_str(&name.to_ascii_lowercase()) else {
        return Ok(Term::Any(word.to_lowercase()));
    };
    if value.is_empty() {
        return Err(StoreError::query(format!("empty value for '{name}'")));
    }
    let normalised = if field == Field::Maildir {
        value.to_owned()
    } else {
        value.to_lowercase()
    };
    Ok(Term::Field(field, normalised))
}

/// Query engine bound to one store.
#[derive(Debug, Clone)]
pub struct Query {
    store: Store,
}

impl Query {
    /// Binds a query engine to `store`. The engine sees later changes made
    /// through any clone of the store.
    #[must_use]
    pub fn new(store: &Store) -> Self {
        Self {
            store: store.clone(),
        }
    }

    /// Runs `expr` and returns a cursor over the matches.
    ///
    /// Terms are whitespace separated and all must match. `field:value`
    /// searches one of `from`, `to`, `cc`, `subject`, `msgid` by
    /// case-insensitive substring, or `maildir` exactly; a bare word is
    /// searched in subject, sender and recipients. A word whose prefix is not
    /// a field name, such as `re:hello`, counts as a bare word.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorCode::Query`](crate::ErrorCode::Query) error for an
    /// empty field value.
    pub fn run(&self, expr: &str, options: &QueryOptions) -> Result<MsgIter, StoreError> {
        let terms = parse_terms(expr)?;
        let mut matches: Vec<(DocId, Message)> = self
            .store
            .snapshot()?
            .into_iter()
            .filter(|(_, message)| terms.iter().all(|term| term.matches(message)))
            .collect();

        match options.sort {
            SortField::Date => matches.sort_by_key(|(_, message)| message.date()),
            SortField::Subject => {
                matches.sort_by_key(|(_, message)| message.subject().map(str::to_lowercase));
            }
            SortField::From => {
                matches.sort_by_key(|(_, message)| message.sender().map(str::to_lowercase));
            }
        }
        if options.reverse {
            matches.reverse();
        }
        Ok(MsgIter::new(matches))
    }
}
