//! Keyword arguments of a command expression.
//!
//! Commands take their arguments as keyword/value pairs following the
//! command name:
//!
//! ```text
//! (find :query "maildir:/inbox" :maxnum 25 :reverse t)
//! ```

use mu_sexp::Sexp;

use super::errors::CommandError;

/// Keyword/value view over the tail of a command expression.
#[derive(Debug, Clone, Default)]
pub struct Arguments<'s> {
    pairs: Vec<(&'s str, &'s Sexp)>,
}

impl<'s> Arguments<'s> {
    /// Reads `items` as alternating keywords and values.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when an item in key position is not a
    /// keyword or the last keyword has no value.
    pub fn parse(items: &'s [Sexp]) -> Result<Self, CommandError> {
        let mut pairs = Vec::with_capacity(items.len() / 2);
        for chunk in items.chunks(2) {
            match chunk {
                [key, value] => {
                    let name = key.as_keyword().ok_or_else(|| {
                        CommandError::invalid_argument(format!("expected a keyword, found {key}"))
                    })?;
                    pairs.push((name, value));
                }
                [key] => {
                    return Err(CommandError::invalid_argument(format!(
                        "missing value for {key}"
                    )));
                }
                _ => {}
            }
        }
        Ok(Self { pairs })
    }

    /// The value given for `key`; the leading colon is optional. When a key
    /// repeats the last value wins.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&'s Sexp> {
        let key = key.strip_prefix(':').unwrap_or(key);
        self.pairs
            .iter()
            .rev()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| *value)
    }

    /// A string argument.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when the value is not a string.
    pub fn string(&self, key: &str) -> Result<Option<&'s str>, CommandError> {
        self.get(key)
            .map(|value| value.as_str().ok_or_else(|| mistyped(key, "a string", value)))
            .transpose()
    }

    /// A string argument that must be present.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when the value is missing or not a string.
    pub fn required_string(&self, key: &str) -> Result<&'s str, CommandError> {
        self.string(key)?.ok_or_else(|| missing(key))
    }

    /// A numeric argument.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when the value is not a number.
    pub fn number(&self, key: &str) -> Result<Option<i64>, CommandError> {
        self.get(key)
            .map(|value| value.as_number().ok_or_else(|| mistyped(key, "a number", value)))
            .transpose()
    }

    /// A numeric argument that must be present.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when the value is missing or not a number.
    pub fn required_number(&self, key: &str) -> Result<i64, CommandError> {
        self.number(key)?.ok_or_else(|| missing(key))
    }

    /// A symbol argument such as `:sortfield subject`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when the value is not a symbol.
    pub fn symbol(&self, key: &str) -> Result<Option<&'s str>, CommandError> {
        self.get(key)
            .map(|value| value.as_symbol().ok_or_else(|| mistyped(key, "a symbol", value)))
            .transpose()
    }

    /// True when `key` is present with a value other than `nil`.
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(|value| !value.is_nil())
    }
}

fn display_key(key: &str) -> String {
    format!(":{}", key.strip_prefix(':').unwrap_or(key))
}

fn missing(key: &str) -> CommandError {
    CommandError::invalid_argument(format!("missing required {}", display_key(key)))
}

fn mistyped(key: &str, expected: &str, found: &Sexp) -> CommandError {
    CommandError::invalid_argument(format!(
        "{} must be {expected}, found {found}",
        display_key(key)
    ))
}
