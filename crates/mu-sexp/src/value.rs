//! The structured expression value shared by requests and replies.

use std::fmt;

use crate::escape::escape;

/// An immutable symbolic expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Sexp {
    /// A bare symbol such as `find` or `t`.
    Symbol(String),
    /// A keyword such as `:query`, stored without its leading colon.
    Keyword(String),
    /// A string literal, stored unescaped.
    String(String),
    /// An integer.
    Number(i64),
    /// An ordered list of sub-expressions.
    List(Vec<Sexp>),
}

impl Sexp {
    /// Builds a symbol.
    #[must_use]
    pub fn symbol(name: impl Into<String>) -> Self {
        Self::Symbol(name.into())
    }

    /// Builds a keyword. A leading colon in `name` is accepted and dropped.
    #[must_use]
    pub fn keyword(name: impl Into<String>) -> Self {
        let owned = name.into();
        match owned.strip_prefix(':') {
            Some(stripped) => Self::Keyword(stripped.to_owned()),
            None => Self::Keyword(owned),
        }
    }

    /// Builds a string literal.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Builds a number.
    #[must_use]
    pub const fn number(value: i64) -> Self {
        Self::Number(value)
    }

    /// Builds a list from the given items.
    #[must_use]
    pub fn list(items: impl IntoIterator<Item = Self>) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// Builds a property list `(:key value :key value ...)`.
    #[must_use]
    pub fn plist<'k>(pairs: impl IntoIterator<Item = (&'k str, Self)>) -> Self {
        let mut items = Vec::new();
        for (key, value) in pairs {
            items.push(Self::keyword(key));
            items.push(value);
        }
        Self::List(items)
    }

    /// The conventional true value, the symbol `t`.
    #[must_use]
    pub fn t() -> Self {
        Self::symbol("t")
    }

    /// The conventional false/empty value, the symbol `nil`.
    #[must_use]
    pub fn nil() -> Self {
        Self::symbol("nil")
    }

    /// Returns true for the symbol `nil` and the empty list.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        match self {
            Self::Symbol(name) => name == "nil",
            Self::List(items) => items.is_empty(),
            _ => false,
        }
    }

    /// First element of a list.
    #[must_use]
    pub fn head(&self) -> Option<&Self> {
        self.as_list().and_then(<[Self]>::first)
    }

    /// Elements after the first; empty for atoms and empty lists.
    #[must_use]
    pub fn tail(&self) -> &[Self] {
        match self.as_list() {
            Some([_, rest @ ..]) => rest,
            _ => &[],
        }
    }

    /// The items of a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// The name of a symbol.
    #[must_use]
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Self::Symbol(name) => Some(name),
            _ => None,
        }
    }

    /// The name of a keyword, without its colon.
    #[must_use]
    pub fn as_keyword(&self) -> Option<&str> {
        match self {
            Self::Keyword(name) => Some(name),
            _ => None,
        }
    }

    /// The contents of a string literal.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// The value of a number.
    #[must_use]
    pub const fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for Sexp {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symbol(name) => formatter.write_str(name),
            Self::Keyword(name) => write!(formatter, ":{name}"),
            Self::String(value) => formatter.write_str(&escape(value)),
            Self::Number(value) => write!(formatter, "{value}"),
            Self::List(items) => {
                formatter.write_str("(")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        formatter.write_str(" ")?;
                    }
                    write!(formatter, "{item}")?;
                }
                formatter.write_str(")")
            }
        }
    }
}

impl From<&str> for Sexp {
    fn from(value: &str) -> Self {
        Self::string(value)
    }
}

impl From<String> for Sexp {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for Sexp {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<u32> for Sexp {
    fn from(value: u32) -> Self {
        Self::Number(i64::from(value))
    }
}

impl From<bool> for Sexp {
    fn from(value: bool) -> Self {
        if value { Self::t() } else { Self::nil() }
    }
}
