//! Well-known bus names.

use std::fmt;

use mu_store::ErrorCode;
use thiserror::Error;

/// Name owned when no suffix is configured.
pub const BASE_BUS_NAME: &str = "nl.djcbsoftware.Mu.Maildir";

/// Rejected bus name suffix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusNameError {
    /// The suffix contained something other than ASCII letters and digits.
    #[error("invalid bus name suffix '{suffix}': only ASCII letters and digits are allowed")]
    InvalidSuffix {
        /// The offending suffix.
        suffix: String,
    },
}

impl BusNameError {
    /// Error code reported for this failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::InvalidArgument
    }
}

/// A validated well-known name such as `nl.djcbsoftware.Mu.Maildir.work`.
///
/// The suffix lets several servers, each over its own store, run side by
/// side.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BusName(String);

impl BusName {
    /// Builds the name for an optional suffix.
    ///
    /// # Errors
    ///
    /// Returns [`BusNameError::InvalidSuffix`] unless the suffix is a
    /// non-empty run of ASCII letters and digits.
    pub fn with_suffix(suffix: Option<&str>) -> Result<Self, BusNameError> {
        let Some(suffix) = suffix else {
            return Ok(Self(BASE_BUS_NAME.to_owned()));
        };
        if suffix.is_empty() || !suffix.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return Err(BusNameError::InvalidSuffix {
                suffix: suffix.to_owned(),
            });
        }
        Ok(Self(format!("{BASE_BUS_NAME}.{suffix}")))
    }

    /// The name as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BusName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn base_name_without_suffix() {
        let name = BusName::with_suffix(None).expect("base name");
        assert_eq!(name.as_str(), "nl.djcbsoftware.Mu.Maildir");
    }

    #[rstest]
    #[case("work")]
    #[case("Home2")]
    fn alphanumeric_suffixes_are_appended(#[case] suffix: &str) {
        let name = BusName::with_suffix(Some(suffix)).expect("valid suffix");
        assert_eq!(name.to_string(), format!("nl.djcbsoftware.Mu.Maildir.{suffix}"));
    }

    #[rstest]
    #[case("")]
    #[case("my-work")]
    #[case("a.b")]
    #[case("caf\u{e9}")]
    #[case("with space")]
    fn other_suffixes_are_rejected(#[case] suffix: &str) {
        let error = BusName::with_suffix(Some(suffix)).expect_err("invalid suffix");
        assert_eq!(error.code(), ErrorCode::InvalidArgument);
    }
}
