//! Execution languages understood by the remote engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Language an execution context is bound to. Fixed at session
/// creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Sql,
    R,
    Scala,
}

impl Language {
    /// Wire name sent to the remote service.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Sql => "sql",
            Self::R => "r",
            Self::Scala => "scala",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for language names the remote engine cannot execute.
#[derive(Debug, Clone, Error)]
#[error("Language {0} is not supported")]
pub struct UnsupportedLanguage(pub String);

impl FromStr for Language {
    type Err = UnsupportedLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "python" => Ok(Self::Python),
            "sql" => Ok(Self::Sql),
            "r" => Ok(Self::R),
            "scala" => Ok(Self::Scala),
            _ => Err(UnsupportedLanguage(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("Python".parse::<Language>().unwrap(), Language::Python);
        assert_eq!("SQL".parse::<Language>().unwrap(), Language::Sql);
        assert_eq!("r".parse::<Language>().unwrap(), Language::R);
    }

    #[test]
    fn test_unknown_language_message() {
        let err = "haskell".parse::<Language>().unwrap_err();
        assert_eq!(err.to_string(), "Language haskell is not supported");
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(Language::Scala.as_str(), "scala");
        assert_eq!(Language::Python.to_string(), "python");
    }
}
