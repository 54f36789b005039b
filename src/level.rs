//! Compatibility and validity levels
//!
//! A compatibility level expands into the directions tested and the slice of
//! history compared against:
//!
//! | Level | Directions | History |
//! |---|---|---|
//! | `NONE` | none | - |
//! | `BACKWARD` | backward | latest |
//! | `BACKWARD_TRANSITIVE` | backward | all |
//! | `FORWARD` | forward | latest |
//! | `FORWARD_TRANSITIVE` | forward | all |
//! | `FULL` | backward, forward | latest |
//! | `FULL_TRANSITIVE` | backward, forward | all |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CheckError;

/// Direction of a single compatibility test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// The new schema reads data written with an existing schema
    Backward,
    /// An existing schema reads data written with the new schema
    Forward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Backward => f.write_str("backward"),
            Direction::Forward => f.write_str("forward"),
        }
    }
}

/// Which history entries a check compares against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryScope {
    /// Only the most recent version
    Latest,
    /// Every registered version
    All,
}

/// Compatibility policy for a new schema relative to its history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum CompatibilityLevel {
    None,
    #[default]
    Backward,
    BackwardTransitive,
    Forward,
    ForwardTransitive,
    Full,
    FullTransitive,
}

impl CompatibilityLevel {
    /// Directions tested, backward first
    pub fn directions(&self) -> &'static [Direction] {
        match self {
            CompatibilityLevel::None => &[],
            CompatibilityLevel::Backward | CompatibilityLevel::BackwardTransitive => {
                &[Direction::Backward]
            }
            CompatibilityLevel::Forward | CompatibilityLevel::ForwardTransitive => {
                &[Direction::Forward]
            }
            CompatibilityLevel::Full | CompatibilityLevel::FullTransitive => {
                &[Direction::Backward, Direction::Forward]
            }
        }
    }

    pub fn is_transitive(&self) -> bool {
        matches!(
            self,
            CompatibilityLevel::BackwardTransitive
                | CompatibilityLevel::ForwardTransitive
                | CompatibilityLevel::FullTransitive
        )
    }

    /// History entries compared against
    pub fn history_scope(&self) -> HistoryScope {
        if self.is_transitive() {
            HistoryScope::All
        } else {
            HistoryScope::Latest
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompatibilityLevel::None => "NONE",
            CompatibilityLevel::Backward => "BACKWARD",
            CompatibilityLevel::BackwardTransitive => "BACKWARD_TRANSITIVE",
            CompatibilityLevel::Forward => "FORWARD",
            CompatibilityLevel::ForwardTransitive => "FORWARD_TRANSITIVE",
            CompatibilityLevel::Full => "FULL",
            CompatibilityLevel::FullTransitive => "FULL_TRANSITIVE",
        }
    }
}

impl fmt::Display for CompatibilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompatibilityLevel {
    type Err = CheckError;

    /// Case-insensitive; `-` is accepted in place of `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match canonical_mode(s).as_str() {
            "NONE" => Ok(CompatibilityLevel::None),
            "BACKWARD" => Ok(CompatibilityLevel::Backward),
            "BACKWARD_TRANSITIVE" => Ok(CompatibilityLevel::BackwardTransitive),
            "FORWARD" => Ok(CompatibilityLevel::Forward),
            "FORWARD_TRANSITIVE" => Ok(CompatibilityLevel::ForwardTransitive),
            "FULL" => Ok(CompatibilityLevel::Full),
            "FULL_TRANSITIVE" => Ok(CompatibilityLevel::FullTransitive),
            _ => Err(CheckError::UnknownLevel(s.to_string())),
        }
    }
}

/// How deep a single-schema validity check goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum ValidityLevel {
    None,
    SyntaxOnly,
    #[default]
    Full,
}

impl ValidityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidityLevel::None => "NONE",
            ValidityLevel::SyntaxOnly => "SYNTAX_ONLY",
            ValidityLevel::Full => "FULL",
        }
    }
}

impl fmt::Display for ValidityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidityLevel {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match canonical_mode(s).as_str() {
            "NONE" => Ok(ValidityLevel::None),
            "SYNTAX_ONLY" => Ok(ValidityLevel::SyntaxOnly),
            "FULL" => Ok(ValidityLevel::Full),
            _ => Err(CheckError::UnknownLevel(s.to_string())),
        }
    }
}

macro_rules! string_conversions {
    ($level:ty) => {
        impl TryFrom<String> for $level {
            type Error = CheckError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$level> for String {
            fn from(level: $level) -> Self {
                level.as_str().to_string()
            }
        }
    };
}

string_conversions!(CompatibilityLevel);
string_conversions!(ValidityLevel);

fn canonical_mode(s: &str) -> String {
    s.trim().to_ascii_uppercase().replace('-', "_")
}
