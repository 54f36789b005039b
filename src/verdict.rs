//! Violations reported by engines and the verdicts built from them

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FailureKind;

/// Separator used when a verdict's issues are joined for display
pub const ISSUE_SEPARATOR: &str = "; ";

/// One reason a check failed, as reported by an engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Human-readable description
    pub description: String,
    /// Where in the schema the problem sits (e.g. "fields.age", "row 3, column 'id'")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl Violation {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            context: None,
        }
    }

    pub fn at(description: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            context: Some(context.into()),
        }
    }

    /// Attach a context when the engine did not set one
    pub fn or_context(mut self, context: impl Into<String>) -> Self {
        if self.context.is_none() {
            self.context = Some(context.into());
        }
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{} at {}", self.description, context),
            None => f.write_str(&self.description),
        }
    }
}

/// Terminal output of a compatibility or validity check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// `true` exactly when `issues` is empty
    pub ok: bool,
    /// Rendered violations in engine-report order
    pub issues: Vec<String>,
    /// What a negative verdict means (incompatible change or failed validation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl Verdict {
    /// A positive verdict with no issues
    pub fn pass() -> Self {
        Self {
            ok: true,
            issues: Vec::new(),
            failure: None,
        }
    }

    /// The failure class of a negative verdict, `None` when `ok`
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure
    }

    /// Issues joined with [`ISSUE_SEPARATOR`]
    pub fn joined_issues(&self) -> String {
        self.issues.join(ISSUE_SEPARATOR)
    }
}

/// Turn engine violations into a verdict.
///
/// Order is kept exactly as reported; nothing is sorted or deduplicated.
/// `failure` labels the verdict when any violation is present.
pub fn aggregate(violations: Vec<Violation>, failure: FailureKind) -> Verdict {
    if violations.is_empty() {
        return Verdict::pass();
    }

    Verdict {
        ok: false,
        issues: violations.iter().map(ToString::to_string).collect(),
        failure: Some(failure),
    }
}
