//! Compatibility orchestration
//!
//! Decides whether a candidate schema may follow a history of registered
//! versions under a [`CompatibilityLevel`]. The format-specific rules live in
//! the engines; this layer handles the NONE short-circuit, engine lookup and
//! turning violations into a [`Verdict`].

use tracing::{debug, info};

use crate::engine::EngineRegistry;
use crate::error::{FailureKind, Result};
use crate::level::CompatibilityLevel;
use crate::schema::{normalize_line_endings, Schema, SchemaHistory};
use crate::verdict::{aggregate, Verdict};

/// Checks candidate schemas against their history
#[derive(Debug, Clone, Default)]
pub struct CompatibilityOrchestrator {
    registry: EngineRegistry,
}

impl CompatibilityOrchestrator {
    pub fn new(registry: EngineRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    /// Check `candidate` against `history` under `level`.
    ///
    /// `NONE` accepts without looking at the format, the history or the engine.
    /// For every other level the format must be registered, and schemas that
    /// cannot be parsed are reported as [`crate::CheckError::SchemaParse`].
    /// The history is only read.
    pub fn check_compatibility(
        &self,
        candidate: &Schema,
        history: &SchemaHistory,
        level: CompatibilityLevel,
    ) -> Result<Verdict> {
        if level == CompatibilityLevel::None {
            debug!(id = %candidate.id, "compatibility level NONE, skipping checks");
            return Ok(Verdict::pass());
        }

        let engine = self.registry.lookup(&candidate.format)?;
        debug!(
            id = %candidate.id,
            format = %engine.format(),
            level = %level,
            history = history.len(),
            "checking compatibility"
        );

        // fields are public, so a hand-built candidate may still carry CRLF
        let content = normalize_line_endings(&candidate.content);
        let violations = engine.test_compatibility(level, history, &content)?;
        let verdict = aggregate(violations, FailureKind::IncompatibleChange);

        info!(
            id = %candidate.id,
            format = %engine.format(),
            level = %level,
            ok = verdict.ok,
            issues = verdict.issues.len(),
            "compatibility checked"
        );
        Ok(verdict)
    }
}
