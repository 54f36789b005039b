//! Validity orchestration
//!
//! Checks a standalone schema against a [`ValidityLevel`], and payloads against
//! a schema. Results share the [`Verdict`] shape used for compatibility.

use tracing::{debug, info};

use crate::engine::{EngineRegistry, References};
use crate::error::{FailureKind, Result};
use crate::level::ValidityLevel;
use crate::schema::normalize_line_endings;
use crate::verdict::{aggregate, Verdict};

/// Validates schemas and messages through the registered engines
#[derive(Debug, Clone, Default)]
pub struct ValidityOrchestrator {
    registry: EngineRegistry,
}

impl ValidityOrchestrator {
    pub fn new(registry: EngineRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    /// Validate `schema` under `level`.
    ///
    /// `NONE` always passes without consulting an engine. A schema that does not
    /// parse yields a negative verdict rather than an error.
    pub fn check_validity(&self, format: &str, schema: &str, level: ValidityLevel) -> Result<Verdict> {
        self.check_validity_with_references(format, schema, level, &References::new())
    }

    /// Like [`check_validity`](Self::check_validity), resolving imports against
    /// already-fetched `references`
    pub fn check_validity_with_references(
        &self,
        format: &str,
        schema: &str,
        level: ValidityLevel,
        references: &References,
    ) -> Result<Verdict> {
        if level == ValidityLevel::None {
            debug!(format, "validity level NONE, skipping checks");
            return Ok(Verdict::pass());
        }

        let engine = self.registry.lookup(format)?;
        let schema = normalize_line_endings(schema);
        let violations = engine.validate(level, &schema, references)?;
        let verdict = aggregate(violations, FailureKind::ValidationFailed);

        info!(
            format = %engine.format(),
            level = %level,
            ok = verdict.ok,
            issues = verdict.issues.len(),
            "validity checked"
        );
        Ok(verdict)
    }

    /// Validate a data payload against `schema`.
    ///
    /// Fails with [`crate::CheckError::UnsupportedOperation`] for formats that
    /// cannot check payloads, and with [`crate::CheckError::SchemaParse`] when
    /// the schema itself is unusable.
    pub fn validate_message(&self, format: &str, data: &str, schema: &str) -> Result<Verdict> {
        let engine = self.registry.lookup(format)?;
        let schema = normalize_line_endings(schema);
        let data = normalize_line_endings(data);
        let violations = engine.validate_message(&data, &schema)?;
        let verdict = aggregate(violations, FailureKind::ValidationFailed);

        debug!(
            format = %engine.format(),
            ok = verdict.ok,
            issues = verdict.issues.len(),
            "message validated"
        );
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CheckError;

    #[test]
    fn test_none_always_passes() {
        let orchestrator = ValidityOrchestrator::default();
        for format in ["json", "avro", "protobuf", "xml", "csv", "unknown-format"] {
            let verdict = orchestrator
                .check_validity(format, "}{ definitely broken", ValidityLevel::None)
                .unwrap();
            assert!(verdict.ok, "{} should pass under NONE", format);
        }
    }

    #[test]
    fn test_unparseable_schema_is_a_verdict() {
        let orchestrator = ValidityOrchestrator::default();
        let verdict = orchestrator
            .check_validity("json", "{not json", ValidityLevel::SyntaxOnly)
            .unwrap();
        assert!(!verdict.ok);
        assert_eq!(verdict.failure_kind(), Some(FailureKind::ValidationFailed));
    }

    #[test]
    fn test_crlf_is_normalized() {
        let orchestrator = ValidityOrchestrator::default();
        let schema = "version 1.0\r\nid: notEmpty\r\n";
        let verdict = orchestrator.check_validity("csv", schema, ValidityLevel::Full).unwrap();
        assert!(verdict.ok, "{:?}", verdict.issues);
    }

    #[test]
    fn test_unknown_format() {
        let orchestrator = ValidityOrchestrator::default();
        assert!(matches!(
            orchestrator.check_validity("yaml", "a: b", ValidityLevel::Full),
            Err(CheckError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_message_validation() {
        let orchestrator = ValidityOrchestrator::default();
        let schema = "version 1.0\n@totalColumns 2\nid: positiveInteger\nname: notEmpty\n";

        let verdict = orchestrator.validate_message("csv", "id,name\n1,Ana\n", schema).unwrap();
        assert!(verdict.ok);

        let verdict = orchestrator.validate_message("csv", "id,name\n1,Ana,extra\n", schema).unwrap();
        assert!(!verdict.ok);

        assert!(matches!(
            orchestrator.validate_message("protobuf", "", "syntax = \"proto3\";"),
            Err(CheckError::UnsupportedOperation { .. })
        ));
    }
}
