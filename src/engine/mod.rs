//! Per-format checking engines
//!
//! Every format is handled by one engine implementing [`CheckerEngine`]. The set of
//! formats is closed, so engines are held in the [`Engine`] tagged variant and looked
//! up through the [`EngineRegistry`] rather than resolved dynamically.

pub mod avro;
pub mod csv;
pub mod json;
pub mod protobuf;
pub mod xsd;

use std::collections::BTreeMap;

use crate::error::{CheckError, Result};
use crate::level::{CompatibilityLevel, Direction, ValidityLevel};
use crate::schema::{FormatId, SchemaHistory};
use crate::verdict::Violation;

pub use self::avro::AvroEngine;
pub use self::csv::CsvEngine;
pub use self::json::JsonEngine;
pub use self::protobuf::ProtobufEngine;
pub use self::xsd::XsdEngine;

/// Already-resolved external references, keyed by the name used in the schema
pub type References = BTreeMap<String, String>;

/// Capability implemented by each format engine
pub trait CheckerEngine {
    /// Parsed form of a schema, built once per schema per call
    type Parsed;

    /// Format this engine handles
    fn format(&self) -> FormatId;

    /// Parse raw schema text; the error is a human-readable reason
    fn parse(&self, content: &str) -> std::result::Result<Self::Parsed, String>;

    /// Violations of one directional test between an existing schema and the candidate
    fn check_pair(
        &self,
        direction: Direction,
        existing: &Self::Parsed,
        candidate: &Self::Parsed,
    ) -> Vec<Violation>;

    /// Validate a single schema under the given level.
    ///
    /// A schema that fails to parse is reported as a violation here, not an error.
    fn validate(
        &self,
        level: ValidityLevel,
        schema: &str,
        references: &References,
    ) -> Result<Vec<Violation>>;

    /// Validate a payload against a schema
    fn validate_message(&self, _data: &str, _schema: &str) -> Result<Vec<Violation>> {
        Err(CheckError::UnsupportedOperation {
            format: self.format().to_string(),
            operation: "message validation".to_string(),
        })
    }

    /// Run every directional test `level` asks for against `history`.
    ///
    /// Non-transitive levels compare against the latest entry only, transitive
    /// levels against every entry oldest first. Backward runs before forward for
    /// each entry.
    fn test_compatibility(
        &self,
        level: CompatibilityLevel,
        history: &SchemaHistory,
        candidate: &str,
    ) -> Result<Vec<Violation>> {
        let directions = level.directions();
        if directions.is_empty() {
            return Ok(Vec::new());
        }

        let candidate = self
            .parse(candidate)
            .map_err(|reason| CheckError::parse(self.format().as_str(), "candidate", reason))?;

        let mut violations = Vec::new();
        for (index, content) in history.in_scope(level.history_scope()) {
            let location = format!("history[{}]", index);
            let existing = self
                .parse(content)
                .map_err(|reason| CheckError::parse(self.format().as_str(), location.as_str(), reason))?;

            for direction in directions {
                violations.extend(
                    self.check_pair(*direction, &existing, &candidate)
                        .into_iter()
                        .map(|v| v.or_context(location.as_str())),
                );
            }
        }

        Ok(violations)
    }
}

/// The closed set of engines
#[derive(Debug, Clone)]
pub enum Engine {
    Json(JsonEngine),
    Avro(AvroEngine),
    Protobuf(ProtobufEngine),
    Xml(XsdEngine),
    Csv(CsvEngine),
}

macro_rules! dispatch {
    ($engine:expr, $inner:ident => $call:expr) => {
        match $engine {
            Engine::Json($inner) => $call,
            Engine::Avro($inner) => $call,
            Engine::Protobuf($inner) => $call,
            Engine::Xml($inner) => $call,
            Engine::Csv($inner) => $call,
        }
    };
}

impl Engine {
    /// The engine implementing `format`
    pub fn for_format(format: FormatId) -> Self {
        match format {
            FormatId::Json => Engine::Json(JsonEngine),
            FormatId::Avro => Engine::Avro(AvroEngine),
            FormatId::Protobuf => Engine::Protobuf(ProtobufEngine),
            FormatId::Xml => Engine::Xml(XsdEngine),
            FormatId::Csv => Engine::Csv(CsvEngine),
        }
    }

    pub fn format(&self) -> FormatId {
        dispatch!(self, e => e.format())
    }

    pub fn test_compatibility(
        &self,
        level: CompatibilityLevel,
        history: &SchemaHistory,
        candidate: &str,
    ) -> Result<Vec<Violation>> {
        dispatch!(self, e => e.test_compatibility(level, history, candidate))
    }

    pub fn validate(
        &self,
        level: ValidityLevel,
        schema: &str,
        references: &References,
    ) -> Result<Vec<Violation>> {
        dispatch!(self, e => e.validate(level, schema, references))
    }

    pub fn validate_message(&self, data: &str, schema: &str) -> Result<Vec<Violation>> {
        dispatch!(self, e => e.validate_message(data, schema))
    }
}

/// Maps format tokens to engines. Read-only once built.
#[derive(Debug, Clone)]
pub struct EngineRegistry {
    engines: BTreeMap<FormatId, Engine>,
}

impl EngineRegistry {
    /// Registry with every known format enabled
    pub fn new() -> Self {
        Self::with_formats(FormatId::ALL)
    }

    /// Registry exposing only the given formats
    pub fn with_formats(formats: impl IntoIterator<Item = FormatId>) -> Self {
        let engines = formats
            .into_iter()
            .map(|f| (f, Engine::for_format(f)))
            .collect();
        Self { engines }
    }

    /// Engine for a format token.
    ///
    /// Unknown tokens and formats not enabled in this registry both fail with
    /// [`CheckError::UnsupportedFormat`].
    pub fn lookup(&self, format: &str) -> Result<&Engine> {
        let id: FormatId = format.parse()?;
        self.engines
            .get(&id)
            .ok_or_else(|| CheckError::UnsupportedFormat(format.to_string()))
    }

    /// Enabled formats, in a stable order
    pub fn formats(&self) -> impl Iterator<Item = FormatId> + '_ {
        self.engines.keys().copied()
    }

    pub fn is_enabled(&self, format: FormatId) -> bool {
        self.engines.contains_key(&format)
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_registered_formats() {
        let registry = EngineRegistry::new();
        for token in ["json", "avro", "protobuf", "xml", "xsd", "csv"] {
            assert!(registry.lookup(token).is_ok(), "{} should be registered", token);
        }
        assert_eq!(registry.lookup("xsd").unwrap().format(), FormatId::Xml);
    }

    #[test]
    fn test_lookup_unknown_format() {
        let registry = EngineRegistry::new();
        for token in ["unknown-format", "", "Avro", "yaml"] {
            match registry.lookup(token) {
                Err(CheckError::UnsupportedFormat(f)) => assert_eq!(f, token),
                other => panic!("expected UnsupportedFormat for {:?}, got {:?}", token, other.map(|e| e.format())),
            }
        }
    }

    #[test]
    fn test_disabled_format_is_unsupported() {
        let registry = EngineRegistry::with_formats([FormatId::Json]);
        assert!(registry.lookup("json").is_ok());
        assert!(matches!(
            registry.lookup("avro"),
            Err(CheckError::UnsupportedFormat(_))
        ));
        assert_eq!(registry.formats().collect::<Vec<_>>(), vec![FormatId::Json]);
    }

    #[test]
    fn test_parse_failures_name_their_location() {
        let engine = Engine::for_format(FormatId::Json);
        let history: SchemaHistory = [r#"{"type": "object"}"#, "{not json"].into_iter().collect();

        let err = engine
            .test_compatibility(CompatibilityLevel::BackwardTransitive, &history, r#"{"type": "object"}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            CheckError::SchemaParse { ref location, .. } if location == "history[1]"
        ));

        let err = engine
            .test_compatibility(CompatibilityLevel::Backward, &history, "{")
            .unwrap_err();
        assert!(matches!(
            err,
            CheckError::SchemaParse { ref location, .. } if location == "candidate"
        ));
    }

    #[test]
    fn test_non_transitive_ignores_older_entries() {
        let engine = Engine::for_format(FormatId::Json);
        // the broken first entry is outside BACKWARD's scope
        let history: SchemaHistory = ["{broken", r#"{"type": "object"}"#].into_iter().collect();
        let violations = engine
            .test_compatibility(CompatibilityLevel::Backward, &history, r#"{"type": "object"}"#)
            .unwrap();
        assert!(violations.is_empty());
    }
}
