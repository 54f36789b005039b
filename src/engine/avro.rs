//! AVRO engine
//!
//! The verdict comes from Avro schema resolution (`SchemaCompatibility::can_read`).
//! When the resolver rejects a pair, record fields are diffed to say why.

use apache_avro::schema_compatibility::SchemaCompatibility;
use apache_avro::types::Value as AvroValue;
use apache_avro::Schema as AvroSchema;
use serde_json::Value;

use super::{CheckerEngine, References};
use crate::error::{CheckError, Result};
use crate::level::{Direction, ValidityLevel};
use crate::schema::FormatId;
use crate::verdict::Violation;

/// A parsed AVRO schema with its JSON form kept for diagnostics
#[derive(Debug, Clone)]
pub struct ParsedAvro {
    pub schema: AvroSchema,
    pub json: Value,
}

/// Engine for AVRO schemas
#[derive(Debug, Clone, Copy, Default)]
pub struct AvroEngine;

impl CheckerEngine for AvroEngine {
    type Parsed = ParsedAvro;

    fn format(&self) -> FormatId {
        FormatId::Avro
    }

    fn parse(&self, content: &str) -> std::result::Result<ParsedAvro, String> {
        let json: Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
        let schema = AvroSchema::parse_str(content).map_err(|e| e.to_string())?;
        Ok(ParsedAvro { schema, json })
    }

    fn check_pair(&self, direction: Direction, existing: &ParsedAvro, candidate: &ParsedAvro) -> Vec<Violation> {
        let (writer, reader) = match direction {
            Direction::Backward => (existing, candidate),
            Direction::Forward => (candidate, existing),
        };

        if SchemaCompatibility::can_read(&writer.schema, &reader.schema) {
            return Vec::new();
        }

        let mut violations = Vec::new();
        detect_resolution_failures(&reader.json, &writer.json, "", &mut violations);
        if violations.is_empty() {
            violations.push(Violation::new(match direction {
                Direction::Backward => "new schema cannot read data written with the previous schema",
                Direction::Forward => "previous schema cannot read data written with the new schema",
            }));
        }
        violations
    }

    fn validate(&self, level: ValidityLevel, schema: &str, references: &References) -> Result<Vec<Violation>> {
        if level == ValidityLevel::None {
            return Ok(Vec::new());
        }

        if let Err(e) = serde_json::from_str::<Value>(schema) {
            return Ok(vec![Violation::new(format!("invalid JSON: {}", e))]);
        }
        if level == ValidityLevel::SyntaxOnly {
            return Ok(Vec::new());
        }

        let parsed = if references.is_empty() {
            AvroSchema::parse_str(schema).map(|_| ())
        } else {
            // referenced named types must be parsed together with the schema
            let mut inputs: Vec<&str> = references.values().map(String::as_str).collect();
            inputs.push(schema);
            AvroSchema::parse_list(&inputs).map(|_| ())
        };

        Ok(match parsed {
            Ok(()) => Vec::new(),
            Err(e) => vec![Violation::new(format!("invalid Avro schema: {}", e))],
        })
    }

    fn validate_message(&self, data: &str, schema: &str) -> Result<Vec<Violation>> {
        let schema = AvroSchema::parse_str(schema)
            .map_err(|e| CheckError::parse("avro", "schema", e))?;

        let datum: Value = match serde_json::from_str(data) {
            Ok(datum) => datum,
            Err(e) => return Ok(vec![Violation::new(format!("payload is not valid JSON: {}", e))]),
        };

        Ok(match AvroValue::from(datum).resolve(&schema) {
            Ok(_) => Vec::new(),
            Err(e) => vec![Violation::new(format!("payload does not match schema: {}", e))],
        })
    }
}

fn is_record(schema: &Value) -> bool {
    schema.get("type").and_then(Value::as_str) == Some("record")
}

fn is_enum(schema: &Value) -> bool {
    schema.get("type").and_then(Value::as_str) == Some("enum")
}

/// Whether data written as `writer` resolves into `reader` (primitive types only)
fn promotes(writer: &str, reader: &str) -> bool {
    writer == reader
        || matches!(
            (writer, reader),
            ("int", "long" | "float" | "double")
                | ("long", "float" | "double")
                | ("float", "double")
                | ("string", "bytes")
                | ("bytes", "string")
        )
}

fn field_name(field: &Value) -> Option<&str> {
    field.get("name").and_then(Value::as_str)
}

/// Find the writer field a reader field resolves from, honouring reader aliases
fn writer_field<'a>(reader_field: &Value, writer_fields: &'a [Value]) -> Option<&'a Value> {
    let name = field_name(reader_field)?;
    let aliases: Vec<&str> = reader_field
        .get("aliases")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    writer_fields.iter().find(|f| {
        field_name(f).map_or(false, |n| n == name || aliases.contains(&n))
    })
}

/// Field-level reasons a reader cannot resolve data from a writer
fn detect_resolution_failures(reader: &Value, writer: &Value, path: &str, violations: &mut Vec<Violation>) {
    if is_enum(reader) && is_enum(writer) {
        detect_enum_failures(reader, writer, path, violations);
        return;
    }
    if !(is_record(reader) && is_record(writer)) {
        return;
    }

    let empty = Vec::new();
    let reader_fields = reader.get("fields").and_then(Value::as_array).unwrap_or(&empty);
    let writer_fields = writer.get("fields").and_then(Value::as_array).unwrap_or(&empty);

    for reader_field in reader_fields {
        let Some(name) = field_name(reader_field) else { continue };
        let field_path = if path.is_empty() {
            format!("fields.{}", name)
        } else {
            format!("{}.fields.{}", path, name)
        };

        let Some(writer_field) = writer_field(reader_field, writer_fields) else {
            if reader_field.get("default").is_none() {
                violations.push(Violation::at(
                    format!("field '{}' has no default value and is missing from the writer schema", name),
                    field_path,
                ));
            }
            continue;
        };

        let (Some(reader_type), Some(writer_type)) = (reader_field.get("type"), writer_field.get("type")) else {
            continue;
        };
        match (reader_type, writer_type) {
            (Value::String(r), Value::String(w)) if !promotes(w, r) => {
                violations.push(Violation::at(
                    format!("field '{}' type changed from {} to {}", name, w, r),
                    field_path,
                ));
            }
            (Value::Object(_), Value::Object(_)) => {
                detect_resolution_failures(reader_type, writer_type, &field_path, violations);
            }
            _ => {}
        }
    }
}

fn detect_enum_failures(reader: &Value, writer: &Value, path: &str, violations: &mut Vec<Violation>) {
    if reader.get("default").is_some() {
        return;
    }
    let symbols = |schema: &Value| -> Vec<String> {
        schema
            .get("symbols")
            .and_then(Value::as_array)
            .map(|s| s.iter().filter_map(Value::as_str).map(String::from).collect())
            .unwrap_or_default()
    };
    let reader_symbols = symbols(reader);
    for symbol in symbols(writer) {
        if !reader_symbols.contains(&symbol) {
            let context = if path.is_empty() { "symbols".to_string() } else { format!("{}.symbols", path) };
            violations.push(Violation::at(
                format!("enum symbol '{}' is unknown to the reader", symbol),
                context,
            ));
        }
    }
}
