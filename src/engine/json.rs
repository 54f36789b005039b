//! JSON Schema engine
//!
//! Compatibility is a structural diff between a *reader* schema and a *writer*
//! schema: every document valid under the writer must stay valid under the reader.
//! BACKWARD reads with the candidate, FORWARD reads with the existing schema.

use std::collections::BTreeSet;

use jsonschema::JSONSchema;
use serde_json::Value;

use super::{CheckerEngine, References};
use crate::error::{CheckError, Result};
use crate::level::{Direction, ValidityLevel};
use crate::schema::FormatId;
use crate::verdict::Violation;

const LOWER_BOUNDS: [&str; 5] = [
    "minimum",
    "exclusiveMinimum",
    "minLength",
    "minItems",
    "minProperties",
];

const UPPER_BOUNDS: [&str; 5] = [
    "maximum",
    "exclusiveMaximum",
    "maxLength",
    "maxItems",
    "maxProperties",
];

/// Engine for JSON Schema documents
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEngine;

impl CheckerEngine for JsonEngine {
    type Parsed = Value;

    fn format(&self) -> FormatId {
        FormatId::Json
    }

    fn parse(&self, content: &str) -> std::result::Result<Value, String> {
        let value: Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
        match value {
            Value::Object(_) | Value::Bool(_) => Ok(value),
            _ => Err("schema must be a JSON object or boolean".to_string()),
        }
    }

    fn check_pair(&self, direction: Direction, existing: &Value, candidate: &Value) -> Vec<Violation> {
        let mut violations = Vec::new();
        match direction {
            Direction::Backward => compare(candidate, existing, "", &mut violations),
            Direction::Forward => compare(existing, candidate, "", &mut violations),
        }
        violations
    }

    fn validate(&self, level: ValidityLevel, schema: &str, references: &References) -> Result<Vec<Violation>> {
        if level == ValidityLevel::None {
            return Ok(Vec::new());
        }

        let value = match self.parse(schema) {
            Ok(value) => value,
            Err(reason) => return Ok(vec![Violation::new(format!("invalid JSON Schema syntax: {}", reason))]),
        };
        if level == ValidityLevel::SyntaxOnly {
            return Ok(Vec::new());
        }

        let mut violations = Vec::new();
        if let Err(err) = JSONSchema::compile(&value) {
            let pointer = err.instance_path.to_string();
            let description = err.to_string();
            violations.push(if pointer.is_empty() {
                Violation::new(description)
            } else {
                Violation::at(description, pointer)
            });
        }
        check_references(&value, &value, "", references, &mut violations);
        Ok(violations)
    }

    fn validate_message(&self, data: &str, schema: &str) -> Result<Vec<Violation>> {
        let schema = self
            .parse(schema)
            .map_err(|reason| CheckError::parse("json", "schema", reason))?;
        let compiled = JSONSchema::compile(&schema)
            .map_err(|e| CheckError::parse("json", "schema", e.to_string()))?;

        let instance: Value = match serde_json::from_str(data) {
            Ok(instance) => instance,
            Err(e) => return Ok(vec![Violation::new(format!("payload is not valid JSON: {}", e))]),
        };

        let violations = match compiled.validate(&instance) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|e| {
                    let pointer = e.instance_path.to_string();
                    if pointer.is_empty() {
                        Violation::new(e.to_string())
                    } else {
                        Violation::at(e.to_string(), pointer)
                    }
                })
                .collect(),
        };
        Ok(violations)
    }
}

fn location(path: &str) -> String {
    if path.is_empty() {
        "#".to_string()
    } else {
        path.to_string()
    }
}

fn child_path(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", path, segment)
    }
}

/// The `type` keyword as a set, `None` when unconstrained
fn type_set(schema: &Value) -> Option<BTreeSet<&str>> {
    match schema.get("type")? {
        Value::String(t) => Some(std::iter::once(t.as_str()).collect()),
        Value::Array(ts) => Some(ts.iter().filter_map(Value::as_str).collect()),
        _ => None,
    }
}

fn required_set(schema: &Value) -> BTreeSet<&str> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn closes_additional(schema: &Value) -> bool {
    schema.get("additionalProperties") == Some(&Value::Bool(false))
}

/// Record every way `reader` rejects documents that `writer` accepts
fn compare(reader: &Value, writer: &Value, path: &str, violations: &mut Vec<Violation>) {
    match (reader, writer) {
        (Value::Bool(true), _) | (_, Value::Bool(false)) => return,
        (Value::Bool(false), _) => {
            violations.push(Violation::at("schema no longer accepts any value", location(path)));
            return;
        }
        _ => {}
    }

    // Type changes
    match (type_set(reader), type_set(writer)) {
        (Some(reader_types), Some(writer_types)) => {
            let rejected: Vec<_> = writer_types
                .iter()
                .filter(|t| !(reader_types.contains(*t) || (**t == "integer" && reader_types.contains("number"))))
                .collect();
            if !rejected.is_empty() {
                violations.push(Violation::at(
                    format!(
                        "type changed from {:?} to {:?}",
                        writer_types.iter().collect::<Vec<_>>(),
                        reader_types.iter().collect::<Vec<_>>()
                    ),
                    location(path),
                ));
            }
        }
        (Some(reader_types), None) => {
            violations.push(Violation::at(
                format!("type constraint {:?} was added", reader_types.iter().collect::<Vec<_>>()),
                location(path),
            ));
        }
        _ => {}
    }

    // Newly required properties
    let writer_required = required_set(writer);
    for name in required_set(reader) {
        if !writer_required.contains(name) {
            violations.push(Violation::at(
                format!("property '{}' became required", name),
                location(path),
            ));
        }
    }

    // Properties
    let empty = serde_json::Map::new();
    let reader_props = reader.get("properties").and_then(Value::as_object).unwrap_or(&empty);
    let writer_props = writer.get("properties").and_then(Value::as_object).unwrap_or(&empty);

    for (name, writer_prop) in writer_props {
        let prop_path = child_path(path, &format!("properties.{}", name));
        match reader_props.get(name) {
            Some(reader_prop) => compare(reader_prop, writer_prop, &prop_path, violations),
            None => match reader.get("additionalProperties") {
                Some(Value::Bool(false)) => violations.push(Violation::at(
                    format!("property '{}' is no longer allowed", name),
                    location(path),
                )),
                Some(additional @ Value::Object(_)) => {
                    compare(additional, writer_prop, &prop_path, violations)
                }
                _ => {}
            },
        }
    }

    if closes_additional(reader) && !closes_additional(writer) {
        violations.push(Violation::at(
            "additional properties are no longer allowed",
            location(path),
        ));
    }

    // Enumerations
    if let Some(reader_enum) = reader.get("enum").and_then(Value::as_array) {
        match writer.get("enum").and_then(Value::as_array) {
            Some(writer_enum) => {
                for value in writer_enum {
                    if !reader_enum.contains(value) {
                        violations.push(Violation::at(
                            format!("enum value {} was removed", value),
                            location(path),
                        ));
                    }
                }
            }
            None => violations.push(Violation::at("enum constraint was added", location(path))),
        }
    }

    // Array items
    if let (Some(reader_items), Some(writer_items)) = (reader.get("items"), writer.get("items")) {
        if reader_items.is_object() || reader_items.is_boolean() {
            compare(reader_items, writer_items, &child_path(path, "items"), violations);
        }
    }

    // Bounds
    for key in LOWER_BOUNDS {
        if let Some(reader_bound) = reader.get(key).and_then(Value::as_f64) {
            match writer.get(key).and_then(Value::as_f64) {
                Some(writer_bound) if reader_bound <= writer_bound => {}
                Some(writer_bound) => violations.push(Violation::at(
                    format!("{} raised from {} to {}", key, writer_bound, reader_bound),
                    location(path),
                )),
                None => violations.push(Violation::at(
                    format!("{} constraint {} was added", key, reader_bound),
                    location(path),
                )),
            }
        }
    }
    for key in UPPER_BOUNDS {
        if let Some(reader_bound) = reader.get(key).and_then(Value::as_f64) {
            match writer.get(key).and_then(Value::as_f64) {
                Some(writer_bound) if reader_bound >= writer_bound => {}
                Some(writer_bound) => violations.push(Violation::at(
                    format!("{} lowered from {} to {}", key, writer_bound, reader_bound),
                    location(path),
                )),
                None => violations.push(Violation::at(
                    format!("{} constraint {} was added", key, reader_bound),
                    location(path),
                )),
            }
        }
    }

    if let Some(pattern) = reader.get("pattern").and_then(Value::as_str) {
        if writer.get("pattern").and_then(Value::as_str) != Some(pattern) {
            violations.push(Violation::at(
                format!("pattern '{}' was introduced", pattern),
                location(path),
            ));
        }
    }
}

/// Check every `$ref` resolves, locally or through the resolved references
fn check_references(
    root: &Value,
    node: &Value,
    pointer: &str,
    references: &References,
    violations: &mut Vec<Violation>,
) {
    match node {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                let context = if pointer.is_empty() { "#".to_string() } else { pointer.to_string() };
                if let Some(local) = reference.strip_prefix('#') {
                    if !local.is_empty() && root.pointer(local).is_none() {
                        violations.push(Violation::at(
                            format!("unresolved reference '{}'", reference),
                            context,
                        ));
                    }
                } else {
                    let document = reference.split('#').next().unwrap_or(reference);
                    if !references.contains_key(reference) && !references.contains_key(document) {
                        violations.push(Violation::at(
                            format!("external reference '{}' is not resolved", reference),
                            context,
                        ));
                    }
                }
            }
            for (key, child) in map {
                let escaped = key.replace('~', "~0").replace('/', "~1");
                check_references(root, child, &format!("{}/{}", pointer, escaped), references, violations);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                check_references(root, child, &format!("{}/{}", pointer, index), references, violations);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn backward(existing: Value, candidate: Value) -> Vec<Violation> {
        JsonEngine.check_pair(Direction::Backward, &existing, &candidate)
    }

    #[test]
    fn test_compatible_optional_property_addition() {
        let old = json!({
            "type": "object",
            "properties": { "name": { "type": "string" } }
        });
        let new = json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "age": { "type": "number" }
            }
        });

        assert!(backward(old.clone(), new.clone()).is_empty());
        assert!(JsonEngine.check_pair(Direction::Forward, &old, &new).is_empty());
    }

    #[test]
    fn test_new_required_property_breaks_backward() {
        let old = json!({
            "type": "object",
            "properties": { "name": { "type": "string" } }
        });
        let new = json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "age": { "type": "integer" }
            },
            "required": ["age"]
        });

        let violations = backward(old.clone(), new.clone());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].to_string(), "property 'age' became required at #");
        // old readers never require the field, so forward holds
        assert!(JsonEngine.check_pair(Direction::Forward, &old, &new).is_empty());
    }

    #[test]
    fn test_type_change_and_widening() {
        let old = json!({ "properties": { "count": { "type": "integer" } } });
        let widened = json!({ "properties": { "count": { "type": "number" } } });
        let changed = json!({ "properties": { "count": { "type": "string" } } });

        assert!(backward(old.clone(), widened.clone()).is_empty());
        // data written as any number is not always an integer
        assert_eq!(JsonEngine.check_pair(Direction::Forward, &old, &widened).len(), 1);

        let violations = backward(old, changed);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].context.as_deref(), Some("properties.count"));
    }

    #[test]
    fn test_enum_value_removal() {
        let old = json!({ "enum": ["a", "b", "c"] });
        let new = json!({ "enum": ["a", "b"] });
        let violations = backward(old.clone(), new.clone());
        assert_eq!(violations.len(), 1);
        assert!(violations[0].description.contains("\"c\""));
        assert!(JsonEngine.check_pair(Direction::Forward, &old, &new).is_empty());
    }

    #[test]
    fn test_closed_reader_rejects_writer_properties() {
        let old = json!({
            "properties": { "a": {}, "b": {} }
        });
        let new = json!({
            "properties": { "a": {} },
            "additionalProperties": false
        });
        let violations = backward(old, new);
        assert_eq!(
            violations.iter().map(|v| v.description.as_str()).collect::<Vec<_>>(),
            vec!["property 'b' is no longer allowed", "additional properties are no longer allowed"]
        );
    }

    #[test]
    fn test_nested_and_bounds() {
        let old = json!({
            "properties": {
                "tags": { "type": "array", "items": { "type": "string", "maxLength": 64 } }
            }
        });
        let new = json!({
            "properties": {
                "tags": { "type": "array", "items": { "type": "string", "maxLength": 32 } }
            }
        });
        let violations = backward(old, new);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].context.as_deref(), Some("properties.tags.items"));
        assert_eq!(violations[0].description, "maxLength lowered from 64 to 32");
    }

    #[test]
    fn test_validate_levels() {
        let refs = References::new();
        assert!(JsonEngine.validate(ValidityLevel::None, "{{{", &refs).unwrap().is_empty());
        assert_eq!(JsonEngine.validate(ValidityLevel::SyntaxOnly, "{{{", &refs).unwrap().len(), 1);
        assert_eq!(JsonEngine.validate(ValidityLevel::SyntaxOnly, "42", &refs).unwrap().len(), 1);

        // syntactically fine, semantically broken
        let bad_type = r#"{"type": "banana"}"#;
        assert!(JsonEngine.validate(ValidityLevel::SyntaxOnly, bad_type, &refs).unwrap().is_empty());
        assert!(!JsonEngine.validate(ValidityLevel::Full, bad_type, &refs).unwrap().is_empty());

        let good = r#"{"type": "object", "properties": {"id": {"type": "string"}}}"#;
        assert!(JsonEngine.validate(ValidityLevel::Full, good, &refs).unwrap().is_empty());
    }

    #[test]
    fn test_reference_resolution() {
        let schema = r##"{
            "definitions": { "id": { "type": "string" } },
            "properties": {
                "a": { "$ref": "#/definitions/id" },
                "b": { "$ref": "#/definitions/missing" },
                "c": { "$ref": "common.json#/id" }
            }
        }"##;
        let violations = JsonEngine.validate(ValidityLevel::Full, schema, &References::new()).unwrap();
        let descriptions: Vec<_> = violations.iter().map(|v| v.description.as_str()).collect();
        assert!(descriptions.contains(&"unresolved reference '#/definitions/missing'"));
        assert!(descriptions.contains(&"external reference 'common.json#/id' is not resolved"));

        let mut refs = References::new();
        refs.insert("common.json".to_string(), r#"{"id": {"type": "string"}}"#.to_string());
        let violations = JsonEngine.validate(ValidityLevel::Full, schema, &refs).unwrap();
        assert!(violations
            .iter()
            .all(|v| !v.description.starts_with("external reference")));
        let missing = violations
            .iter()
            .find(|v| v.description.starts_with("unresolved reference"))
            .unwrap();
        assert_eq!(missing.context.as_deref(), Some("/properties/b"));
    }

    #[test]
    fn test_message_validation() {
        let schema = r#"{
            "type": "object",
            "properties": { "id": { "type": "integer" } },
            "required": ["id"]
        }"#;
        assert!(JsonEngine.validate_message(r#"{"id": 7}"#, schema).unwrap().is_empty());
        assert!(!JsonEngine.validate_message(r#"{"id": "seven"}"#, schema).unwrap().is_empty());
        assert!(!JsonEngine.validate_message("{}", schema).unwrap().is_empty());
        assert_eq!(JsonEngine.validate_message("not json", schema).unwrap().len(), 1);
        assert!(JsonEngine.validate_message("{}", "[]").is_err());
    }
}
