//! Orchestration Tests
//!
//! Drives the compatibility and validity orchestrators through the public API,
//! across every registered format.

use rstest::rstest;
use schema_gate::{
    CheckError, CompatibilityLevel, CompatibilityOrchestrator, EngineRegistry, FailureKind, FormatId, Schema,
    SchemaHistory, ValidityLevel, ValidityOrchestrator, Verdict,
};

// ============================================================================
// Fixtures
// ============================================================================

const JSON_V1: &str = r#"{"type": "object", "properties": {"id": {"type": "string"}}}"#;
const JSON_V2: &str =
    r#"{"type": "object", "properties": {"id": {"type": "string"}, "age": {"type": "integer"}}, "required": ["age"]}"#;

const AVRO_V1: &str = r#"{"type": "record", "name": "User", "fields": [{"name": "name", "type": "string"}]}"#;
const AVRO_V2: &str = r#"{"type": "record", "name": "User", "fields": [
    {"name": "name", "type": "string"},
    {"name": "age", "type": "int"}
]}"#;

const PROTO_V1: &str = r#"
syntax = "proto3";
package shop;

message Order {
    string id = 1;
    int32 quantity = 2;
}
"#;
const PROTO_V2: &str = r#"
syntax = "proto3";
package shop;

message Order {
    string id = 1;
    string quantity = 2;
}
"#;

const XSD_V1: &str = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="order">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="id" type="xs:string"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;
const XSD_V2: &str = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="order">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="id" type="xs:string"/>
        <xs:element name="total" type="xs:decimal"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

const CSV_V1: &str = "version 1.0\n@totalColumns 2\nid: positiveInteger\nname: notEmpty\n";
const CSV_V2: &str = "version 1.0\n@totalColumns 3\nid: positiveInteger\nname: notEmpty\nemail: notEmpty\n";

fn sample(format: &str) -> (&'static str, &'static str) {
    match format {
        "json" => (JSON_V1, JSON_V2),
        "avro" => (AVRO_V1, AVRO_V2),
        "protobuf" => (PROTO_V1, PROTO_V2),
        "xml" => (XSD_V1, XSD_V2),
        "csv" => (CSV_V1, CSV_V2),
        other => panic!("no sample for {}", other),
    }
}

fn check(format: &str, candidate: &str, history: &[&str], level: CompatibilityLevel) -> Result<Verdict, CheckError> {
    let history: SchemaHistory = history.iter().collect();
    CompatibilityOrchestrator::default().check_compatibility(&Schema::new("subject", format, candidate), &history, level)
}

// ============================================================================
// Compatibility
// ============================================================================

#[rstest]
#[case("json")]
#[case("avro")]
#[case("protobuf")]
#[case("xml")]
#[case("csv")]
#[case("yaml")]
fn test_none_level_always_passes(#[case] format: &str) {
    let verdict = check(format, "}{ not a schema", &["also broken"], CompatibilityLevel::None).unwrap();
    assert!(verdict.ok);
    assert!(verdict.issues.is_empty());
}

#[rstest]
#[case("unknown-format", CompatibilityLevel::Backward)]
#[case("unknown-format", CompatibilityLevel::ForwardTransitive)]
#[case("yaml", CompatibilityLevel::Backward)]
#[case("thrift", CompatibilityLevel::FullTransitive)]
#[case("JSON", CompatibilityLevel::Forward)]
#[case("", CompatibilityLevel::Full)]
fn test_unregistered_format_is_unsupported(#[case] format: &str, #[case] level: CompatibilityLevel) {
    let err = check(format, JSON_V1, &[JSON_V1], level).unwrap_err();
    assert!(matches!(err, CheckError::UnsupportedFormat(_)), "{:?}", err);
}

#[rstest]
#[case("json")]
#[case("avro")]
#[case("protobuf")]
#[case("xml")]
#[case("csv")]
fn test_unchanged_schema_is_fully_compatible(#[case] format: &str) {
    let (v1, _) = sample(format);
    for level in [
        CompatibilityLevel::Backward,
        CompatibilityLevel::Forward,
        CompatibilityLevel::FullTransitive,
    ] {
        let verdict = check(format, v1, &[v1, v1], level).unwrap();
        assert!(verdict.ok, "{} {}: {:?}", format, level, verdict.issues);
    }
}

#[rstest]
#[case("json")]
#[case("avro")]
#[case("protobuf")]
#[case("xml")]
#[case("csv")]
fn test_empty_history_is_compatible(#[case] format: &str) {
    let (_, v2) = sample(format);
    let verdict = check(format, v2, &[], CompatibilityLevel::FullTransitive).unwrap();
    assert!(verdict.ok);
}

#[rstest]
#[case("json")]
#[case("avro")]
#[case("protobuf")]
#[case("xml")]
#[case("csv")]
fn test_breaking_change_is_rejected_backward(#[case] format: &str) {
    let (v1, v2) = sample(format);
    let verdict = check(format, v2, &[v1], CompatibilityLevel::Backward).unwrap();
    assert!(!verdict.ok, "{} change should break BACKWARD", format);
    assert!(!verdict.issues.is_empty());
    assert_eq!(verdict.failure_kind(), Some(FailureKind::IncompatibleChange));
}

#[rstest]
#[case("json")]
#[case("avro")]
#[case("protobuf")]
#[case("xml")]
#[case("csv")]
fn test_transitive_matches_latest_only_for_single_entry(#[case] format: &str) {
    let (v1, v2) = sample(format);
    for (plain, transitive) in [
        (CompatibilityLevel::Backward, CompatibilityLevel::BackwardTransitive),
        (CompatibilityLevel::Forward, CompatibilityLevel::ForwardTransitive),
        (CompatibilityLevel::Full, CompatibilityLevel::FullTransitive),
    ] {
        assert_eq!(
            check(format, v2, &[v1], plain).unwrap(),
            check(format, v2, &[v1], transitive).unwrap(),
            "{} {} vs {}",
            format,
            plain,
            transitive
        );
    }
}

#[rstest]
#[case("json")]
#[case("avro")]
#[case("protobuf")]
#[case("xml")]
#[case("csv")]
fn test_verdict_is_consistent_and_repeatable(#[case] format: &str) {
    let (v1, v2) = sample(format);
    let first = check(format, v2, &[v1], CompatibilityLevel::Full).unwrap();
    let second = check(format, v2, &[v1], CompatibilityLevel::Full).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.ok, first.issues.is_empty());
}

#[test]
fn test_transitive_level_reaches_older_entries() {
    // v2 already required `age`; v1 did not have it
    let history = [JSON_V1, JSON_V2];

    let latest = check("json", JSON_V2, &history, CompatibilityLevel::Backward).unwrap();
    assert!(latest.ok);

    let transitive = check("json", JSON_V2, &history, CompatibilityLevel::BackwardTransitive).unwrap();
    assert!(!transitive.ok);
    assert_eq!(transitive.issues.len(), 1);
    assert!(transitive.issues[0].contains("'age'"), "{:?}", transitive.issues);
}

#[test]
fn test_full_transitive_reports_oldest_entry_first_backward_before_forward() {
    let candidate = "version 1.0\n@totalColumns 2\nid: positiveInteger length(1,5)\nname: notEmpty\n";
    let history = [
        // candidate adds a rule: only new readers are stricter
        "version 1.0\n@totalColumns 2\nid: positiveInteger\nname: notEmpty\n",
        // extra column: breaks both directions
        "version 1.0\n@totalColumns 3\nid: positiveInteger length(1,5)\nname: notEmpty\nemail: notEmpty\n",
        // candidate drops a rule: only old readers are stricter
        "version 1.0\n@totalColumns 2\nid: positiveInteger length(1,5) notEmpty\nname: notEmpty\n",
    ];

    let verdict = check("csv", candidate, &history, CompatibilityLevel::FullTransitive).unwrap();
    assert_eq!(
        verdict.issues,
        vec![
            "rule length(1,5) is not guaranteed by the previous definition at column 'id'",
            "column count changed from 3 to 2 at history[1]",
            "column count changed from 2 to 3 at history[1]",
            "rule notEmpty is not guaranteed by the previous definition at column 'id'",
        ]
    );

    let latest = check("csv", candidate, &history, CompatibilityLevel::Full).unwrap();
    assert_eq!(latest.issues, vec!["rule notEmpty is not guaranteed by the previous definition at column 'id'"]);
}

#[test]
fn test_deserialized_crlf_candidate_matches_lf_history() {
    let candidate: Schema = serde_json::from_str(&serde_json::json!({
        "id": "roster",
        "format": "csv",
        "content": CSV_V1.replace('\n', "\r\n"),
    })
    .to_string())
    .unwrap();
    assert!(!candidate.content.contains('\r'));

    let history: SchemaHistory = [CSV_V1].iter().collect();
    let verdict = CompatibilityOrchestrator::default()
        .check_compatibility(&candidate, &history, CompatibilityLevel::FullTransitive)
        .unwrap();
    assert!(verdict.ok, "{:?}", verdict.issues);
}

#[test]
fn test_avro_required_field_without_default() {
    let verdict = check("avro", AVRO_V2, &[AVRO_V1], CompatibilityLevel::Backward).unwrap();
    assert!(!verdict.ok);
    assert!(verdict.issues[0].contains("'age'"));

    // old readers skip the new field
    let forward = check("avro", AVRO_V2, &[AVRO_V1], CompatibilityLevel::Forward).unwrap();
    assert!(forward.ok);
}

#[test]
fn test_unparseable_candidate_is_an_error() {
    let err = check("avro", "{\"type\": \"record\"", &[AVRO_V1], CompatibilityLevel::Backward).unwrap_err();
    match err {
        CheckError::SchemaParse { location, .. } => assert_eq!(location, "candidate"),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_unparseable_history_entry_names_its_index() {
    let err = check("json", JSON_V1, &[JSON_V1, "{oops"], CompatibilityLevel::BackwardTransitive).unwrap_err();
    match err {
        CheckError::SchemaParse { location, .. } => assert_eq!(location, "history[1]"),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_history_is_left_untouched() {
    let history: SchemaHistory = [AVRO_V1].iter().collect();
    let before = history.clone();
    let orchestrator = CompatibilityOrchestrator::default();
    orchestrator
        .check_compatibility(&Schema::new("user", "avro", AVRO_V2), &history, CompatibilityLevel::Full)
        .unwrap();
    assert_eq!(history, before);
}

#[test]
fn test_registry_subset_rejects_disabled_formats() {
    let orchestrator = CompatibilityOrchestrator::new(EngineRegistry::with_formats([FormatId::Json]));
    let history: SchemaHistory = [JSON_V1].iter().collect();

    assert!(orchestrator
        .check_compatibility(&Schema::new("a", "json", JSON_V1), &history, CompatibilityLevel::Full)
        .is_ok());
    assert!(matches!(
        orchestrator.check_compatibility(&Schema::new("b", "avro", AVRO_V1), &history, CompatibilityLevel::Full),
        Err(CheckError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_shared_orchestrator_across_threads() {
    let orchestrator = CompatibilityOrchestrator::default();
    let history: SchemaHistory = [AVRO_V1].iter().collect();
    let candidate = Schema::new("user", "avro", AVRO_V2);
    let expected = orchestrator
        .check_compatibility(&candidate, &history, CompatibilityLevel::FullTransitive)
        .unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    orchestrator
                        .check_compatibility(&candidate, &history, CompatibilityLevel::FullTransitive)
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

// ============================================================================
// Validity
// ============================================================================

#[rstest]
#[case("json")]
#[case("avro")]
#[case("protobuf")]
#[case("xml")]
#[case("csv")]
fn test_valid_schemas_pass_every_level(#[case] format: &str) {
    let (v1, v2) = sample(format);
    let orchestrator = ValidityOrchestrator::default();
    for level in [ValidityLevel::None, ValidityLevel::SyntaxOnly, ValidityLevel::Full] {
        for schema in [v1, v2] {
            let verdict = orchestrator.check_validity(format, schema, level).unwrap();
            assert!(verdict.ok, "{} {}: {:?}", format, level, verdict.issues);
        }
    }
}

#[rstest]
#[case("json", "{\"type\": ")]
#[case("avro", "{\"type\": \"record\"")]
#[case("protobuf", "message Order { string id = ; }")]
#[case("xml", "<xs:schema")]
#[case("csv", "id: notEmpty")]
fn test_syntax_errors_fail_validation(#[case] format: &str, #[case] schema: &str) {
    let orchestrator = ValidityOrchestrator::default();
    for level in [ValidityLevel::SyntaxOnly, ValidityLevel::Full] {
        let verdict = orchestrator.check_validity(format, schema, level).unwrap();
        assert!(!verdict.ok, "{} should reject {:?}", format, schema);
        assert_eq!(verdict.failure_kind(), Some(FailureKind::ValidationFailed));
    }
    assert!(orchestrator.check_validity(format, schema, ValidityLevel::None).unwrap().ok);
}

#[test]
fn test_unknown_format_validity() {
    let orchestrator = ValidityOrchestrator::default();
    assert!(matches!(
        orchestrator.check_validity("yaml", JSON_V1, ValidityLevel::Full),
        Err(CheckError::UnsupportedFormat(_))
    ));
    assert!(orchestrator.check_validity("yaml", JSON_V1, ValidityLevel::None).unwrap().ok);
}

// ============================================================================
// Message validation
// ============================================================================

#[test]
fn test_csv_data_with_wrong_column_count() {
    let orchestrator = ValidityOrchestrator::default();

    let good = orchestrator.validate_message("csv", "id,name\n1,Ana\n2,Ivo\n", CSV_V1).unwrap();
    assert!(good.ok, "{:?}", good.issues);

    let bad = orchestrator.validate_message("csv", "id,name\n1,Ana\n2\n", CSV_V1).unwrap();
    assert!(!bad.ok);
    assert_eq!(bad.issues, vec!["expected 2 columns, found 1 at row 2"]);
}

#[test]
fn test_json_message_validation() {
    let orchestrator = ValidityOrchestrator::default();
    assert!(orchestrator.validate_message("json", r#"{"id": "a-1"}"#, JSON_V1).unwrap().ok);
    assert!(!orchestrator.validate_message("json", r#"{"id": 7}"#, JSON_V1).unwrap().ok);
}
