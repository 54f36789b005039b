//! Schema types and structures

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CheckError;
use crate::level::HistoryScope;

/// Schema format handled by one checker engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatId {
    /// JSON Schema documents
    Json,
    /// AVRO schemas
    Avro,
    /// Protocol Buffers `.proto` definitions
    Protobuf,
    /// XML Schema (XSD)
    #[serde(alias = "xsd")]
    Xml,
    /// CSV Schema language
    Csv,
}

impl FormatId {
    /// Every format the gate knows about
    pub const ALL: [FormatId; 5] = [
        FormatId::Json,
        FormatId::Avro,
        FormatId::Protobuf,
        FormatId::Xml,
        FormatId::Csv,
    ];

    /// Canonical token for this format
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatId::Json => "json",
            FormatId::Avro => "avro",
            FormatId::Protobuf => "protobuf",
            FormatId::Xml => "xml",
            FormatId::Csv => "csv",
        }
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatId {
    type Err = CheckError;

    /// Tokens are case-sensitive; `xsd` is accepted as an alias of `xml`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(FormatId::Json),
            "avro" => Ok(FormatId::Avro),
            "protobuf" => Ok(FormatId::Protobuf),
            "xml" | "xsd" => Ok(FormatId::Xml),
            "csv" => Ok(FormatId::Csv),
            other => Err(CheckError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Canonicalize line endings (CRLF -> LF) before any engine sees the content
pub fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n")
}

/// A candidate schema as received at the boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawSchema")]
pub struct Schema {
    /// Opaque identifier, may be empty
    pub id: String,
    /// Format token as sent by the caller (resolved by the engine registry)
    pub format: String,
    /// Raw schema text, line endings already canonicalized
    pub content: String,
}

impl Schema {
    /// Create a new schema, normalizing its line endings
    pub fn new(id: impl Into<String>, format: impl Into<String>, content: &str) -> Self {
        Self {
            id: id.into(),
            format: format.into(),
            content: normalize_line_endings(content),
        }
    }
}

/// Wire shape of [`Schema`]; deserialization goes through [`Schema::new`]
#[derive(Deserialize)]
struct RawSchema {
    #[serde(default)]
    id: String,
    format: String,
    content: String,
}

impl From<RawSchema> for Schema {
    fn from(raw: RawSchema) -> Self {
        Schema::new(raw.id, raw.format, &raw.content)
    }
}

/// Previously registered schema versions, oldest first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct SchemaHistory(Vec<String>);

impl SchemaHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a newer version
    pub fn push(&mut self, content: &str) {
        self.0.push(normalize_line_endings(content));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The most recent version, if any
    pub fn latest(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// All versions, oldest first
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Entries a check with the given scope compares against, paired with their
    /// position in the full history.
    pub fn in_scope(&self, scope: HistoryScope) -> Vec<(usize, &str)> {
        match scope {
            HistoryScope::Latest => match self.0.len() {
                0 => Vec::new(),
                n => vec![(n - 1, self.0[n - 1].as_str())],
            },
            HistoryScope::All => self.0.iter().map(String::as_str).enumerate().collect(),
        }
    }
}

impl From<Vec<String>> for SchemaHistory {
    fn from(entries: Vec<String>) -> Self {
        Self(entries.iter().map(|e| normalize_line_endings(e)).collect())
    }
}

impl From<SchemaHistory> for Vec<String> {
    fn from(history: SchemaHistory) -> Self {
        history.0
    }
}

impl<S: AsRef<str>> FromIterator<S> for SchemaHistory {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(|e| normalize_line_endings(e.as_ref())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_tokens() {
        assert_eq!("json".parse::<FormatId>().unwrap(), FormatId::Json);
        assert_eq!("xsd".parse::<FormatId>().unwrap(), FormatId::Xml);
        assert_eq!("xml".parse::<FormatId>().unwrap(), FormatId::Xml);
        assert!("JSON".parse::<FormatId>().is_err());
        assert!(matches!(
            "unknown-format".parse::<FormatId>(),
            Err(CheckError::UnsupportedFormat(f)) if f == "unknown-format"
        ));
    }

    #[test]
    fn test_crlf_normalized_once() {
        let schema = Schema::new("1", "json", "{\r\n  \"type\": \"object\"\r\n}");
        assert_eq!(schema.content, "{\n  \"type\": \"object\"\n}");

        let history: SchemaHistory = vec!["a\r\nb".to_string()].into();
        assert_eq!(history.latest(), Some("a\nb"));
    }

    #[test]
    fn test_deserialized_schema_is_normalized() {
        let schema: Schema =
            serde_json::from_str(r#"{"format": "csv", "content": "version 1.0\r\nid: notEmpty\r\n"}"#).unwrap();
        assert_eq!(schema.content, "version 1.0\nid: notEmpty\n");
        assert_eq!(schema.id, "");
        assert!(serde_json::from_str::<Schema>(r#"{"id": "x", "content": ""}"#).is_err());
    }

    #[test]
    fn test_history_scope() {
        let history: SchemaHistory = ["v1", "v2", "v3"].into_iter().collect();
        assert_eq!(history.in_scope(HistoryScope::Latest), vec![(2, "v3")]);
        assert_eq!(
            history.in_scope(HistoryScope::All),
            vec![(0, "v1"), (1, "v2"), (2, "v3")]
        );
        assert!(SchemaHistory::new().in_scope(HistoryScope::Latest).is_empty());
    }
}
