//! Request/response layer over the orchestrators
//!
//! Mirrors the registry's check endpoints without binding to a transport: a
//! request body comes in, a status code plus `{result, info}` goes out.
//!
//! | Outcome | Status |
//! |---|---|
//! | check ran (positive or negative verdict) | 200 |
//! | bad input: unknown format or level, unparseable schema | 400 |
//! | history missing from a compatibility request | 412 |
//! | anything else, including an engine panic | 500 |

use std::panic::{self, AssertUnwindSafe};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::compatibility::CompatibilityOrchestrator;
use crate::config::{CheckerConfig, DefaultsConfig, HistoryEncoding};
use crate::engine::EngineRegistry;
use crate::error::{CheckError, Result};
use crate::level::{CompatibilityLevel, ValidityLevel};
use crate::schema::{normalize_line_endings, Schema, SchemaHistory};
use crate::validity::ValidityOrchestrator;
use crate::verdict::Verdict;

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_PRECONDITION_FAILED: u16 = 412;
pub const STATUS_INTERNAL_ERROR: u16 = 500;

/// Candidate schema in a compatibility request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateMessage {
    #[serde(default)]
    pub id: String,
    pub format: String,
    pub schema: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityRequest {
    pub message: CandidateMessage,
    /// `None` when the caller sent no history at all, which is rejected
    #[serde(default)]
    pub history: Option<Vec<String>>,
    /// Compatibility level; empty means the configured default
    #[serde(default)]
    pub mode: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidityMessage {
    pub schema_type: String,
    pub schema: String,
    /// Validity level; empty means the configured default, unrecognised means NONE
    #[serde(default)]
    pub validity_level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityRequest {
    pub message: ValidityMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResponse {
    pub result: bool,
    pub info: String,
}

/// Status code plus optional body, ready for any transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceResponse {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<CheckResponse>,
}

impl ServiceResponse {
    fn with_body(status: u16, result: bool, info: impl Into<String>) -> Self {
        Self {
            status,
            body: Some(CheckResponse {
                result,
                info: info.into(),
            }),
        }
    }

    /// Map an error to a response: client errors are 4xx, everything else 500
    pub fn from_error(err: &CheckError) -> Self {
        match err {
            CheckError::MissingHistory => {
                warn!(error = %err, "rejecting request");
                Self::with_body(STATUS_PRECONDITION_FAILED, false, err.to_string())
            }
            err if err.is_client_error() => {
                warn!(error = %err, "rejecting request");
                Self::with_body(STATUS_BAD_REQUEST, false, err.to_string())
            }
            err => {
                error!(error = %err, "check failed");
                Self::with_body(STATUS_INTERNAL_ERROR, false, "unknown error")
            }
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Which check a raw request body is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Compatibility,
    Validity,
}

/// Handles compatibility and validity requests
#[derive(Debug, Clone)]
pub struct CheckService {
    compatibility: CompatibilityOrchestrator,
    validity: ValidityOrchestrator,
    default_compatibility: CompatibilityLevel,
    default_validity: ValidityLevel,
    history_encoding: HistoryEncoding,
}

impl Default for CheckService {
    fn default() -> Self {
        Self::from_config(&CheckerConfig::default())
    }
}

impl CheckService {
    pub fn new(registry: EngineRegistry) -> Self {
        let defaults = DefaultsConfig::default();
        Self {
            compatibility: CompatibilityOrchestrator::new(registry.clone()),
            validity: ValidityOrchestrator::new(registry),
            default_compatibility: defaults.compatibility_level,
            default_validity: defaults.validity_level,
            history_encoding: HistoryEncoding::default(),
        }
    }

    pub fn from_config(config: &CheckerConfig) -> Self {
        Self {
            default_compatibility: config.defaults.compatibility_level,
            default_validity: config.defaults.validity_level,
            history_encoding: config.service.history_encoding,
            ..Self::new(config.registry())
        }
    }

    pub fn compatibility_orchestrator(&self) -> &CompatibilityOrchestrator {
        &self.compatibility
    }

    pub fn validity_orchestrator(&self) -> &ValidityOrchestrator {
        &self.validity
    }

    /// Liveness probe: 200 with no body
    pub fn health(&self) -> ServiceResponse {
        ServiceResponse {
            status: STATUS_OK,
            body: None,
        }
    }

    /// Dispatch a raw JSON request body
    pub fn handle(&self, kind: RequestKind, body: &str) -> ServiceResponse {
        match kind {
            RequestKind::Compatibility => match serde_json::from_str::<CompatibilityRequest>(body) {
                Ok(request) => self.compatibility(&request),
                Err(e) => ServiceResponse::from_error(&CheckError::InvalidRequest(e.to_string())),
            },
            RequestKind::Validity => match serde_json::from_str::<ValidityRequest>(body) {
                Ok(request) => self.validity(&request),
                Err(e) => ServiceResponse::from_error(&CheckError::InvalidRequest(e.to_string())),
            },
        }
    }

    pub fn compatibility(&self, request: &CompatibilityRequest) -> ServiceResponse {
        match self.run_compatibility(request) {
            Ok(verdict) if verdict.ok => ServiceResponse::with_body(STATUS_OK, true, "Schema is compatible"),
            Ok(verdict) => ServiceResponse::with_body(
                STATUS_OK,
                false,
                format!("Schema is incompatible: {}", verdict.joined_issues()),
            ),
            Err(err) => ServiceResponse::from_error(&err),
        }
    }

    pub fn validity(&self, request: &ValidityRequest) -> ServiceResponse {
        match self.run_validity(request) {
            Ok(verdict) if verdict.ok => ServiceResponse::with_body(STATUS_OK, true, "Schema is valid"),
            Ok(verdict) => ServiceResponse::with_body(
                STATUS_OK,
                false,
                format!("Schema is invalid: {}", verdict.joined_issues()),
            ),
            Err(err) => ServiceResponse::from_error(&err),
        }
    }

    fn run_compatibility(&self, request: &CompatibilityRequest) -> Result<Verdict> {
        let history = request.history.as_ref().ok_or(CheckError::MissingHistory)?;
        let history = self.decode_history(history)?;
        let level = if request.mode.trim().is_empty() {
            self.default_compatibility
        } else {
            request.mode.parse()?
        };

        let candidate = Schema::new(
            request.message.id.as_str(),
            normalize_format(&request.message.format),
            &request.message.schema,
        );
        guarded("compatibility check", || {
            self.compatibility.check_compatibility(&candidate, &history, level)
        })
    }

    fn run_validity(&self, request: &ValidityRequest) -> Result<Verdict> {
        let message = &request.message;
        let level = if message.validity_level.trim().is_empty() {
            self.default_validity
        } else {
            message.validity_level.parse().unwrap_or_else(|_| {
                warn!(level = %message.validity_level, "unrecognised validity level, using NONE");
                ValidityLevel::None
            })
        };

        let format = normalize_format(&message.schema_type);
        guarded("validity check", || {
            self.validity.check_validity(&format, &message.schema, level)
        })
    }

    fn decode_history(&self, entries: &[String]) -> Result<SchemaHistory> {
        match self.history_encoding {
            HistoryEncoding::Plain => Ok(entries.iter().collect()),
            HistoryEncoding::Base64 => entries
                .iter()
                .enumerate()
                .map(|(index, entry)| -> Result<String> {
                    let bytes = STANDARD.decode(entry.trim()).map_err(|e| {
                        CheckError::InvalidRequest(format!("history[{}] is not valid base64: {}", index, e))
                    })?;
                    let text = String::from_utf8(bytes).map_err(|e| {
                        CheckError::InvalidRequest(format!("history[{}] is not valid UTF-8: {}", index, e))
                    })?;
                    Ok(normalize_line_endings(&text))
                })
                .collect::<Result<Vec<_>>>()
                .map(SchemaHistory::from),
        }
    }
}

/// Run an engine call, turning a panic into [`CheckError::Internal`]
fn guarded<T>(operation: &str, check: impl FnOnce() -> Result<T>) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(check)).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "no panic message".to_string());
        Err(CheckError::Internal(format!("{} panicked: {}", operation, reason)))
    })
}

/// Format tokens arrive in any case and with stray whitespace
fn normalize_format(format: &str) -> String {
    format.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON_V1: &str = r#"{"type": "object", "properties": {"name": {"type": "string"}}}"#;
    const JSON_V2: &str = r#"{"type": "object", "properties": {"name": {"type": "string"}}, "required": ["name"]}"#;

    fn compat_request(format: &str, schema: &str, history: Option<Vec<&str>>, mode: &str) -> CompatibilityRequest {
        CompatibilityRequest {
            message: CandidateMessage {
                id: "s1".to_string(),
                format: format.to_string(),
                schema: schema.to_string(),
            },
            history: history.map(|h| h.into_iter().map(str::to_string).collect()),
            mode: mode.to_string(),
        }
    }

    fn body(response: &ServiceResponse) -> &CheckResponse {
        response.body.as_ref().unwrap()
    }

    #[test]
    fn test_health() {
        let response = CheckService::default().health();
        assert_eq!(response.status, STATUS_OK);
        assert!(response.body.is_none());
    }

    #[test]
    fn test_compatible_and_incompatible() {
        let service = CheckService::default();

        let response = service.compatibility(&compat_request("JSON ", JSON_V1, Some(vec![JSON_V1]), "backward"));
        assert_eq!(response.status, STATUS_OK);
        assert_eq!(body(&response), &CheckResponse { result: true, info: "Schema is compatible".to_string() });

        let response = service.compatibility(&compat_request("json", JSON_V2, Some(vec![JSON_V1]), "BACKWARD"));
        assert_eq!(response.status, STATUS_OK);
        assert!(!body(&response).result);
        assert!(body(&response).info.starts_with("Schema is incompatible: "));
    }

    #[test]
    fn test_missing_history_is_precondition_failure() {
        let response = CheckService::default().compatibility(&compat_request("json", JSON_V1, None, "BACKWARD"));
        assert_eq!(response.status, STATUS_PRECONDITION_FAILED);
        assert_eq!(body(&response).info, "schema history is null");
    }

    #[test]
    fn test_client_errors_are_bad_requests() {
        let service = CheckService::default();
        for request in [
            compat_request("yaml", JSON_V1, Some(vec![]), "BACKWARD"),
            compat_request("json", JSON_V1, Some(vec![]), "SIDEWAYS"),
            compat_request("json", "{broken", Some(vec![JSON_V1]), "FULL"),
        ] {
            let response = service.compatibility(&request);
            assert_eq!(response.status, STATUS_BAD_REQUEST, "{:?}", request);
            assert!(!body(&response).result);
        }

        let response = service.handle(RequestKind::Validity, "{\"message\": 3}");
        assert_eq!(response.status, STATUS_BAD_REQUEST);
    }

    #[test]
    fn test_empty_mode_is_none_by_default() {
        let service = CheckService::default();

        // NONE accepts even an unknown format
        let response = service.compatibility(&compat_request("yaml", "", Some(vec![]), ""));
        assert_eq!(response.status, STATUS_OK);
        assert!(body(&response).result);

        let response = service.compatibility(&compat_request("json", JSON_V2, Some(vec![JSON_V1]), ""));
        assert!(body(&response).result);
    }

    #[test]
    fn test_empty_mode_uses_configured_default() {
        let mut config = CheckerConfig::default();
        config.defaults.compatibility_level = CompatibilityLevel::Backward;
        let service = CheckService::from_config(&config);

        let response = service.compatibility(&compat_request("json", JSON_V2, Some(vec![JSON_V1]), " "));
        assert_eq!(response.status, STATUS_OK);
        assert!(!body(&response).result);
    }

    #[test]
    fn test_engine_panic_is_internal_error() {
        let err = guarded("compatibility check", || -> Result<Verdict> { panic!("engine bug") }).unwrap_err();
        assert!(matches!(err, CheckError::Internal(ref reason) if reason == "compatibility check panicked: engine bug"));
        assert_eq!(err.kind(), crate::error::FailureKind::InternalFault);

        let response = ServiceResponse::from_error(&err);
        assert_eq!(response.status, STATUS_INTERNAL_ERROR);
        assert_eq!(body(&response), &CheckResponse { result: false, info: "unknown error".to_string() });

        let owned = guarded("validity check", || -> Result<Verdict> { panic!("{} failed", "xsd") }).unwrap_err();
        assert_eq!(owned.to_string(), "internal error: validity check panicked: xsd failed");

        assert_eq!(guarded("validity check", || Ok(7)).unwrap(), 7);
    }

    #[test]
    fn test_base64_history() {
        let mut config = CheckerConfig::default();
        config.service.history_encoding = HistoryEncoding::Base64;
        let service = CheckService::from_config(&config);

        let encoded = STANDARD.encode(JSON_V1);
        let response = service.compatibility(&compat_request("json", JSON_V1, Some(vec![encoded.as_str()]), "FULL"));
        assert_eq!(response.status, STATUS_OK);
        assert!(body(&response).result);

        let response = service.compatibility(&compat_request("json", JSON_V1, Some(vec!["%%%"]), "FULL"));
        assert_eq!(response.status, STATUS_BAD_REQUEST);
        assert!(body(&response).info.contains("history[0]"));
    }

    #[test]
    fn test_validity_requests() {
        let service = CheckService::default();

        let response = service.handle(
            RequestKind::Validity,
            r#"{"message": {"schemaType": "avro", "schema": "\"string\"", "validityLevel": "full"}}"#,
        );
        assert_eq!(body(&response), &CheckResponse { result: true, info: "Schema is valid".to_string() });

        let response = service.handle(
            RequestKind::Validity,
            r#"{"message": {"schemaType": "avro", "schema": "{\"type\": \"nope\"}", "validityLevel": "syntax-only"}}"#,
        );
        assert!(body(&response).result);

        let response = service.handle(
            RequestKind::Validity,
            r#"{"message": {"schemaType": "avro", "schema": "{\"type\": \"nope\"}", "validityLevel": "FULL"}}"#,
        );
        assert_eq!(response.status, STATUS_OK);
        assert!(body(&response).info.starts_with("Schema is invalid: "));

        // empty and unrecognised levels both mean NONE
        for level in ["", "whatever"] {
            let request = ValidityRequest {
                message: ValidityMessage {
                    schema_type: "avro".to_string(),
                    schema: "{\"type\": \"nope\"}".to_string(),
                    validity_level: level.to_string(),
                },
            };
            let response = service.validity(&request);
            assert_eq!(response.status, STATUS_OK, "{:?}", level);
            assert_eq!(body(&response).info, "Schema is valid");
        }
    }

    #[test]
    fn test_response_serialization() {
        let json = serde_json::to_value(CheckService::default().health()).unwrap();
        assert_eq!(json, serde_json::json!({"status": 200}));
    }
}
