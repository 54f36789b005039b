//! Schema Gate
//!
//! Compatibility and validity checks for a schema registry's governance gate.
//! A proposed schema is compared against the versions already registered under
//! a compatibility level, and standalone schemas are checked for syntactic and
//! semantic validity.
//!
//! ## Features
//!
//! - **Formats**: JSON Schema, Avro, Protocol Buffers, XML Schema and CSV Schema
//! - **Levels**: `NONE`, `BACKWARD`, `FORWARD`, `FULL` and their `_TRANSITIVE` variants
//! - **Verdicts**: every check returns `ok` plus ordered, human-readable issues
//! - **Service layer**: transport-neutral request handling with registry status codes
//!
//! ## Architecture
//!
//! ```text
//! CheckService ──► CompatibilityOrchestrator ──┐
//!              └─► ValidityOrchestrator ───────┤
//!                                              ▼
//!                                       EngineRegistry
//!                          json │ avro │ protobuf │ xml │ csv
//! ```

pub mod compatibility;
pub mod config;
pub mod engine;
pub mod error;
pub mod level;
pub mod schema;
pub mod service;
pub mod validity;
pub mod verdict;

pub use compatibility::CompatibilityOrchestrator;
pub use config::CheckerConfig;
pub use engine::{CheckerEngine, Engine, EngineRegistry, References};
pub use error::{CheckError, FailureKind, Result};
pub use level::{CompatibilityLevel, Direction, ValidityLevel};
pub use schema::{FormatId, Schema, SchemaHistory};
pub use service::{CheckService, ServiceResponse};
pub use validity::ValidityOrchestrator;
pub use verdict::{aggregate, Verdict, Violation};
