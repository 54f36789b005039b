//! Configuration for the schema gate
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (schema-gate.toml)
//! - Environment variables (SCHEMA_GATE__*)
//!
//! ## Example config file (schema-gate.toml):
//! ```toml
//! [defaults]
//! compatibility_level = "NONE"
//! validity_level = "NONE"
//!
//! [engines]
//! enabled = ["json", "avro", "protobuf", "xml", "csv"]
//!
//! [service]
//! history_encoding = "plain"
//!
//! [logging]
//! filter = "info"
//! json = false
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::engine::EngineRegistry;
use crate::level::{CompatibilityLevel, ValidityLevel};
use crate::schema::FormatId;

/// Main configuration for the schema gate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckerConfig {
    /// Levels applied when a request leaves them out
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Which format engines are served
    #[serde(default)]
    pub engines: EnginesConfig,

    /// Request handling
    #[serde(default)]
    pub service: ServiceConfig,

    /// Log output for the binaries
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Levels for requests with an empty mode; NONE unless an operator tightens them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_compatibility_level")]
    pub compatibility_level: CompatibilityLevel,

    #[serde(default = "default_validity_level")]
    pub validity_level: ValidityLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnginesConfig {
    /// Formats with a registered engine; anything else is unsupported
    #[serde(default = "default_enabled")]
    pub enabled: Vec<FormatId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// How history entries arrive in service requests
    #[serde(default)]
    pub history_encoding: HistoryEncoding,
}

/// Encoding of history entries in service requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HistoryEncoding {
    #[default]
    Plain,
    Base64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, overridden by RUST_LOG
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_compatibility_level() -> CompatibilityLevel {
    CompatibilityLevel::None
}

fn default_validity_level() -> ValidityLevel {
    ValidityLevel::None
}

fn default_enabled() -> Vec<FormatId> {
    FormatId::ALL.to_vec()
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            compatibility_level: default_compatibility_level(),
            validity_level: default_validity_level(),
        }
    }
}

impl Default for EnginesConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

impl CheckerConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a required file at `config_path`
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "schema-gate.toml",
            ".schema-gate.toml",
            "config/schema-gate.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "schema-gate", "schema-gate") {
            let xdg_config = config_dir.config_dir().join("schema-gate.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // SCHEMA_GATE__SECTION__KEY, e.g. SCHEMA_GATE__ENGINES__ENABLED=json,avro
        builder = builder.add_source(
            Environment::with_prefix("SCHEMA_GATE")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("engines.enabled")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Engine registry exposing only the enabled formats
    pub fn registry(&self) -> EngineRegistry {
        EngineRegistry::with_formats(self.engines.enabled.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = CheckerConfig::default();
        assert_eq!(config.defaults.compatibility_level, CompatibilityLevel::None);
        assert_eq!(config.defaults.validity_level, ValidityLevel::None);
        assert_eq!(config.engines.enabled.len(), 5);
        assert_eq!(config.service.history_encoding, HistoryEncoding::Plain);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_serialize_config() {
        let config = CheckerConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[defaults]"));
        assert!(toml_str.contains("compatibility_level = \"NONE\""));
        assert!(toml_str.contains("[engines]"));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gate.toml");
        let path = path.to_str().unwrap();

        let mut config = CheckerConfig::default();
        config.defaults.compatibility_level = CompatibilityLevel::FullTransitive;
        config.engines.enabled = vec![FormatId::Json, FormatId::Avro];
        config.service.history_encoding = HistoryEncoding::Base64;
        config.save(path).unwrap();

        let loaded = CheckerConfig::load_from(Some(path)).unwrap();
        assert_eq!(loaded.defaults.compatibility_level, CompatibilityLevel::FullTransitive);
        assert_eq!(loaded.engines.enabled, vec![FormatId::Json, FormatId::Avro]);
        assert_eq!(loaded.service.history_encoding, HistoryEncoding::Base64);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[defaults]\nvalidity_level = \"syntax-only\"\n").unwrap();

        let loaded = CheckerConfig::load_from(path.to_str()).unwrap();
        assert_eq!(loaded.defaults.validity_level, ValidityLevel::SyntaxOnly);
        assert_eq!(loaded.defaults.compatibility_level, CompatibilityLevel::None);
        assert_eq!(loaded.engines.enabled.len(), 5);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        assert!(CheckerConfig::load_from(Some("/nonexistent/schema-gate.toml")).is_err());
    }

    #[test]
    fn test_registry_follows_enabled_formats() {
        let mut config = CheckerConfig::default();
        config.engines.enabled = vec![FormatId::Csv];
        let registry = config.registry();
        assert!(registry.lookup("csv").is_ok());
        assert!(registry.lookup("json").is_err());
    }
}
