//! Configuration management for documents
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (documents.toml)
//! - Environment variables (DOCUMENTS__*)
//!
//! ## Example config file (documents.toml):
//! ```toml
//! [schema]
//! strict = true
//!
//! [validation]
//! quiet = false
//!
//! [logging]
//! filter = "familiar_documents=debug"
//! ansi = false
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Defaults for schemas built with `Schema::builder_with`
    #[serde(default)]
    pub schema: SchemaDefaults,

    /// Validation settings
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Schema defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDefaults {
    /// Ignore unknown keys on populate
    #[serde(default = "default_true")]
    pub strict: bool,
}

/// Validation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Record errors without failing `validate`
    #[serde(default)]
    pub quiet: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, used when `RUST_LOG` is not set
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Colored output
    #[serde(default = "default_true")]
    pub ansi: bool,
}

fn default_true() -> bool {
    true
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for SchemaDefaults {
    fn default() -> Self {
        Self { strict: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            ansi: true,
        }
    }
}

impl EngineConfig {
    /// Load configuration from default locations
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a required file on top of the default locations
    pub fn load_from(config_path: Option<&str>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "documents.toml",
            ".documents.toml",
            "config/documents.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "documents") {
            let xdg_config = config_dir.config_dir().join("documents.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // DOCUMENTS__VALIDATION__QUIET=true
        builder = builder.add_source(
            Environment::with_prefix("DOCUMENTS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
