//! Configuration file parsing.
//!
//! Reads `tabform.toml` configuration files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub packages: PackagesConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub reformat: ReformatConfig,

    #[serde(default)]
    pub cli: CliConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PackagesConfig {
    /// Package directories to process, in declaration order.
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            paths: vec![PathBuf::from("data")],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Export formats: "json", "natural-json", "xml", "sql", "msgpack"
    #[serde(default)]
    pub formats: Vec<String>,

    /// Output directory for exported files
    #[serde(default = "default_export_dir")]
    pub dir: PathBuf,

    /// Sub-serializer for tables inside SQL literals: "canonical" or
    /// "typed_json"
    #[serde(default = "default_table_sql")]
    pub table_sql: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            formats: vec![],
            dir: default_export_dir(),
            table_sql: default_table_sql(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReformatConfig {
    /// Write reformatted TSV back over the source files.
    #[serde(default = "default_write_back")]
    pub write_back: bool,
}

impl Default for ReformatConfig {
    fn default() -> Self {
        Self {
            write_back: default_write_back(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CliConfig {
    /// Exit non-zero if diagnostics meet or exceed this severity
    #[serde(default = "default_fail_on")]
    pub fail_on: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            fail_on: default_fail_on(),
        }
    }
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("export")
}

fn default_table_sql() -> String {
    "canonical".to_string()
}

fn default_write_back() -> bool {
    true
}

fn default_fail_on() -> String {
    "error".to_string()
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for format in &self.output.formats {
            match format.as_str() {
                "json" | "natural-json" | "xml" | "sql" | "msgpack" => {}
                other => {
                    return Err(ConfigError::Validation(format!(
                        "unknown export format '{other}'"
                    )));
                }
            }
        }
        match self.cli.fail_on.as_str() {
            "error" | "warning" => Ok(()),
            other => Err(ConfigError::Validation(format!(
                "unknown fail_on severity '{other}'"
            ))),
        }
    }
}
