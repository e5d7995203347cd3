//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `knxha.toml` in the working directory unless a path is given.
//! Every field has a sensible default so the file is optional. Environment
//! variables take precedence over file values.

use std::path::{Path, PathBuf};

use knxha_adapter_knxproj::ScannerConfig;
use knxha_domain::snapshot::ClassifyOptions;
use serde::Deserialize;

const DEFAULT_FILE: &str = "knxha.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Archive scanner limits and pacing.
    pub scanner: ScannerConfig,
    /// Classification options.
    pub classify: ClassifyOptions,
    /// Where output files are written.
    pub output: OutputConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Output location.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `path`, or from `knxha.toml` if present,
    /// then apply environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly given file is missing, if the TOML
    /// is malformed, or if validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => toml::from_str(&std::fs::read_to_string(path)?)?,
            None => Self::from_file(Path::new(DEFAULT_FILE))?,
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("KNXHA_OUTPUT_DIR") {
            self.output.dir = PathBuf::from(val);
        }
        if let Some(val) = var("KNXHA_DROP_RESERVE")
            && let Some(flag) = parse_flag(&val)
        {
            self.classify.drop_reserve = flag;
        }
        if let Some(val) = var("KNXHA_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.scanner.prescan_bytes == 0 {
            return Err(ConfigError::Validation(
                "scanner.prescan_bytes must be non-zero".to_string(),
            ));
        }
        if self.scanner.yield_every == 0 {
            return Err(ConfigError::Validation(
                "scanner.yield_every must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "knxha=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
