//! Configuration loading utilities

use crate::Config;
use std::env;
use std::path::{Path, PathBuf};
use tally_common::TallyError;
use thiserror::Error;
use tracing::{debug, info};

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error when reading configuration file
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML configuration: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("Failed to parse TOML configuration: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Unrecognised file extension
    #[error("Unsupported configuration format for '{0}', expected .yaml, .yml or .toml")]
    UnsupportedFormat(PathBuf),

    /// Environment variable parsing error
    #[error("Failed to parse environment variable '{var}': {source}")]
    EnvParseError {
        var: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {0}")]
    ValidationError(#[source] TallyError),
}

impl From<ConfigError> for TallyError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ValidationError(inner) => inner,
            other => TallyError::config_with_source(other.to_string(), other),
        }
    }
}

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML document
    Yaml,
    /// TOML document
    Toml,
}

impl ConfigFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Configuration loader for the engine
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file with environment variable overrides
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), ?format, "Read configuration file");

        let mut config = Self::parse(&content, format)?;
        Self::apply_overrides(&mut config, |var| env::var(var).ok())?;
        config.validate().map_err(ConfigError::ValidationError)?;

        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Load configuration from an optional file, falling back to defaults
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        if let Some(path) = path {
            return Self::load_file(path);
        }

        if let Ok(path) = env::var("TALLY_CONFIG_PATH") {
            return Self::load_file(path);
        }

        let mut config = Config::default();
        Self::apply_overrides(&mut config, |var| env::var(var).ok())?;
        config.validate().map_err(ConfigError::ValidationError)?;
        debug!("No configuration file given, using defaults");
        Ok(config)
    }

    /// Parse configuration text in the given format without validating it
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Config, ConfigError> {
        let config = match format {
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Toml => toml::from_str(content)?,
        };
        Ok(config)
    }

    /// Apply `TALLY_*` overrides read through `lookup`
    pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("TALLY_WINDOW_DAYS") {
            config.metrics.window_days = parse_var("TALLY_WINDOW_DAYS", &value)?;
        }

        if let Some(value) = lookup("TALLY_RECENT_EVENTS_LIMIT") {
            config.metrics.recent_events_limit = parse_var("TALLY_RECENT_EVENTS_LIMIT", &value)?;
        }

        if let Some(value) = lookup("TALLY_MAX_COMPARISON_ENTITIES") {
            config.comparison.max_entities = parse_var("TALLY_MAX_COMPARISON_ENTITIES", &value)?;
        }

        if let Some(value) = lookup("TALLY_FETCH_TIMEOUT_MS") {
            config.fetch.timeout_ms = parse_var("TALLY_FETCH_TIMEOUT_MS", &value)?;
        }

        if let Some(value) = lookup("TALLY_FETCH_MAX_RETRIES") {
            config.fetch.max_retries = parse_var("TALLY_FETCH_MAX_RETRIES", &value)?;
        }

        if let Some(level) = lookup("TALLY_LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(())
    }
}

fn parse_var<T>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::EnvParseError {
        var: var.to_string(),
        source: Box::new(e),
    })
}
