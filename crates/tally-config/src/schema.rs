//! Configuration schema definitions using serde.

use serde::{Deserialize, Serialize};
use tally_common::{LoggingConfig, Result};

/// Main configuration structure for Tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Aggregation configuration.
    pub metrics: MetricsConfig,
    /// Comparison configuration.
    pub comparison: ComparisonConfig,
    /// Repository fetch configuration.
    pub fetch: FetchConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Aggregation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Number of trailing calendar days in the daily series.
    pub window_days: u32,
    /// Maximum number of events kept in the recent events slice.
    pub recent_events_limit: usize,
}

/// Multi-entity comparison configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Maximum number of entities under comparison at once.
    pub max_entities: usize,
}

/// Repository fetch configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Deadline for a single repository call in milliseconds.
    pub timeout_ms: u64,
    /// Retries after a failed call. Zero disables retrying.
    pub max_retries: usize,
    /// Initial backoff delay in milliseconds, doubled on every retry.
    pub retry_base_delay_ms: u64,
}

impl Config {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        crate::ConfigValidator::validate(self)
    }
}
