//! Runtime validation of loaded configuration.

use crate::schema::Config;
use tally_common::{Result, TallyError};

/// Longest supported daily series.
pub const MAX_WINDOW_DAYS: u32 = 366;

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates a configuration, reporting every problem at once.
    pub fn validate(config: &Config) -> Result<()> {
        let problems = Self::problems(config);
        if problems.is_empty() {
            return Ok(());
        }

        Err(TallyError::validation(problems.join("; ")))
    }

    /// Lists every rule the configuration breaks.
    #[must_use]
    pub fn problems(config: &Config) -> Vec<String> {
        let mut problems = Vec::new();

        if config.metrics.window_days == 0 || config.metrics.window_days > MAX_WINDOW_DAYS {
            problems.push(format!(
                "metrics.window_days must be between 1 and {MAX_WINDOW_DAYS}, got {}",
                config.metrics.window_days
            ));
        }
        if config.metrics.recent_events_limit == 0 {
            problems.push("metrics.recent_events_limit must be at least 1".to_string());
        }
        if config.comparison.max_entities == 0 {
            problems.push("comparison.max_entities must be at least 1".to_string());
        }
        if config.fetch.timeout_ms == 0 {
            problems.push("fetch.timeout_ms must be greater than 0".to_string());
        }
        if config.logging.level.trim().is_empty() {
            problems.push("logging.level cannot be empty".to_string());
        }

        problems
    }
}
