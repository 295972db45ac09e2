//! Default values for every configuration section.

use crate::schema::{ComparisonConfig, FetchConfig, MetricsConfig};

/// Trailing window of the daily views series.
pub const DEFAULT_WINDOW_DAYS: u32 = 30;

/// Size of the recent events slice.
pub const DEFAULT_RECENT_EVENTS_LIMIT: usize = 20;

/// Comparison capacity.
pub const DEFAULT_MAX_COMPARISON_ENTITIES: usize = 4;

/// Repository call deadline.
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;

/// Retries after a failed repository call.
pub const DEFAULT_FETCH_MAX_RETRIES: usize = 2;

/// Initial retry backoff.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 100;

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            recent_events_limit: DEFAULT_RECENT_EVENTS_LIMIT,
        }
    }
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            max_entities: DEFAULT_MAX_COMPARISON_ENTITIES,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            max_retries: DEFAULT_FETCH_MAX_RETRIES,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
        }
    }
}
