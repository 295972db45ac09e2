//! Test utilities and shared test helpers for Tally.
//!
//! This module provides fixtures and helper functions used across all crates
//! in the workspace for unit and integration testing.

use crate::{EntityId, Event, EventId, EventType, Timestamp};
use chrono::{Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize test logging once per test run.
static INIT: Once = Once::new();

/// Initialize logging for tests with a sensible default configuration.
/// This function is safe to call multiple times and will only initialize once.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

        let _ = fmt().with_test_writer().with_env_filter(filter).try_init();
    });
}

/// Test fixture for creating a mock timestamp.
pub fn mock_timestamp(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    min: u32,
    sec: u32,
) -> Timestamp {
    Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
        .unwrap()
}

/// The reference "now" used by most engine tests: 2024-03-15 12:00:00 UTC.
pub fn reference_now() -> Timestamp {
    mock_timestamp(2024, 3, 15, 12, 0, 0)
}

/// Event fixtures.
pub mod event_fixtures {
    use super::*;

    static NEXT_ID: AtomicU64 = AtomicU64::new(1);

    /// Create one event with a unique, monotonically increasing id.
    pub fn event(entity: &str, event_type: EventType, occurred_at: Timestamp) -> Event {
        let n = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        Event::new(
            EventId::new(format!("evt-{n:08}")),
            EntityId::from(entity),
            event_type,
            occurred_at,
        )
    }

    /// Create `count` events of one type at the same instant.
    pub fn events_at(
        entity: &str,
        event_type: EventType,
        occurred_at: Timestamp,
        count: usize,
    ) -> Vec<Event> {
        (0..count)
            .map(|_| event(entity, event_type.clone(), occurred_at))
            .collect()
    }

    /// Create `count` events of one type, `days_ago` calendar days before `now`.
    pub fn events_days_ago(
        entity: &str,
        event_type: EventType,
        now: Timestamp,
        days_ago: i64,
        count: usize,
    ) -> Vec<Event> {
        events_at(entity, event_type, now - Duration::days(days_ago), count)
    }

    /// Views spread across a window: one view per day for `days` days ending at `now`.
    pub fn daily_views(entity: &str, now: Timestamp, days: i64) -> Vec<Event> {
        (0..days)
            .map(|offset| event(entity, EventType::View, now - Duration::days(offset)))
            .collect()
    }
}

/// Configuration-related test utilities.
pub mod config_fixtures {
    /// A minimal configuration as YAML string.
    pub fn minimal_config_yaml() -> &'static str {
        r#"
metrics:
  window_days: 30
"#
    }

    /// A full configuration as YAML string.
    pub fn full_config_yaml() -> &'static str {
        concat!(
            "metrics:\n",
            "  window_days: 14\n",
            "  recent_events_limit: 10\n",
            "\n",
            "comparison:\n",
            "  max_entities: 3\n",
            "\n",
            "fetch:\n",
            "  timeout_ms: 2500\n",
            "  max_retries: 1\n",
            "  retry_base_delay_ms: 50\n",
            "\n",
            "logging:\n",
            "  level: \"debug\"\n",
            "  format: \"compact\"\n"
        )
    }

    /// The full configuration as TOML string.
    pub fn full_config_toml() -> &'static str {
        r#"
[metrics]
window_days = 14
recent_events_limit = 10

[comparison]
max_entities = 3

[fetch]
timeout_ms = 2500
max_retries = 1
retry_base_delay_ms = 50

[logging]
level = "debug"
format = "compact"
"#
    }
}

/// Property-based testing utilities using proptest.
#[cfg(any(test, feature = "proptest"))]
pub mod property_testing {
    use super::*;
    use proptest::prelude::*;

    /// Strategy for generating event types, including extensible ones.
    pub fn event_type_strategy() -> impl Strategy<Value = EventType> {
        prop_oneof![
            4 => Just(EventType::View),
            1 => Just(EventType::Share),
            1 => Just(EventType::ContactClick),
            1 => Just(EventType::ServiceView),
            1 => "[a-z_]{3,12}".prop_map(EventType::from),
        ]
    }

    /// Strategy for event sets around `now`, spanning `max_days_back` days into
    /// the past and a few days into the future.
    pub fn events_strategy(
        now: Timestamp,
        max_days_back: i64,
        max_len: usize,
    ) -> impl Strategy<Value = Vec<Event>> {
        let offsets = (-3 * 86_400i64)..(max_days_back * 86_400);
        prop::collection::vec((event_type_strategy(), offsets), 0..max_len).prop_map(
            move |items| {
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, (event_type, seconds_back))| {
                        Event::new(
                            EventId::new(format!("prop-{i}")),
                            EntityId::from("P"),
                            event_type,
                            now - Duration::seconds(seconds_back),
                        )
                    })
                    .collect()
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_init_logging_multiple_calls() {
        // Should not panic when called multiple times
        init_test_logging();
        init_test_logging();
        init_test_logging();
    }

    #[test]
    fn test_mock_timestamp() {
        let timestamp = mock_timestamp(2024, 1, 1, 12, 0, 0);
        assert_eq!(timestamp.year(), 2024);
        assert_eq!(timestamp.month(), 1);
        assert_eq!(timestamp.day(), 1);
        assert_eq!(timestamp.hour(), 12);
    }

    #[test]
    fn test_event_fixture_ids_are_unique() {
        let now = reference_now();
        let events = event_fixtures::events_at("P1", EventType::View, now, 3);
        assert_eq!(events.len(), 3);
        assert_ne!(events[0].id, events[1].id);
        assert_ne!(events[1].id, events[2].id);
    }

    #[test]
    fn test_events_days_ago() {
        let now = reference_now();
        let events = event_fixtures::events_days_ago("P1", EventType::Share, now, 5, 2);
        assert!(events
            .iter()
            .all(|e| e.occurred_at.date_naive() == mock_timestamp(2024, 3, 10, 0, 0, 0).date_naive()));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_property_event_type_roundtrips(event_type in property_testing::event_type_strategy()) {
                let wire = String::from(event_type.clone());
                prop_assert_eq!(EventType::from(wire), event_type);
            }
        }
    }
}
