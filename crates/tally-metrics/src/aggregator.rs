//! Per-entity aggregation of raw events into dashboard metrics

use crate::bucketing::{bucket, DailyBucket};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::num::NonZeroU32;
use tally_common::{EntityId, Event, EventType, Result, TallyError, Timestamp};
use tally_config::{MetricsConfig, MAX_WINDOW_DAYS};
use tracing::{debug, instrument};

/// Configuration for aggregation operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationConfig {
    /// Trailing window of the daily views series
    pub window_days: NonZeroU32,
    /// Maximum number of events in the recent events slice
    pub recent_events_limit: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            window_days: NonZeroU32::new(tally_config::DEFAULT_WINDOW_DAYS).unwrap_or(NonZeroU32::MIN),
            recent_events_limit: tally_config::DEFAULT_RECENT_EVENTS_LIMIT,
        }
    }
}

impl TryFrom<&MetricsConfig> for AggregationConfig {
    type Error = TallyError;

    fn try_from(config: &MetricsConfig) -> Result<Self> {
        let window_days = NonZeroU32::new(config.window_days)
            .ok_or_else(|| TallyError::validation_field("window must be at least one day", "metrics.window_days"))?;
        if window_days.get() > MAX_WINDOW_DAYS {
            return Err(TallyError::validation_field(
                format!("window must be at most {MAX_WINDOW_DAYS} days"),
                "metrics.window_days",
            ));
        }

        Ok(Self {
            window_days,
            recent_events_limit: config.recent_events_limit,
        })
    }
}

/// Aggregated metrics for one entity.
///
/// Totals cover every supplied event; `views_by_date` covers the trailing
/// window only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    /// Entity the metrics describe.
    pub entity_id: EntityId,
    /// All-time view count.
    pub total_views: u64,
    /// All-time share count.
    pub total_shares: u64,
    /// All-time contact click count.
    pub total_contact_clicks: u64,
    /// All-time service view count.
    pub total_service_views: u64,
    /// All-time counts of every event type seen, including extensible ones
    pub totals_by_type: BTreeMap<EventType, u64>,
    /// Zero-filled daily view counts, oldest first
    pub views_by_date: Vec<DailyBucket>,
    /// Most recent events of any type, newest first
    pub recent_events: Vec<Event>,
    /// Reference instant the window was computed against
    pub generated_at: Timestamp,
}

impl AggregatedMetrics {
    /// Total events of a given type.
    #[must_use]
    pub fn total_for(&self, event_type: &EventType) -> u64 {
        self.totals_by_type.get(event_type).copied().unwrap_or(0)
    }

    /// Whether any event was aggregated at all.
    ///
    /// A `false` here means "no data yet", which is not a failure.
    #[must_use]
    pub fn has_events(&self) -> bool {
        self.totals_by_type.values().any(|&count| count > 0)
    }

    /// View count on a given day, if the day is inside the window.
    #[must_use]
    pub fn views_on(&self, date: chrono::NaiveDate) -> Option<u32> {
        self.views_by_date
            .iter()
            .find(|bucket| bucket.date == date)
            .map(|bucket| bucket.count)
    }
}

/// Pure aggregator turning one entity's events into [`AggregatedMetrics`]
#[derive(Debug, Clone, Default)]
pub struct MetricsAggregator {
    config: AggregationConfig,
}

impl MetricsAggregator {
    /// Creates an aggregator.
    pub const fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    /// Active configuration.
    pub const fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Aggregate `events` for `entity_id` against the reference instant `now`.
    ///
    /// Events may arrive in any order. The same inputs always produce the
    /// same output.
    #[instrument(skip(self, events), fields(events = events.len()))]
    pub fn aggregate(&self, entity_id: &EntityId, events: &[Event], now: Timestamp) -> AggregatedMetrics {
        let mut totals_by_type: BTreeMap<EventType, u64> = BTreeMap::new();
        for event in events {
            *totals_by_type.entry(event.event_type.clone()).or_insert(0) += 1;
        }

        let total = |event_type: EventType| totals_by_type.get(&event_type).copied().unwrap_or(0);
        let total_views = total(EventType::View);
        let total_shares = total(EventType::Share);
        let total_contact_clicks = total(EventType::ContactClick);
        let total_service_views = total(EventType::ServiceView);

        let views_by_date = bucket(events, &EventType::View, self.config.window_days, now);
        let recent_events = most_recent(events, self.config.recent_events_limit);

        debug!(
            total_views,
            total_shares,
            recent = recent_events.len(),
            "Aggregated entity metrics"
        );

        AggregatedMetrics {
            entity_id: entity_id.clone(),
            total_views,
            total_shares,
            total_contact_clicks,
            total_service_views,
            totals_by_type,
            views_by_date,
            recent_events,
            generated_at: now,
        }
    }
}

/// Newest first; equal instants fall back to ascending event id.
fn recency_order(a: &Event, b: &Event) -> Ordering {
    b.occurred_at
        .cmp(&a.occurred_at)
        .then_with(|| a.id.cmp(&b.id))
}

fn most_recent(events: &[Event], limit: usize) -> Vec<Event> {
    let mut sorted: Vec<&Event> = events.iter().collect();
    sorted.sort_by(|a, b| recency_order(a, b));
    sorted.into_iter().take(limit).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tally_common::test_utils::{event_fixtures, reference_now};
    use tally_common::EventId;

    fn aggregator() -> MetricsAggregator {
        MetricsAggregator::default()
    }

    #[test]
    fn test_empty_events() {
        let now = reference_now();
        let metrics = aggregator().aggregate(&EntityId::from("P1"), &[], now);

        assert_eq!(metrics.total_views, 0);
        assert_eq!(metrics.total_shares, 0);
        assert_eq!(metrics.total_contact_clicks, 0);
        assert_eq!(metrics.total_service_views, 0);
        assert_eq!(metrics.views_by_date.len(), 30);
        assert!(metrics.views_by_date.iter().all(|b| b.count == 0));
        assert!(metrics.recent_events.is_empty());
        assert!(!metrics.has_events());
    }

    #[test]
    fn test_views_today_and_five_days_ago() {
        let now = reference_now();
        let mut events = event_fixtures::events_days_ago("P1", EventType::View, now, 0, 3);
        events.extend(event_fixtures::events_days_ago("P1", EventType::View, now, 5, 2));
        events.extend(event_fixtures::events_days_ago("P1", EventType::Share, now, 0, 1));

        let metrics = aggregator().aggregate(&EntityId::from("P1"), &events, now);

        assert_eq!(metrics.total_views, 5);
        assert_eq!(metrics.total_shares, 1);
        assert_eq!(metrics.total_contact_clicks, 0);
        assert_eq!(metrics.views_by_date.len(), 30);

        let today = now.date_naive();
        for (offset, bucket) in metrics.views_by_date.iter().rev().enumerate() {
            assert_eq!(bucket.date, today - Duration::days(offset as i64));
            let expected = match offset {
                0 => 3,
                5 => 2,
                _ => 0,
            };
            assert_eq!(bucket.count, expected, "offset {offset}");
        }
    }

    #[test]
    fn test_totals_are_not_window_limited() {
        let now = reference_now();
        let mut events = event_fixtures::events_days_ago("P1", EventType::View, now, 400, 4);
        events.extend(event_fixtures::events_days_ago("P1", EventType::View, now, 1, 1));

        let metrics = aggregator().aggregate(&EntityId::from("P1"), &events, now);
        assert_eq!(metrics.total_views, 5);
        assert_eq!(crate::series_total(&metrics.views_by_date), 1);
    }

    #[test]
    fn test_extensible_types_are_counted() {
        let now = reference_now();
        let booking = EventType::from("booking");
        let mut events = event_fixtures::events_at("P1", booking.clone(), now, 2);
        events.extend(event_fixtures::events_at("P1", EventType::ServiceView, now, 1));

        let metrics = aggregator().aggregate(&EntityId::from("P1"), &events, now);
        assert_eq!(metrics.total_for(&booking), 2);
        assert_eq!(metrics.total_service_views, 1);
        assert_eq!(metrics.total_views, 0);
        assert!(metrics.has_events());
    }

    #[test]
    fn test_recent_events_are_bounded_and_newest_first() {
        let now = reference_now();
        let events: Vec<Event> = (0..25)
            .map(|i| event_fixtures::event("P1", EventType::Share, now - Duration::hours(i)))
            .rev()
            .collect();

        let metrics = aggregator().aggregate(&EntityId::from("P1"), &events, now);
        assert_eq!(metrics.recent_events.len(), 20);
        assert_eq!(metrics.recent_events[0].occurred_at, now);
        assert!(metrics
            .recent_events
            .windows(2)
            .all(|pair| pair[0].occurred_at >= pair[1].occurred_at));
        assert_eq!(metrics.recent_events[19].occurred_at, now - Duration::hours(19));
    }

    #[test]
    fn test_recent_events_ties_break_on_id() {
        let now = reference_now();
        let events = vec![
            Event::new(EventId::from("c"), "P1", EventType::View, now),
            Event::new(EventId::from("a"), "P1", EventType::Share, now),
            Event::new(EventId::from("b"), "P1", EventType::View, now),
        ];

        let metrics = aggregator().aggregate(&EntityId::from("P1"), &events, now);
        let ids: Vec<&str> = metrics.recent_events.iter().map(|e| e.id.0.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_aggregation_is_deterministic() {
        let now = reference_now();
        let mut events = event_fixtures::daily_views("P1", now, 40);
        events.extend(event_fixtures::events_at("P1", EventType::ContactClick, now, 3));

        let mut shuffled = events.clone();
        shuffled.reverse();

        let a = aggregator().aggregate(&EntityId::from("P1"), &events, now);
        let b = aggregator().aggregate(&EntityId::from("P1"), &shuffled, now);
        assert_eq!(a, b);
    }

    #[test]
    fn test_config_from_metrics_config() {
        let config = MetricsConfig {
            window_days: 7,
            recent_events_limit: 5,
        };
        let aggregation = AggregationConfig::try_from(&config).unwrap();
        assert_eq!(aggregation.window_days.get(), 7);

        let metrics = MetricsAggregator::new(aggregation).aggregate(
            &EntityId::from("P1"),
            &event_fixtures::daily_views("P1", reference_now(), 10),
            reference_now(),
        );
        assert_eq!(metrics.views_by_date.len(), 7);
        assert_eq!(metrics.recent_events.len(), 5);

        let zero = MetricsConfig {
            window_days: 0,
            recent_events_limit: 5,
        };
        assert!(AggregationConfig::try_from(&zero).is_err());

        let too_long = MetricsConfig {
            window_days: MAX_WINDOW_DAYS + 1,
            recent_events_limit: 5,
        };
        assert!(matches!(
            AggregationConfig::try_from(&too_long),
            Err(TallyError::Validation { field: Some(ref field), .. }) if field == "metrics.window_days"
        ));
    }
}
