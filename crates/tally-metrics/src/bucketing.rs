//! Trailing-window daily bucketing of events.
//!
//! A series always has exactly `window_days` buckets, one per UTC calendar
//! day, ascending and contiguous, ending on the day of the supplied `now`.
//! Days without matching events are present with a count of zero.
//! Windows longer than [`MAX_WINDOW_DAYS`] are clamped to it.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use tally_common::{days_before, utc_day, Event, EventType, Timestamp};
use tally_config::MAX_WINDOW_DAYS;
use tracing::trace;

/// One day's count within a windowed series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DailyBucket {
    /// Calendar day (UTC), serialized as an ISO 8601 date.
    pub date: NaiveDate,
    /// Matching events on that day.
    pub count: u32,
}

impl DailyBucket {
    /// An empty bucket for `date`.
    #[must_use]
    pub const fn zero(date: NaiveDate) -> Self {
        Self { date, count: 0 }
    }
}

fn window_len(window_days: NonZeroU32) -> u32 {
    window_days.get().min(MAX_WINDOW_DAYS)
}

/// First calendar day of the window of `window_days` days ending at `now`.
///
/// Saturates at the earliest representable date.
#[must_use]
pub fn window_start(now: Timestamp, window_days: NonZeroU32) -> NaiveDate {
    let today = utc_day(now);
    today
        .checked_sub_signed(Duration::days(i64::from(window_len(window_days)) - 1))
        .unwrap_or(NaiveDate::MIN)
}

/// The calendar days of the window ending at `now`, oldest first.
#[must_use]
pub fn window_dates(now: Timestamp, window_days: NonZeroU32) -> Vec<NaiveDate> {
    let today = utc_day(now);
    window_start(now, window_days)
        .iter_days()
        .take_while(|date| *date <= today)
        .collect()
}

/// Count events of `filter` per calendar day over the window ending at `now`.
///
/// Events outside the window and events of other types are ignored.
#[must_use]
pub fn bucket(
    events: &[Event],
    filter: &EventType,
    window_days: NonZeroU32,
    now: Timestamp,
) -> Vec<DailyBucket> {
    let mut buckets: Vec<DailyBucket> = window_dates(now, window_days)
        .into_iter()
        .map(DailyBucket::zero)
        .collect();
    let last = i64::try_from(buckets.len()).unwrap_or(i64::MAX) - 1;

    let mut ignored = 0usize;
    for event in events.iter().filter(|event| event.is(filter)) {
        // Buckets run oldest first, so today is the last index.
        let index = last - days_before(now, utc_day(event.occurred_at));
        match usize::try_from(index).ok().and_then(|i| buckets.get_mut(i)) {
            Some(bucket) => bucket.count += 1,
            None => ignored += 1,
        }
    }

    trace!(
        window_days = window_days.get(),
        event_type = %filter,
        ignored,
        "Bucketed events"
    );
    buckets
}

/// Sum of all bucket counts.
#[must_use]
pub fn series_total(buckets: &[DailyBucket]) -> u64 {
    buckets.iter().map(|b| u64::from(b.count)).sum()
}
