//! Shared calendar-day helpers.

use crate::Timestamp;
use chrono::NaiveDate;

/// UTC calendar day a timestamp falls on.
#[must_use]
pub fn utc_day(timestamp: Timestamp) -> NaiveDate {
    timestamp.date_naive()
}

/// Whole calendar days from `date` back to the day of `now`.
///
/// Zero for today, positive for past days, negative for future days.
#[must_use]
pub fn days_before(now: Timestamp, date: NaiveDate) -> i64 {
    (utc_day(now) - date).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_days_before_uses_calendar_days() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 0, 5, 0).unwrap();
        let yesterday = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        let tomorrow = NaiveDate::from_ymd_opt(2024, 3, 16).unwrap();

        assert_eq!(days_before(now, utc_day(now)), 0);
        assert_eq!(days_before(now, yesterday), 1);
        assert_eq!(days_before(now, tomorrow), -1);
    }
}
