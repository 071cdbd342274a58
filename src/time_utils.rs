// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, FixedOffset, NaiveTime, SecondsFormat, TimeZone, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
///
/// Fixed-width output, so stored timestamps compare correctly as strings.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Most recent midnight at `offset`, as a UTC instant.
///
/// The daily swipe quota counts decisions recorded since this instant.
pub fn local_midnight(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    let local_day = now.with_timezone(&offset).date_naive();
    offset
        .from_local_datetime(&local_day.and_time(NaiveTime::MIN))
        .single()
        .map_or(now, |midnight| midnight.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uses_z_suffix() {
        let date = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(format_utc_rfc3339(date), "2026-03-04T05:06:07Z");
    }

    #[test]
    fn test_local_midnight_utc() {
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 15, 30, 0).unwrap();
        let offset = FixedOffset::east_opt(0).unwrap();
        assert_eq!(
            local_midnight(now, offset),
            Utc.with_ymd_and_hms(2026, 3, 4, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_local_midnight_west_of_utc_uses_previous_day() {
        // 02:00 UTC is 21:00 the previous day at UTC-5
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 2, 0, 0).unwrap();
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        assert_eq!(
            local_midnight(now, offset),
            Utc.with_ymd_and_hms(2026, 3, 3, 5, 0, 0).unwrap()
        );
    }
}
