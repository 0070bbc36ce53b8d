// SPDX-FileCopyrightText: 2026 Pluvio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Next-firing computation for recurring alarms.
//!
//! Alarm times are HH:MM local to the server; no timezone is recorded on the
//! alarm row. The walk covers day offsets 0..=7 from `now`, skipping today
//! when the time of day is not strictly in the future, and skipping local
//! times that do not exist (DST gap). For any non-empty day set the result
//! is strictly in the future and less than eight days away.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveTime, TimeZone};

use pluvio_core::DayOfWeek;

/// Parse an alarm's `HH:MM` time of day.
pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M").ok()
}

/// The earliest datetime strictly after `now` whose weekday is in `days`
/// and whose local time of day equals `time_of_day`.
pub fn next_occurrence<Tz: TimeZone>(
    time_of_day: NaiveTime,
    days: &[DayOfWeek],
    now: DateTime<Tz>,
) -> Option<DateTime<Tz>> {
    if days.is_empty() {
        return None;
    }
    let weekdays: Vec<chrono::Weekday> = days.iter().map(|d| d.to_weekday()).collect();

    for offset in 0..=7i64 {
        let date = now.date_naive() + Duration::days(offset);
        if !weekdays.contains(&date.weekday()) {
            continue;
        }
        let candidate = date.and_time(time_of_day);
        if offset == 0 && candidate <= now.naive_local() {
            continue;
        }
        match now.timezone().from_local_datetime(&candidate) {
            LocalResult::Single(dt) => return Some(dt),
            LocalResult::Ambiguous(earliest, _) => return Some(earliest),
            LocalResult::None => continue,
        }
    }
    None
}
