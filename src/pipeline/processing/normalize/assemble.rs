use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::constants::JST_SUFFIX;
use crate::types::{CalendarDate, TimeRange};

/// What to do when only a start time was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndTimePolicy {
    /// Leave `ends_at` empty.
    #[default]
    LeaveOpen,
    /// Assume a one hour event.
    DefaultOneHour,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledTimes {
    pub starts_at: String,
    pub ends_at: Option<String>,
    pub time_unknown: bool,
}

/// Combine a date and an optional time range into `+09:00` timestamps.
///
/// An end earlier than the start stays on the same day; overnight events are
/// not rolled forward.
pub fn assemble(date: &CalendarDate, time: Option<&TimeRange>, policy: EndTimePolicy) -> AssembledTimes {
    let day = date.naive();
    let Some(range) = time else {
        return AssembledTimes {
            starts_at: format_jst(day.and_time(NaiveTime::default())),
            ends_at: None,
            time_unknown: true,
        };
    };

    let Some(start_time) = NaiveTime::from_hms_opt(range.start_hour, range.start_minute, 0) else {
        return assemble(date, None, policy);
    };
    let start = day.and_time(start_time);

    let end = match range.end() {
        // 24:00 is midnight at the end of the day
        Some((24, minute)) => NaiveTime::from_hms_opt(0, minute, 0)
            .map(|t| (day + Duration::days(1)).and_time(t)),
        Some((hour, minute)) => NaiveTime::from_hms_opt(hour, minute, 0).map(|t| day.and_time(t)),
        None => match policy {
            EndTimePolicy::LeaveOpen => None,
            EndTimePolicy::DefaultOneHour => Some(start + Duration::hours(1)),
        },
    };

    AssembledTimes {
        starts_at: format_jst(start),
        ends_at: end.map(format_jst),
        time_unknown: false,
    }
}

fn format_jst(at: NaiveDateTime) -> String {
    format!("{}{}", at.format("%Y-%m-%dT%H:%M:%S"), JST_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feb7() -> CalendarDate {
        CalendarDate::new(2026, 2, 7).unwrap()
    }

    #[test]
    fn test_unknown_time_is_midnight() {
        let out = assemble(&feb7(), None, EndTimePolicy::DefaultOneHour);
        assert_eq!(out.starts_at, "2026-02-07T00:00:00+09:00");
        assert_eq!(out.ends_at, None);
        assert!(out.time_unknown);
    }

    #[test]
    fn test_full_range() {
        let range = TimeRange::starting(10, 30).with_end(11, 30);
        let out = assemble(&feb7(), Some(&range), EndTimePolicy::LeaveOpen);
        assert_eq!(out.starts_at, "2026-02-07T10:30:00+09:00");
        assert_eq!(out.ends_at.as_deref(), Some("2026-02-07T11:30:00+09:00"));
        assert!(!out.time_unknown);
    }

    #[test]
    fn test_start_only_follows_policy() {
        let range = TimeRange::starting(23, 30);
        let open = assemble(&feb7(), Some(&range), EndTimePolicy::LeaveOpen);
        assert_eq!(open.ends_at, None);

        let hour = assemble(&feb7(), Some(&range), EndTimePolicy::DefaultOneHour);
        assert_eq!(hour.ends_at.as_deref(), Some("2026-02-08T00:30:00+09:00"));
    }

    #[test]
    fn test_end_before_start_is_passed_through() {
        let range = TimeRange::starting(23, 0).with_end(1, 0);
        let out = assemble(&feb7(), Some(&range), EndTimePolicy::DefaultOneHour);
        assert_eq!(out.starts_at, "2026-02-07T23:00:00+09:00");
        assert_eq!(out.ends_at.as_deref(), Some("2026-02-07T01:00:00+09:00"));
    }

    #[test]
    fn test_end_at_24_rolls_to_next_midnight() {
        let range = TimeRange::starting(18, 0).with_end(24, 0);
        let out = assemble(&feb7(), Some(&range), EndTimePolicy::LeaveOpen);
        assert_eq!(out.ends_at.as_deref(), Some("2026-02-08T00:00:00+09:00"));
    }
}
