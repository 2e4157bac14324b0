use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};

use crate::constants::JST_OFFSET_SECONDS;
use crate::types::CalendarDate;

/// Japan Standard Time: a fixed +09:00 with no daylight saving.
pub const JST: FixedOffset = match FixedOffset::east_opt(JST_OFFSET_SECONDS) {
    Some(offset) => offset,
    None => panic!("JST offset out of range"),
};

/// Today's civil date in JST for the given instant, independent of the
/// host's local timezone.
pub fn today_jst(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&JST).date_naive()
}

/// Accepts dates in `[today, today + max_days]` (JST civil dates).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowFilter {
    today: NaiveDate,
    max_days: i64,
}

impl WindowFilter {
    pub fn new(now: DateTime<Utc>, max_days: i64) -> Self {
        Self::from_today(today_jst(now), max_days)
    }

    pub fn from_today(today: NaiveDate, max_days: i64) -> Self {
        Self {
            today,
            max_days: max_days.max(0),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn max_days(&self) -> i64 {
        self.max_days
    }

    pub fn in_range(&self, date: &CalendarDate) -> bool {
        let d = date.naive();
        d >= self.today && d <= self.today + Duration::days(self.max_days)
    }
}
