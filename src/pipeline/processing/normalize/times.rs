use regex::{Captures, Regex};

use super::digits::normalize_text;
use crate::types::TimeRange;

/// Extracts a start (and, when written as a range, an end) time of day.
pub struct TimeRangeParser {
    token: Regex,
    separator: Regex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Meridiem {
    pm: bool,
}

#[derive(Debug, Clone, Copy)]
struct TimeToken {
    hour: u32,
    minute: u32,
    meridiem: Option<Meridiem>,
    start: usize,
    end: usize,
}

impl Default for TimeRangeParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeRangeParser {
    pub fn new() -> Self {
        let token = Regex::new(
            r"(?P<mer>午前|午後)?\s*(?:(?P<h1>\d{1,2}):(?P<m1>\d{2})|(?P<h2>\d{1,2})\s*時\s*(?:(?P<m2>\d{1,2})\s*分|(?P<half>半))?(?P<dur>間)?|(?P<noon>正午))",
        )
        .unwrap_or_else(|e| panic!("invalid time pattern: {e}"));
        let separator = Regex::new(r"^\s*(?:~|-|から|より)\s*$")
            .unwrap_or_else(|e| panic!("invalid separator pattern: {e}"));
        Self { token, separator }
    }

    /// `None` when the text holds no recognizable time of day.
    pub fn parse(&self, text: &str) -> Option<TimeRange> {
        let text = normalize_text(text);
        let tokens: Vec<TimeToken> = self
            .token
            .captures_iter(&text)
            .filter_map(|caps| to_token(&caps))
            .collect();

        let (first, rest) = tokens.split_first()?;
        let start_hour = apply_meridiem(first.hour, first.meridiem);
        if start_hour > 23 {
            return None;
        }
        let mut range = TimeRange::starting(start_hour, first.minute);

        if let Some(next) = rest.first() {
            let gap = &text[first.end..next.start];
            if self.separator.is_match(gap) {
                // "午後1時～3時" : the end inherits the start's 午後 only
                let meridiem = next.meridiem.or(first.meridiem.filter(|m| m.pm));
                let end_hour = apply_meridiem(next.hour, meridiem);
                if end_hour < 24 || (end_hour == 24 && next.minute == 0) {
                    range = range.with_end(end_hour, next.minute);
                }
            }
        }
        Some(range)
    }
}

fn to_token(caps: &Captures) -> Option<TimeToken> {
    let whole = caps.get(0)?;
    if caps.name("dur").is_some() {
        // "2時間" is a duration, not a clock time
        return None;
    }
    let meridiem = match caps.name("mer") {
        Some(m) => Some(Meridiem { pm: m.as_str() == "午後" }),
        None if caps.name("noon").is_some() => Some(Meridiem { pm: true }),
        None => None,
    };

    let (hour, minute) = if caps.name("noon").is_some() {
        (12, 0)
    } else if let Some(h) = caps.name("h1") {
        (h.as_str().parse().ok()?, caps.name("m1")?.as_str().parse().ok()?)
    } else {
        let hour = caps.name("h2")?.as_str().parse().ok()?;
        let minute = if caps.name("half").is_some() {
            30
        } else {
            caps.name("m2").map_or(Some(0), |m| m.as_str().parse().ok())?
        };
        (hour, minute)
    };

    if hour > 24 || minute > 59 {
        return None;
    }
    Some(TimeToken {
        hour,
        minute,
        meridiem,
        start: whole.start(),
        end: whole.end(),
    })
}

fn apply_meridiem(hour: u32, meridiem: Option<Meridiem>) -> u32 {
    match meridiem {
        Some(Meridiem { pm: true }) if hour < 12 => hour + 12,
        // 午前12時 is midnight
        Some(Meridiem { pm: false }) if hour == 12 => 0,
        _ => hour,
    }
}
