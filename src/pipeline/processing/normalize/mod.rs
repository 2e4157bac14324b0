//! Synchronous text normalization: one raw fragment in, dated drafts out.

pub mod assemble;
pub mod dates;
pub mod digits;
pub mod times;
pub mod window;

use tracing::debug;

use crate::types::{CalendarDate, RawFragment};
use assemble::{assemble, AssembledTimes, EndTimePolicy};
use dates::{DateContext, DateTextParser, RangePolicy};
use times::TimeRangeParser;
use window::WindowFilter;

/// One dated occurrence of a fragment, before venue resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    pub date: CalendarDate,
    pub times: AssembledTimes,
}

/// Result of normalizing one fragment. Empty `drafts` is a legitimate
/// outcome; `drop_reason` says why.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedFragment {
    pub title: String,
    pub drafts: Vec<EventDraft>,
    pub parsed_dates: usize,
    pub out_of_window: usize,
}

impl NormalizedFragment {
    pub fn drop_reason(&self) -> Option<&'static str> {
        if !self.drafts.is_empty() {
            None
        } else if self.title.is_empty() {
            Some("no_title")
        } else if self.parsed_dates == 0 {
            Some("no_dates")
        } else {
            Some("out_of_window")
        }
    }
}

pub struct FragmentNormalizer {
    dates: DateTextParser,
    times: TimeRangeParser,
    end_time_policy: EndTimePolicy,
}

impl Default for FragmentNormalizer {
    fn default() -> Self {
        Self::new(RangePolicy::default(), EndTimePolicy::default())
    }
}

impl FragmentNormalizer {
    pub fn new(range_policy: RangePolicy, end_time_policy: EndTimePolicy) -> Self {
        Self {
            dates: DateTextParser::new(range_policy),
            times: TimeRangeParser::new(),
            end_time_policy,
        }
    }

    pub fn normalize(&self, fragment: &RawFragment, window: &WindowFilter) -> NormalizedFragment {
        let title = fragment.title.split_whitespace().collect::<Vec<_>>().join(" ");
        if title.is_empty() {
            debug!("Fragment without title from {}", fragment.source_key);
            return NormalizedFragment::default();
        }

        let ctx = DateContext::new(window.today(), window.max_days());
        let mut dates = self.dates.parse(&fragment.date_text, &ctx);
        if dates.is_empty() {
            // list pages often carry the date only in the headline
            dates = self.dates.parse(&fragment.title, &ctx);
        }
        if dates.is_empty() {
            debug!("No dates in '{}' for '{}'", fragment.date_text, title);
        }

        let time = self
            .times
            .parse(&fragment.time_text)
            .or_else(|| self.times.parse(&fragment.date_text));

        let parsed_dates = dates.len();
        let drafts: Vec<EventDraft> = dates
            .into_iter()
            .filter(|d| window.in_range(d))
            .map(|date| EventDraft {
                date,
                times: assemble(&date, time.as_ref(), self.end_time_policy),
            })
            .collect();
        let out_of_window = parsed_dates - drafts.len();

        NormalizedFragment {
            title,
            drafts,
            parsed_dates,
            out_of_window,
        }
    }
}
