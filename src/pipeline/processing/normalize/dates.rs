//! Free-text Japanese date extraction.
//!
//! Each notation is a [`DateStrategy`] compiled once per [`DateTextParser`].
//! Strategies run in a fixed priority order; whatever a strategy matches is
//! masked out of the working text so a later, more generic strategy cannot
//! re-read it (a day list must never be re-split into stray bare dates).

use std::collections::HashSet;
use std::ops::Range;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use regex::{Captures, Regex};

use super::digits::normalize_text;
use crate::types::CalendarDate;

const REIWA_OFFSET: i32 = 2018;
const MASK: char = '#';

/// How date ranges are materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangePolicy {
    /// Spans up to this many days expand to every day, inclusive.
    pub expand_max_days: i64,
    /// Spans longer than this are treated as open-ended: start date only.
    pub indefinite_after_days: i64,
}

impl Default for RangePolicy {
    fn default() -> Self {
        Self {
            expand_max_days: 30,
            indefinite_after_days: 90,
        }
    }
}

/// The "now" a parse is anchored to: today's JST civil date and how far
/// ahead recurring and long-range notations may be materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateContext {
    pub today: NaiveDate,
    pub horizon_days: i64,
}

impl DateContext {
    pub fn new(today: NaiveDate, horizon_days: i64) -> Self {
        Self {
            today,
            horizon_days: horizon_days.max(0),
        }
    }

    fn horizon_end(&self) -> NaiveDate {
        self.today + Duration::days(self.horizon_days)
    }

    fn in_horizon(&self, date: NaiveDate) -> bool {
        date >= self.today && date <= self.horizon_end()
    }

    /// Year for a month written without one. A month more than two months
    /// behind the current one belongs to next year (a December page listing
    /// January events).
    fn infer_year(&self, month: u32) -> i32 {
        if self.today.month() as i32 - month as i32 > 2 {
            self.today.year() + 1
        } else {
            self.today.year()
        }
    }
}

struct Hit {
    span: Range<usize>,
    dates: Vec<CalendarDate>,
}

trait DateStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, text: &str, ctx: &DateContext) -> Vec<Hit>;
}

pub struct DateTextParser {
    strategies: Vec<Box<dyn DateStrategy>>,
}

impl Default for DateTextParser {
    fn default() -> Self {
        Self::new(RangePolicy::default())
    }
}

impl DateTextParser {
    pub fn new(policy: RangePolicy) -> Self {
        let strategies: Vec<Box<dyn DateStrategy>> = vec![
            Box::new(RecurringStrategy::new()),
            Box::new(RangeStrategy::new(policy)),
            Box::new(DayListStrategy::new()),
            Box::new(WesternDateStrategy::new()),
            Box::new(EraDateStrategy::new()),
            Box::new(BareDateStrategy::new()),
        ];
        Self { strategies }
    }

    /// Extract every date mentioned in `text`, in order of appearance and
    /// without duplicates. Unparseable text yields an empty vector.
    pub fn parse(&self, text: &str, ctx: &DateContext) -> Vec<CalendarDate> {
        let mut work = normalize_text(text);
        let mut found: Vec<(usize, Vec<CalendarDate>)> = Vec::new();

        for strategy in &self.strategies {
            let hits = strategy.extract(&work, ctx);
            if !hits.is_empty() {
                tracing::trace!(strategy = strategy.name(), hits = hits.len(), "date strategy matched");
            }
            for hit in hits {
                mask(&mut work, hit.span.clone());
                found.push((hit.span.start, hit.dates));
            }
        }

        found.sort_by_key(|(pos, _)| *pos);
        let mut seen = HashSet::new();
        found
            .into_iter()
            .flat_map(|(_, dates)| dates)
            .filter(|d| seen.insert(*d))
            .collect()
    }
}

fn mask(text: &mut String, span: Range<usize>) {
    let filler: String = std::iter::repeat(MASK).take(span.len()).collect();
    text.replace_range(span, &filler);
}

fn compile(pattern: &str) -> Regex {
    // Patterns are literals in this module; a failure is a programming error
    // caught by the unit tests below.
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid date pattern {pattern}: {e}"))
}

fn num(caps: &Captures, name: &str) -> Option<u32> {
    caps.name(name)?.as_str().parse().ok()
}

fn era_year(token: &str) -> Option<i32> {
    let n: i32 = if token == "元" { 1 } else { token.parse().ok()? };
    Some(REIWA_OFFSET + n)
}

/// Year from an optional era (`{prefix}ey`) or western (`{prefix}wy`) group,
/// falling back to inference from the month.
fn resolve_year(caps: &Captures, prefix: &str, month: u32, ctx: &DateContext) -> Option<i32> {
    if let Some(ey) = caps.name(&format!("{prefix}ey")) {
        return era_year(ey.as_str());
    }
    if let Some(wy) = caps.name(&format!("{prefix}wy")) {
        return wy.as_str().parse().ok();
    }
    Some(ctx.infer_year(month))
}

fn explicit_year(caps: &Captures, prefix: &str) -> Option<i32> {
    if let Some(ey) = caps.name(&format!("{prefix}ey")) {
        return era_year(ey.as_str());
    }
    caps.name(&format!("{prefix}wy"))?.as_str().parse().ok()
}

fn year_prefix(prefix: &str) -> String {
    format!(r"(?:令和\s*(?P<{prefix}ey>元|\d{{1,2}})\s*年|(?P<{prefix}wy>\d{{4}})\s*年)?\s*")
}

const WEEKDAY_NOTE: &str = r"(?:\s*\([^)]{0,8}\))?";

fn weekday_from_kanji(c: char) -> Option<Weekday> {
    match c {
        '月' => Some(Weekday::Mon),
        '火' => Some(Weekday::Tue),
        '水' => Some(Weekday::Wed),
        '木' => Some(Weekday::Thu),
        '金' => Some(Weekday::Fri),
        '土' => Some(Weekday::Sat),
        '日' => Some(Weekday::Sun),
        _ => None,
    }
}

fn is_weekend(date: &CalendarDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

// ---------------------------------------------------------------------------
// 第N・M曜日 / 毎週X曜日
// ---------------------------------------------------------------------------

struct RecurringStrategy {
    nth: Regex,
    weekly: Regex,
}

impl RecurringStrategy {
    fn new() -> Self {
        Self {
            nth: compile(
                r"(?:毎月\s*)?第\s*(?P<nums>\d(?:\s*(?:・|,|、|と|及び)\s*第?\s*\d)*)\s*(?P<wd>[月火水木金土日])曜日?",
            ),
            weekly: compile(r"毎週\s*(?P<wds>[月火水木金土日](?:\s*(?:・|,|、|と)?\s*[月火水木金土日])*)(?:曜日?)?"),
        }
    }

    fn nth_weekdays(&self, caps: &Captures, ctx: &DateContext) -> Vec<CalendarDate> {
        let Some(weekday) = caps
            .name("wd")
            .and_then(|m| m.as_str().chars().next())
            .and_then(weekday_from_kanji)
        else {
            return Vec::new();
        };
        let ordinals: Vec<u8> = caps
            .name("nums")
            .map(|m| {
                m.as_str()
                    .chars()
                    .filter_map(|c| c.to_digit(10))
                    .filter(|n| (1..=5).contains(n))
                    .map(|n| n as u8)
                    .collect()
            })
            .unwrap_or_default();

        let mut dates = Vec::new();
        let end = ctx.horizon_end();
        let (mut y, mut m) = (ctx.today.year(), ctx.today.month());
        while (y, m) <= (end.year(), end.month()) {
            for &n in &ordinals {
                if let Some(d) = NaiveDate::from_weekday_of_month_opt(y, m, weekday, n) {
                    if ctx.in_horizon(d) {
                        dates.push(CalendarDate::from_naive(d));
                    }
                }
            }
            (y, m) = if m == 12 { (y + 1, 1) } else { (y, m + 1) };
        }
        dates.sort();
        dates
    }

    fn weekly(&self, caps: &Captures, ctx: &DateContext) -> Vec<CalendarDate> {
        let weekdays: Vec<Weekday> = caps
            .name("wds")
            .map(|m| m.as_str().chars().filter_map(weekday_from_kanji).collect())
            .unwrap_or_default();
        ctx.today
            .iter_days()
            .take_while(|d| *d <= ctx.horizon_end())
            .filter(|d| weekdays.contains(&d.weekday()))
            .map(CalendarDate::from_naive)
            .collect()
    }
}

impl DateStrategy for RecurringStrategy {
    fn name(&self) -> &'static str {
        "recurring"
    }

    fn extract(&self, text: &str, ctx: &DateContext) -> Vec<Hit> {
        let mut hits: Vec<Hit> = self
            .nth
            .captures_iter(text)
            .filter_map(|caps| {
                let span = caps.get(0)?.range();
                Some(Hit { span, dates: self.nth_weekdays(&caps, ctx) })
            })
            .collect();
        hits.extend(self.weekly.captures_iter(text).filter_map(|caps| {
            let span = caps.get(0)?.range();
            Some(Hit { span, dates: self.weekly(&caps, ctx) })
        }));
        hits
    }
}

// ---------------------------------------------------------------------------
// M1月D1日～M2月D2日
// ---------------------------------------------------------------------------

/// Which days of an expanded range are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WeekendRule {
    Any,
    WeekendsOnly,
    /// "土日を除く", "土日祝休館"
    WeekdaysOnly,
}

struct RangeStrategy {
    pattern: Regex,
    weekend: Regex,
    policy: RangePolicy,
}

impl RangeStrategy {
    fn new(policy: RangePolicy) -> Self {
        let pattern = format!(
            r"{start_year}(?P<smo>\d{{1,2}})\s*月\s*(?P<sd>\d{{1,2}})\s*日{note}\s*(?:~|から|-)\s*(?:{end_year}(?P<emo>\d{{1,2}})\s*月)?\s*(?P<ed>\d{{1,2}})\s*日",
            start_year = year_prefix("s"),
            end_year = year_prefix("e"),
            note = WEEKDAY_NOTE,
        );
        Self {
            pattern: compile(&pattern),
            weekend: compile(
                r"(?:土日|土・日|土曜・日曜|土曜日?(?:と|・|及び)日曜日?|週末)(?P<neg>(?:\s*(?:・|、)?\s*祝日?)?\s*(?:を除く|を除き|除く|除き|以外|休))?",
            ),
            policy,
        }
    }

    fn bounds(&self, caps: &Captures, ctx: &DateContext) -> Option<(NaiveDate, NaiveDate)> {
        let smo = num(caps, "smo")?;
        let sd = num(caps, "sd")?;
        let sy = resolve_year(caps, "s", smo, ctx)?;
        let start = NaiveDate::from_ymd_opt(sy, smo, sd)?;

        let ed = num(caps, "ed")?;
        let end = match (explicit_year(caps, "e"), num(caps, "emo")) {
            (Some(ey), Some(emo)) => NaiveDate::from_ymd_opt(ey, emo, ed)?,
            (None, Some(emo)) => {
                let ey = if emo < smo { sy + 1 } else { sy };
                NaiveDate::from_ymd_opt(ey, emo, ed)?
            }
            // "1月25日～5日" continues into the following month
            (_, None) if ed < sd => {
                let (ey, emo) = if smo == 12 { (sy + 1, 1) } else { (sy, smo + 1) };
                NaiveDate::from_ymd_opt(ey, emo, ed)?
            }
            (_, None) => NaiveDate::from_ymd_opt(sy, smo, ed)?,
        };
        Some((start, end))
    }

    /// A negated mention anywhere wins over a plain one.
    fn weekend_rule(&self, text: &str) -> WeekendRule {
        let mut rule = WeekendRule::Any;
        for caps in self.weekend.captures_iter(text) {
            if caps.name("neg").is_some() {
                return WeekendRule::WeekdaysOnly;
            }
            rule = WeekendRule::WeekendsOnly;
        }
        rule
    }

    fn expand(&self, start: NaiveDate, end: NaiveDate, rule: WeekendRule, ctx: &DateContext) -> Vec<CalendarDate> {
        let span = (end - start).num_days();
        if span < 0 || span > self.policy.indefinite_after_days {
            return vec![CalendarDate::from_naive(start)];
        }

        let every_day = start.iter_days().take_while(|d| *d <= end);
        let mut dates: Vec<CalendarDate> = if span <= self.policy.expand_max_days {
            every_day.map(CalendarDate::from_naive).collect()
        } else {
            every_day
                .filter(|d| ctx.in_horizon(*d))
                .map(CalendarDate::from_naive)
                .collect()
        };
        match rule {
            WeekendRule::Any => {}
            WeekendRule::WeekendsOnly => dates.retain(is_weekend),
            WeekendRule::WeekdaysOnly => dates.retain(|d| !is_weekend(d)),
        }
        if dates.is_empty() && span > self.policy.expand_max_days {
            dates.push(CalendarDate::from_naive(start));
        }
        dates
    }
}

impl DateStrategy for RangeStrategy {
    fn name(&self) -> &'static str {
        "range"
    }

    fn extract(&self, text: &str, ctx: &DateContext) -> Vec<Hit> {
        let rule = self.weekend_rule(text);
        self.pattern
            .captures_iter(text)
            .filter_map(|caps| {
                let span = caps.get(0)?.range();
                let dates = match self.bounds(&caps, ctx) {
                    Some((start, end)) => self.expand(start, end, rule, ctx),
                    None => Vec::new(),
                };
                Some(Hit { span, dates })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// M月D1・D2・D3日 / M月D1日(土)・D2日(土)
// ---------------------------------------------------------------------------

struct DayListStrategy {
    head: Regex,
    continuation: Regex,
}

impl DayListStrategy {
    fn new() -> Self {
        let head = format!(
            r"{year}(?P<mo>\d{{1,2}})\s*月\s*(?P<d>\d{{1,2}})\s*(?P<unit>日)?{note}",
            year = year_prefix(""),
            note = WEEKDAY_NOTE,
        );
        let continuation = format!(
            r"^\s*(?:・|,|、|及び|と)\s*(?P<d>\d{{1,2}})\s*(?P<unit>月|日|時|:|分|名|人|回)?{note}",
            note = WEEKDAY_NOTE,
        );
        Self {
            head: compile(&head),
            continuation: compile(&continuation),
        }
    }
}

impl DateStrategy for DayListStrategy {
    fn name(&self) -> &'static str {
        "day_list"
    }

    fn extract(&self, text: &str, ctx: &DateContext) -> Vec<Hit> {
        let mut hits = Vec::new();
        for caps in self.head.captures_iter(text) {
            let (Some(whole), Some(mo), Some(d)) = (caps.get(0), num(&caps, "mo"), num(&caps, "d")) else {
                continue;
            };
            let Some(year) = resolve_year(&caps, "", mo, ctx) else {
                continue;
            };

            // Numbers without 日 stay pending until a later item closes the
            // run with 日 ("1・8・15日"); anything else after a comma is not a day.
            let (mut days, mut pending) = if caps.name("unit").is_some() {
                (vec![d], Vec::new())
            } else {
                (Vec::new(), vec![d])
            };
            let mut closed_at = whole.end();
            let mut end = whole.end();
            while let Some(cont) = self.continuation.captures(&text[end..]) {
                let (Some(m), Some(day)) = (cont.get(0), num(&cont, "d")) else {
                    break;
                };
                match cont.name("unit").map(|u| u.as_str()) {
                    Some("日") => {
                        days.append(&mut pending);
                        days.push(day);
                        end += m.end();
                        closed_at = end;
                    }
                    None => {
                        pending.push(day);
                        end += m.end();
                    }
                    // "・3月1日" starts a new head, "、10時" is a time
                    Some(_) => break,
                }
            }
            if days.len() < 2 {
                continue;
            }

            let dates = days
                .into_iter()
                .filter_map(|day| CalendarDate::new(year, mo, day))
                .collect();
            hits.push(Hit { span: whole.start()..closed_at, dates });
        }
        hits
    }
}

// ---------------------------------------------------------------------------
// Single dates
// ---------------------------------------------------------------------------

struct WesternDateStrategy {
    patterns: Vec<Regex>,
}

impl WesternDateStrategy {
    fn new() -> Self {
        Self {
            patterns: vec![
                compile(r"(?P<y>\d{4})\s*年\s*(?P<mo>\d{1,2})\s*月\s*(?P<d>\d{1,2})\s*日"),
                compile(r"(?P<y>\d{4})[/.\-](?P<mo>\d{1,2})[/.\-](?P<d>\d{1,2})"),
            ],
        }
    }
}

impl DateStrategy for WesternDateStrategy {
    fn name(&self) -> &'static str {
        "western"
    }

    fn extract(&self, text: &str, _ctx: &DateContext) -> Vec<Hit> {
        let mut hits = Vec::new();
        let mut taken: Vec<Range<usize>> = Vec::new();
        for pattern in &self.patterns {
            for caps in pattern.captures_iter(text) {
                let Some(whole) = caps.get(0) else { continue };
                let span = whole.range();
                if taken.iter().any(|t| t.start < span.end && span.start < t.end) {
                    continue;
                }
                let date = (|| {
                    let y: i32 = caps.name("y")?.as_str().parse().ok()?;
                    CalendarDate::new(y, num(&caps, "mo")?, num(&caps, "d")?)
                })();
                taken.push(span.clone());
                hits.push(Hit { span, dates: date.into_iter().collect() });
            }
        }
        hits
    }
}

struct EraDateStrategy {
    pattern: Regex,
}

impl EraDateStrategy {
    fn new() -> Self {
        Self {
            pattern: compile(r"令和\s*(?P<ey>元|\d{1,2})\s*年\s*(?P<mo>\d{1,2})\s*月\s*(?P<d>\d{1,2})\s*日"),
        }
    }
}

impl DateStrategy for EraDateStrategy {
    fn name(&self) -> &'static str {
        "era"
    }

    fn extract(&self, text: &str, _ctx: &DateContext) -> Vec<Hit> {
        self.pattern
            .captures_iter(text)
            .filter_map(|caps| {
                let span = caps.get(0)?.range();
                let date = caps
                    .name("ey")
                    .and_then(|m| era_year(m.as_str()))
                    .and_then(|y| CalendarDate::new(y, num(&caps, "mo")?, num(&caps, "d")?));
                Some(Hit { span, dates: date.into_iter().collect() })
            })
            .collect()
    }
}

struct BareDateStrategy {
    patterns: Vec<Regex>,
}

impl BareDateStrategy {
    fn new() -> Self {
        Self {
            patterns: vec![
                compile(r"(?P<mo>\d{1,2})\s*月\s*(?P<d>\d{1,2})\s*日"),
                // "2/7(土)": slash dates only count with a weekday note
                compile(r"(?P<mo>\d{1,2})/(?P<d>\d{1,2})\s*\([月火水木金土日]"),
            ],
        }
    }
}

impl DateStrategy for BareDateStrategy {
    fn name(&self) -> &'static str {
        "bare"
    }

    fn extract(&self, text: &str, ctx: &DateContext) -> Vec<Hit> {
        let mut hits = Vec::new();
        for pattern in &self.patterns {
            for caps in pattern.captures_iter(text) {
                let Some(whole) = caps.get(0) else { continue };
                let date = (|| {
                    let mo = num(&caps, "mo")?;
                    CalendarDate::new(ctx.infer_year(mo), mo, num(&caps, "d")?)
                })();
                hits.push(Hit {
                    span: whole.range(),
                    dates: date.into_iter().collect(),
                });
            }
        }
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(y: i32, m: u32, d: u32, horizon: i64) -> DateContext {
        DateContext::new(NaiveDate::from_ymd_opt(y, m, d).unwrap(), horizon)
    }

    fn ymd(y: i32, m: u32, d: u32) -> CalendarDate {
        CalendarDate::new(y, m, d).unwrap()
    }

    #[test]
    fn test_era_conversion() {
        let parser = DateTextParser::default();
        let dates = parser.parse("令和8年3月1日", &ctx(2026, 2, 1, 30));
        assert_eq!(dates, vec![ymd(2026, 3, 1)]);

        let gannen = parser.parse("令和元年5月1日", &ctx(2026, 2, 1, 30));
        assert_eq!(gannen, vec![ymd(2019, 5, 1)]);
    }

    #[test]
    fn test_full_width_input_is_normalized() {
        let parser = DateTextParser::default();
        let dates = parser.parse("令和８年３月１日（日）", &ctx(2026, 2, 1, 30));
        assert_eq!(dates, vec![ymd(2026, 3, 1)]);
    }

    #[test]
    fn test_western_full_and_slash_dates() {
        let parser = DateTextParser::default();
        let c = ctx(2026, 2, 1, 30);
        assert_eq!(parser.parse("2027年1月9日(土)", &c), vec![ymd(2027, 1, 9)]);
        assert_eq!(parser.parse("開催日 2026/3/14", &c), vec![ymd(2026, 3, 14)]);
        assert_eq!(parser.parse("2026.03.15", &c), vec![ymd(2026, 3, 15)]);
    }

    #[test]
    fn test_bare_date_year_inference() {
        let parser = DateTextParser::default();
        // December page listing January events
        assert_eq!(parser.parse("1月10日(土)", &ctx(2025, 12, 20, 60)), vec![ymd(2026, 1, 10)]);
        // one month behind stays in the current year
        assert_eq!(parser.parse("1月10日", &ctx(2026, 2, 1, 60)), vec![ymd(2026, 1, 10)]);
        assert_eq!(parser.parse("12月24日", &ctx(2026, 2, 1, 60)), vec![ymd(2026, 12, 24)]);
        assert_eq!(parser.parse("2/14(土)", &ctx(2026, 2, 1, 60)), vec![ymd(2026, 2, 14)]);
    }

    #[test]
    fn test_day_list_shares_month() {
        let parser = DateTextParser::default();
        let c = ctx(2026, 2, 1, 30);
        assert_eq!(
            parser.parse("2月7日(土)・14日(土)", &c),
            vec![ymd(2026, 2, 7), ymd(2026, 2, 14)]
        );
        assert_eq!(
            parser.parse("3月1・8・15日", &c),
            vec![ymd(2026, 3, 1), ymd(2026, 3, 8), ymd(2026, 3, 15)]
        );
        assert_eq!(
            parser.parse("2026年4月4日、11日", &c),
            vec![ymd(2026, 4, 4), ymd(2026, 4, 11)]
        );
    }

    #[test]
    fn test_day_list_stops_at_next_month() {
        let parser = DateTextParser::default();
        let dates = parser.parse("2月7日・14日、3月1日", &ctx(2026, 2, 1, 60));
        assert_eq!(dates, vec![ymd(2026, 2, 7), ymd(2026, 2, 14), ymd(2026, 3, 1)]);
    }

    #[test]
    fn test_number_after_comma_is_not_a_day() {
        let parser = DateTextParser::default();
        let c = ctx(2026, 2, 1, 60);
        assert_eq!(parser.parse("2月7日(土)、10時～12時", &c), vec![ymd(2026, 2, 7)]);
        assert_eq!(parser.parse("2月7日(土)、10:00～11:30", &c), vec![ymd(2026, 2, 7)]);
        assert_eq!(parser.parse("3月1日、2名まで", &c), vec![ymd(2026, 3, 1)]);
        assert_eq!(parser.parse("3月1日・2回目", &c), vec![ymd(2026, 3, 1)]);
        // unclosed trailing number is dropped, closed items are kept
        assert_eq!(
            parser.parse("3月1日・8日、10", &c),
            vec![ymd(2026, 3, 1), ymd(2026, 3, 8)]
        );
    }

    #[test]
    fn test_day_list_next_to_recurrence() {
        let parser = DateTextParser::default();
        let dates = parser.parse("2月7日・14日、第4土曜日", &ctx(2026, 2, 1, 30));
        assert_eq!(dates, vec![ymd(2026, 2, 7), ymd(2026, 2, 14), ymd(2026, 2, 28)]);
    }

    #[test]
    fn test_range_of_fourteen_days_expands_inclusive() {
        let parser = DateTextParser::default();
        let dates = parser.parse("2026年3月1日～3月15日", &ctx(2026, 2, 1, 30));
        assert_eq!(dates.len(), 15);
        assert_eq!(dates.first(), Some(&ymd(2026, 3, 1)));
        assert_eq!(dates.last(), Some(&ymd(2026, 3, 15)));
    }

    #[test]
    fn test_long_range_emits_start_only() {
        let parser = DateTextParser::default();
        // 91 days
        let dates = parser.parse("2026年3月1日～5月31日", &ctx(2026, 2, 1, 30));
        assert_eq!(dates, vec![ymd(2026, 3, 1)]);
    }

    #[test]
    fn test_mid_range_is_clipped_to_horizon() {
        let parser = DateTextParser::default();
        // 60 days, horizon of 10 days from 2026-03-10
        let dates = parser.parse("2026年3月1日～4月30日", &ctx(2026, 3, 10, 10));
        assert_eq!(dates.len(), 11);
        assert_eq!(dates.first(), Some(&ymd(2026, 3, 10)));
        assert_eq!(dates.last(), Some(&ymd(2026, 3, 20)));
    }

    #[test]
    fn test_weekend_only_range() {
        let parser = DateTextParser::default();
        let dates = parser.parse("2026年2月7日(土)～28日(土)の土日祝", &ctx(2026, 2, 1, 30));
        assert_eq!(
            dates,
            vec![
                ymd(2026, 2, 7),
                ymd(2026, 2, 8),
                ymd(2026, 2, 14),
                ymd(2026, 2, 15),
                ymd(2026, 2, 21),
                ymd(2026, 2, 22),
                ymd(2026, 2, 28),
            ]
        );
        assert!(dates.iter().all(is_weekend));
    }

    #[test]
    fn test_negated_weekend_qualifier_keeps_weekdays() {
        let parser = DateTextParser::default();
        let c = ctx(2026, 2, 1, 30);
        let weekdays: Vec<CalendarDate> = (2..=13)
            .map(|d| ymd(2026, 2, d))
            .filter(|d| !is_weekend(d))
            .collect();
        assert_eq!(weekdays.len(), 10);

        assert_eq!(parser.parse("2026年2月2日～2月13日(土日を除く)", &c), weekdays);
        assert_eq!(parser.parse("2月2日～13日 土日祝休館", &c), weekdays);
        assert_eq!(parser.parse("2月2日～13日(土・日以外)", &c), weekdays);
    }

    #[test]
    fn test_range_rolls_into_next_month_and_year() {
        let parser = DateTextParser::default();
        let c = ctx(2025, 12, 1, 60);
        let dates = parser.parse("12月30日~1月2日", &c);
        assert_eq!(
            dates,
            vec![ymd(2025, 12, 30), ymd(2025, 12, 31), ymd(2026, 1, 1), ymd(2026, 1, 2)]
        );
        let dates = parser.parse("1月30日から2日", &ctx(2026, 1, 1, 60));
        assert_eq!(dates.len(), 4);
        assert_eq!(dates.last(), Some(&ymd(2026, 2, 2)));
    }

    #[test]
    fn test_nth_weekday_recurrence() {
        let parser = DateTextParser::default();
        // Feb 2026: Saturdays are 7, 14, 21, 28; Mar 2026: 7, 14, 21, 28
        let dates = parser.parse("毎月第2・4土曜日", &ctx(2026, 2, 1, 45));
        assert_eq!(dates, vec![ymd(2026, 2, 14), ymd(2026, 2, 28), ymd(2026, 3, 14)]);
    }

    #[test]
    fn test_weekly_recurrence_within_horizon() {
        let parser = DateTextParser::default();
        let dates = parser.parse("毎週水曜日", &ctx(2026, 2, 1, 14));
        assert_eq!(dates, vec![ymd(2026, 2, 4), ymd(2026, 2, 11)]);
    }

    #[test]
    fn test_bare_recurrence_without_qualifier_yields_nothing() {
        let parser = DateTextParser::default();
        let c = ctx(2026, 2, 1, 30);
        assert!(parser.parse("毎週開催", &c).is_empty());
        assert!(parser.parse("毎月", &c).is_empty());
    }

    #[test]
    fn test_unparseable_text_is_empty() {
        let parser = DateTextParser::default();
        let c = ctx(2026, 2, 1, 30);
        assert!(parser.parse("", &c).is_empty());
        assert!(parser.parse("随時受付中", &c).is_empty());
        assert!(parser.parse("2月30日", &c).is_empty());
    }

    #[test]
    fn test_duplicates_collapse_and_order_follows_text() {
        let parser = DateTextParser::default();
        let dates = parser.parse("3月8日(日) 2026年3月1日 令和8年3月8日", &ctx(2026, 2, 1, 60));
        assert_eq!(dates, vec![ymd(2026, 3, 8), ymd(2026, 3, 1)]);
    }

    #[test]
    fn test_parse_is_idempotent() {
        let parser = DateTextParser::default();
        let c = ctx(2026, 2, 1, 30);
        let text = "2月7日(土)・14日(土)、2月20日～22日、第1日曜日";
        assert_eq!(parser.parse(text, &c), parser.parse(text, &c));
    }
}
