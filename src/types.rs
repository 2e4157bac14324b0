use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// A civil date on the JST calendar. Never carries a time of day.
///
/// Fields are ordered year, month, day so the derived ordering is
/// chronological. Construction always goes through a validity check, so a
/// `CalendarDate` is never February 30th.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CalendarDate {
    y: i32,
    mo: u32,
    d: u32,
}

impl CalendarDate {
    pub fn new(y: i32, mo: u32, d: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(y, mo, d).map(Self::from_naive)
    }

    pub fn from_naive(date: NaiveDate) -> Self {
        Self {
            y: date.year(),
            mo: date.month(),
            d: date.day(),
        }
    }

    pub fn naive(&self) -> NaiveDate {
        // Validated at construction
        NaiveDate::from_ymd_opt(self.y, self.mo, self.d).unwrap_or_default()
    }

    pub fn weekday(&self) -> Weekday {
        self.naive().weekday()
    }

    /// Eight digit `YYYYMMDD` key used in event identities.
    pub fn date_key(&self) -> String {
        format!("{:04}{:02}{:02}", self.y, self.mo, self.d)
    }
}

impl std::fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.y, self.mo, self.d)
    }
}

/// Start and optional end time of day. Absence of a whole `TimeRange`
/// (`Option::None`) means the event time is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_hour: u32,
    pub start_minute: u32,
    pub end_hour: Option<u32>,
    pub end_minute: Option<u32>,
}

impl TimeRange {
    pub fn starting(hour: u32, minute: u32) -> Self {
        Self {
            start_hour: hour,
            start_minute: minute,
            end_hour: None,
            end_minute: None,
        }
    }

    pub fn with_end(mut self, hour: u32, minute: u32) -> Self {
        self.end_hour = Some(hour);
        self.end_minute = Some(minute);
        self
    }

    pub fn end(&self) -> Option<(u32, u32)> {
        self.end_hour.map(|h| (h, self.end_minute.unwrap_or(0)))
    }
}

/// Text fragments handed over by a site scraper. Any field may be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawFragment {
    pub title: String,
    #[serde(alias = "date_text")]
    pub date_text: String,
    #[serde(alias = "time_text")]
    pub time_text: String,
    #[serde(alias = "venue_text")]
    pub venue_text: String,
    #[serde(alias = "address_text")]
    pub address_text: String,
    #[serde(alias = "source_key")]
    pub source_key: String,
    pub url: String,
}

impl RawFragment {
    /// Overlay the non-blank fields of a detail page onto list-page data.
    /// An unavailable detail leaves the list-page fragment as is.
    pub fn with_detail(&self, detail: &ParsedDetail) -> RawFragment {
        let mut merged = self.clone();
        if let ParsedDetail::Page(fields) = detail {
            overlay(&mut merged.venue_text, fields.venue.as_deref());
            overlay(&mut merged.address_text, fields.address.as_deref());
            overlay(&mut merged.date_text, fields.date_text.as_deref());
            overlay(&mut merged.time_text, fields.time_text.as_deref());
        }
        merged
    }
}

fn overlay(target: &mut String, value: Option<&str>) {
    if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
        *target = v.to_string();
    }
}

/// What a detail page fetch produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedDetail {
    /// The fetch failed, timed out, or the source has no detail pages.
    Unavailable,
    Page(DetailFields),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetailFields {
    pub venue: Option<String>,
    pub address: Option<String>,
    #[serde(alias = "date_text")]
    pub date_text: Option<String>,
    #[serde(alias = "time_text")]
    pub time_text: Option<String>,
}

/// A fragment as stored in an input file: list-page data plus an optional
/// detail record captured by the scraper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FragmentInput {
    #[serde(flatten)]
    pub fragment: RawFragment,
    #[serde(default)]
    pub detail: Option<DetailFields>,
}

impl FragmentInput {
    pub fn parsed_detail(&self) -> ParsedDetail {
        match &self.detail {
            Some(fields) => ParsedDetail::Page(fields.clone()),
            None => ParsedDetail::Unavailable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Finite, inside WGS84 bounds, and not the null island.
    pub fn is_plausible(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
            && !(self.lat == 0.0 && self.lng == 0.0)
    }
}

/// Static description of one municipal site.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceProfile {
    pub key: String,
    pub label: String,
    pub prefecture: String,
    pub municipality: String,
    pub default_center: Option<GeoPoint>,
}

impl SourceProfile {
    /// Profile for a fragment whose source is not configured.
    pub fn unknown(key: &str) -> Self {
        Self {
            key: key.to_string(),
            label: key.to_string(),
            ..Default::default()
        }
    }
}

/// The output record of a collection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub id: String,
    pub source: String,
    pub source_label: String,
    pub title: String,
    pub starts_at: String,
    pub ends_at: Option<String>,
    pub venue_name: Option<String>,
    pub address: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub time_unknown: bool,
    pub url: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub geocode_degraded: bool,
}

fn is_false(v: &bool) -> bool {
    !*v
}
