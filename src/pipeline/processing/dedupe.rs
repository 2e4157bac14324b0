use std::collections::HashMap;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::observability::metrics;
use crate::types::{CalendarDate, CanonicalEvent};

/// Deterministic event identity: sha256 over source, url, title and date.
pub fn identity_key(source_key: &str, url: &str, title: &str, date: &CalendarDate) -> String {
    let mut s = String::new();
    s.push_str(source_key);
    s.push('|');
    s.push_str(&canonical_url(url));
    s.push('|');
    s.push_str(&canonical_title(title));
    s.push('|');
    s.push_str(&date.date_key());

    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

/// Trimmed, without `#fragment` and without a trailing `/`.
pub fn canonical_url(url: &str) -> String {
    let url = url.trim();
    let url = url.split_once('#').map_or(url, |(head, _)| head);
    url.trim_end_matches('/').to_string()
}

fn canonical_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keeps the first event seen per id.
#[derive(Debug, Default)]
pub struct Deduplicator {
    events: HashMap<String, CanonicalEvent>,
    dropped: usize,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `false` when an event with the same id was already kept.
    pub fn insert(&mut self, event: CanonicalEvent) -> bool {
        if self.events.contains_key(&event.id) {
            debug!("Dropping duplicate event {} ({})", event.id, event.title);
            metrics::dedupe::duplicate_dropped();
            self.dropped += 1;
            return false;
        }
        self.events.insert(event.id.clone(), event);
        true
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = CanonicalEvent>) {
        for event in events {
            self.insert(event);
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Kept events ordered by `(starts_at, id)`.
    pub fn into_events(self) -> Vec<CanonicalEvent> {
        let mut events: Vec<CanonicalEvent> = self.events.into_values().collect();
        events.sort_by(|a, b| a.starts_at.cmp(&b.starts_at).then_with(|| a.id.cmp(&b.id)));
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> CalendarDate {
        CalendarDate::new(y, m, d).unwrap()
    }

    fn event(id: &str, starts_at: &str, title: &str) -> CanonicalEvent {
        CanonicalEvent {
            id: id.to_string(),
            source: "x".to_string(),
            source_label: "X市".to_string(),
            title: title.to_string(),
            starts_at: starts_at.to_string(),
            ends_at: None,
            venue_name: None,
            address: None,
            lat: None,
            lng: None,
            time_unknown: true,
            url: String::new(),
            geocode_degraded: false,
        }
    }

    #[test]
    fn test_identity_is_deterministic_hex() {
        let d = date(2026, 2, 7);
        let a = identity_key("x", "https://x.lg.jp/e/1", "親子体操", &d);
        assert_eq!(a, identity_key("x", "https://x.lg.jp/e/1", "親子体操", &d));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_identity_ignores_cosmetic_differences() {
        let d = date(2026, 2, 7);
        let a = identity_key("x", "https://x.lg.jp/e/1", "親子 体操", &d);
        let b = identity_key("x", " https://x.lg.jp/e/1/#top ", "親子  体操 ", &d);
        assert_eq!(a, b);
    }

    #[test]
    fn test_identity_separates_sources_and_dates() {
        let d = date(2026, 2, 7);
        let a = identity_key("x", "u", "t", &d);
        assert_ne!(a, identity_key("y", "u", "t", &d));
        assert_ne!(a, identity_key("x", "u", "t", &date(2026, 2, 14)));
    }

    #[test]
    fn test_first_insert_wins() {
        let mut dedup = Deduplicator::new();
        assert!(dedup.insert(event("a", "2026-02-07T10:00:00+09:00", "first")));
        assert!(!dedup.insert(event("a", "2026-02-07T10:00:00+09:00", "second")));
        assert_eq!(dedup.len(), 1);
        assert_eq!(dedup.dropped(), 1);
        assert_eq!(dedup.into_events()[0].title, "first");
    }

    #[test]
    fn test_output_sorted_by_start_then_id() {
        let mut dedup = Deduplicator::new();
        dedup.extend([
            event("b", "2026-02-08T00:00:00+09:00", "t"),
            event("c", "2026-02-07T10:00:00+09:00", "t"),
            event("a", "2026-02-08T00:00:00+09:00", "t"),
        ]);
        let ids: Vec<String> = dedup.into_events().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }
}
