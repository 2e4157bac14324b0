use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::observability::metrics;
use crate::pipeline::processing::normalize::window::WindowFilter;
use crate::pipeline::processing::{identity_key, FragmentNormalizer, GeocodeResolver, VenueAddressSanitizer};
use crate::types::{CanonicalEvent, RawFragment, SourceProfile};

/// Turns one merged fragment into zero or more canonical events.
pub struct NormalizeUseCase {
    normalizer: FragmentNormalizer,
    sanitizer: VenueAddressSanitizer,
    resolver: Arc<GeocodeResolver>,
    profiles: HashMap<String, SourceProfile>,
}

impl NormalizeUseCase {
    pub fn new(
        normalizer: FragmentNormalizer,
        resolver: Arc<GeocodeResolver>,
        profiles: HashMap<String, SourceProfile>,
    ) -> Self {
        Self {
            normalizer,
            sanitizer: VenueAddressSanitizer::new(),
            resolver,
            profiles,
        }
    }

    pub fn profile(&self, source_key: &str) -> SourceProfile {
        self.profiles
            .get(source_key)
            .cloned()
            .unwrap_or_else(|| SourceProfile::unknown(source_key))
    }

    /// Never fails: a fragment that cannot be dated yields no events, and a
    /// venue that cannot be located degrades to the source's default center.
    #[instrument(skip(self, fragment, window), fields(source = %fragment.source_key))]
    pub async fn normalize_fragment(&self, fragment: &RawFragment, window: &WindowFilter) -> Vec<CanonicalEvent> {
        metrics::normalize::fragment_seen(&fragment.source_key);
        let normalized = self.normalizer.normalize(fragment, window);
        metrics::normalize::dates_out_of_window(&fragment.source_key, normalized.out_of_window as u64);
        if let Some(reason) = normalized.drop_reason() {
            debug!("Dropping fragment '{}': {}", fragment.title, reason);
            metrics::normalize::fragment_dropped(&fragment.source_key, reason);
            return Vec::new();
        }

        let profile = self.profile(&fragment.source_key);
        let venue = self.sanitizer.sanitize_venue(&fragment.venue_text);
        let raw_address = self.sanitizer.sanitize_address(&fragment.address_text);
        let resolution = self.resolver.resolve(&profile, &venue, &raw_address).await;

        let address = self
            .resolver
            .facility_address(&profile, &venue)
            .or_else(|| venue.embedded_address.clone())
            .or_else(|| Some(raw_address).filter(|a| !a.is_empty()));
        let venue_name = Some(venue.name.clone()).filter(|n| !n.is_empty());

        normalized
            .drafts
            .into_iter()
            .map(|draft| CanonicalEvent {
                id: identity_key(&fragment.source_key, &fragment.url, &normalized.title, &draft.date),
                source: profile.key.clone(),
                source_label: profile.label.clone(),
                title: normalized.title.clone(),
                starts_at: draft.times.starts_at,
                ends_at: draft.times.ends_at,
                venue_name: venue_name.clone(),
                address: address.clone(),
                lat: resolution.point.map(|p| p.lat),
                lng: resolution.point.map(|p| p.lng),
                time_unknown: draft.times.time_unknown,
                url: fragment.url.trim().to_string(),
                geocode_degraded: resolution.degraded,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::{CorrectionHook, FacilityDirectory, Geocoder};
    use crate::pipeline::processing::GeocodeSettings;
    use crate::types::GeoPoint;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    struct EverywhereGeocoder;

    #[async_trait]
    impl Geocoder for EverywhereGeocoder {
        async fn geocode(&self, query: &str) -> crate::error::Result<Option<GeoPoint>> {
            Ok(query.contains("中央町").then(|| GeoPoint::new(35.7, 139.7)))
        }
    }

    struct NoTables;

    impl FacilityDirectory for NoTables {
        fn lookup(&self, _: &str, _: &str) -> Option<String> {
            None
        }
    }

    impl CorrectionHook for NoTables {
        fn correct(&self, _: &str, _: &str, _: GeoPoint) -> Option<GeoPoint> {
            None
        }
    }

    fn use_case() -> NormalizeUseCase {
        let resolver = GeocodeResolver::new(
            Arc::new(EverywhereGeocoder),
            Arc::new(NoTables),
            Arc::new(NoTables),
            GeocodeSettings::default(),
        );
        let mut profiles = HashMap::new();
        profiles.insert(
            "x".to_string(),
            SourceProfile {
                key: "x".to_string(),
                label: "X市".to_string(),
                prefecture: "東京都".to_string(),
                municipality: "X市".to_string(),
                default_center: Some(GeoPoint::new(35.0, 139.0)),
            },
        );
        NormalizeUseCase::new(FragmentNormalizer::default(), Arc::new(resolver), profiles)
    }

    fn window() -> WindowFilter {
        WindowFilter::from_today(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(), 30)
    }

    #[tokio::test]
    async fn test_fragment_to_events() {
        let fragment = RawFragment {
            title: "親子体操".to_string(),
            date_text: "2月7日(土)・14日(土)".to_string(),
            time_text: "10:30～11:30".to_string(),
            venue_text: "児童館（市内中央町1-2-3）".to_string(),
            source_key: "x".to_string(),
            ..Default::default()
        };
        let events = use_case().normalize_fragment(&fragment, &window()).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].venue_name.as_deref(), Some("児童館"));
        assert_eq!(events[0].address.as_deref(), Some("市内中央町1-2-3"));
        assert_eq!(events[0].lat, Some(35.7));
        assert_eq!(events[0].source_label, "X市");
        assert!(!events[0].geocode_degraded);
        assert_ne!(events[0].id, events[1].id);
    }

    #[tokio::test]
    async fn test_unknown_source_and_unlocatable_venue() {
        let fragment = RawFragment {
            title: "おはなし会".to_string(),
            date_text: "2月20日".to_string(),
            venue_text: "会議室".to_string(),
            source_key: "nowhere".to_string(),
            ..Default::default()
        };
        let events = use_case().normalize_fragment(&fragment, &window()).await;
        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.source_label, "nowhere");
        assert_eq!(e.venue_name, None);
        assert_eq!(e.lat, None);
        assert!(e.geocode_degraded);
        assert!(e.time_unknown);
    }

    #[tokio::test]
    async fn test_undated_fragment_yields_nothing() {
        let fragment = RawFragment {
            title: "随時受付".to_string(),
            source_key: "x".to_string(),
            ..Default::default()
        };
        assert!(use_case().normalize_fragment(&fragment, &window()).await.is_empty());
    }
}
