use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use crate::app::normalize_use_case::NormalizeUseCase;
use crate::app::ports::{CorrectionHook, EventSource, FacilityDirectory, Geocoder, ListingEntry};
use crate::config::{Config, SourceConfig};
use crate::constants::{DEFAULT_FETCH_TIMEOUT_SECONDS, DEFAULT_SOURCE_CONCURRENCY};
use crate::pipeline::ingestion::{run_isolated, Limits, SourceLimiter, TaskOutcome};
use crate::pipeline::processing::normalize::window::WindowFilter;
use crate::pipeline::processing::{Deduplicator, FragmentNormalizer, GeocodeResolver};
use crate::types::{CanonicalEvent, ParsedDetail};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRunSettings {
    /// Detail fetches in flight at once for this source.
    pub concurrency: u32,
    /// Limit for each list or detail fetch.
    pub fetch_timeout: Duration,
}

impl Default for SourceRunSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_SOURCE_CONCURRENCY,
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECONDS),
        }
    }
}

impl From<&SourceConfig> for SourceRunSettings {
    fn from(config: &SourceConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            fetch_timeout: config.fetch_timeout(),
        }
    }
}

#[derive(Clone)]
pub struct ConfiguredSource {
    pub source: Arc<dyn EventSource>,
    pub settings: SourceRunSettings,
}

impl ConfiguredSource {
    /// Settings come from the `[[sources]]` entry with the same key, or the
    /// defaults when the source is not configured.
    pub fn with_config(source: Arc<dyn EventSource>, config: &Config) -> Self {
        let settings = config
            .source(source.source_key())
            .map(SourceRunSettings::from)
            .unwrap_or_default();
        Self { source, settings }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub sources: usize,
    pub sources_failed: usize,
    pub fragments: usize,
    pub details_unavailable: usize,
    pub tasks_failed: usize,
    pub events: usize,
    pub duplicates_dropped: usize,
    pub geocode_degraded: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    pub events: Vec<CanonicalEvent>,
    pub report: RunReport,
}

#[derive(Debug, Default)]
struct SourceHarvest {
    events: Vec<CanonicalEvent>,
    listing_failed: bool,
    fragments: usize,
    details_unavailable: usize,
    tasks_failed: usize,
}

/// One collection run over every configured source.
pub struct CollectUseCase {
    normalize: Arc<NormalizeUseCase>,
    max_days: i64,
}

impl CollectUseCase {
    pub fn new(normalize: Arc<NormalizeUseCase>, max_days: i64) -> Self {
        Self { normalize, max_days }
    }

    pub fn from_config(
        config: &Config,
        geocoder: Arc<dyn Geocoder>,
        facilities: Arc<dyn FacilityDirectory>,
        corrections: Arc<dyn CorrectionHook>,
    ) -> Self {
        let resolver = GeocodeResolver::new(geocoder, facilities, corrections, config.geocode_settings());
        let normalizer = FragmentNormalizer::new(config.range_policy(), config.run.end_time_policy);
        let normalize = NormalizeUseCase::new(normalizer, Arc::new(resolver), config.source_profiles());
        Self::new(Arc::new(normalize), config.run.max_days)
    }

    /// Always returns, possibly with no events. Sources run concurrently and
    /// a failing source only loses its own fragments.
    pub async fn collect(&self, sources: Vec<ConfiguredSource>, now: DateTime<Utc>) -> RunOutput {
        let started = Instant::now();
        let window = WindowFilter::new(now, self.max_days);
        info!(
            "Collecting {} source(s) for {} + {} day(s)",
            sources.len(),
            window.today(),
            window.max_days()
        );

        let mut report = RunReport {
            sources: sources.len(),
            ..Default::default()
        };
        let mut set = JoinSet::new();
        for configured in sources {
            let normalize = self.normalize.clone();
            set.spawn(collect_source(normalize, configured, window));
        }

        let mut dedup = Deduplicator::new();
        while let Some(joined) = set.join_next().await {
            let harvest = match joined {
                Ok(h) => h,
                Err(e) => {
                    warn!("Source task aborted: {}", e);
                    report.sources_failed += 1;
                    continue;
                }
            };
            if harvest.listing_failed {
                report.sources_failed += 1;
            }
            report.fragments += harvest.fragments;
            report.details_unavailable += harvest.details_unavailable;
            report.tasks_failed += harvest.tasks_failed;
            dedup.extend(harvest.events);
        }

        report.duplicates_dropped = dedup.dropped();
        let events = dedup.into_events();
        report.events = events.len();
        report.geocode_degraded = events.iter().filter(|e| e.geocode_degraded).count();
        info!(
            "Collection finished in {:.2}s: {} event(s) from {} fragment(s), {} duplicate(s) dropped",
            started.elapsed().as_secs_f64(),
            report.events,
            report.fragments,
            report.duplicates_dropped
        );
        RunOutput { events, report }
    }
}

#[instrument(skip_all, fields(source = %configured.source.source_key()))]
async fn collect_source(
    normalize: Arc<NormalizeUseCase>,
    configured: ConfiguredSource,
    window: WindowFilter,
) -> SourceHarvest {
    let ConfiguredSource { source, settings } = configured;
    let key = source.source_key().to_string();
    let mut harvest = SourceHarvest::default();

    let listing = match tokio::time::timeout(settings.fetch_timeout, source.fetch_listing()).await {
        Ok(Ok(listing)) => listing,
        Ok(Err(e)) => {
            warn!("Listing fetch failed for {}: {}", key, e);
            harvest.listing_failed = true;
            return harvest;
        }
        Err(_) => {
            warn!("Listing fetch timed out for {} after {:?}", key, settings.fetch_timeout);
            harvest.listing_failed = true;
            return harvest;
        }
    };
    harvest.fragments = listing.len();

    let limiter = SourceLimiter::new(Limits {
        requests_per_min: None,
        concurrency: Some(settings.concurrency),
    });
    let outcomes = run_isolated(listing, &limiter, None, |entry: ListingEntry| {
        let source = source.clone();
        let normalize = normalize.clone();
        let key = key.clone();
        async move {
            let detail = match entry.detail_ref.as_deref() {
                Some(detail_ref) => fetch_detail(source.as_ref(), detail_ref, settings.fetch_timeout).await,
                None => ParsedDetail::Unavailable,
            };
            let unavailable = entry.detail_ref.is_some() && detail == ParsedDetail::Unavailable;
            let mut merged = entry.fragment.with_detail(&detail);
            merged.source_key = key;
            Ok((normalize.normalize_fragment(&merged, &window).await, unavailable))
        }
    })
    .await;

    for outcome in outcomes {
        match outcome {
            TaskOutcome::Ok((events, unavailable)) => {
                harvest.details_unavailable += usize::from(unavailable);
                harvest.events.extend(events);
            }
            TaskOutcome::Failed(_) | TaskOutcome::TimedOut => harvest.tasks_failed += 1,
        }
    }
    info!(
        "Source {}: {} fragment(s) -> {} event(s), {} detail page(s) unavailable",
        key,
        harvest.fragments,
        harvest.events.len(),
        harvest.details_unavailable
    );
    harvest
}

/// A failed or slow detail page degrades to list-page data only.
async fn fetch_detail(source: &dyn EventSource, detail_ref: &str, limit: Duration) -> ParsedDetail {
    match tokio::time::timeout(limit, source.fetch_detail(detail_ref)).await {
        Ok(Ok(fields)) => ParsedDetail::Page(fields),
        Ok(Err(e)) => {
            warn!("Detail fetch failed for {}: {}", detail_ref, e);
            ParsedDetail::Unavailable
        }
        Err(_) => {
            warn!("Detail fetch timed out for {}", detail_ref);
            ParsedDetail::Unavailable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::{CorrectionHook, FacilityDirectory, Geocoder};
    use crate::error::{EngineError, Result};
    use crate::pipeline::processing::GeocodeSettings;
    use crate::types::{DetailFields, GeoPoint, RawFragment};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::HashMap;

    struct MissGeocoder;

    #[async_trait]
    impl Geocoder for MissGeocoder {
        async fn geocode(&self, _: &str) -> Result<Option<GeoPoint>> {
            Ok(None)
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

    struct FakeSource {
        key: String,
        entries: Vec<ListingEntry>,
        fail_listing: bool,
    }

    #[async_trait]
    impl EventSource for FakeSource {
        fn source_key(&self) -> &str {
            &self.key
        }

        async fn fetch_listing(&self) -> Result<Vec<ListingEntry>> {
            if self.fail_listing {
                return Err(EngineError::Source {
                    source_key: self.key.clone(),
                    message: "503".to_string(),
                });
            }
            Ok(self.entries.clone())
        }

        async fn fetch_detail(&self, detail_ref: &str) -> Result<DetailFields> {
            match detail_ref {
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(DetailFields::default())
                }
                "broken" => Err(EngineError::Source {
                    source_key: self.key.clone(),
                    message: "404".to_string(),
                }),
                _ => Ok(DetailFields {
                    time_text: Some("13:00～14:00".to_string()),
                    ..Default::default()
                }),
            }
        }
    }

    fn entry(title: &str, date_text: &str, detail_ref: Option<&str>) -> ListingEntry {
        ListingEntry {
            fragment: RawFragment {
                title: title.to_string(),
                date_text: date_text.to_string(),
                url: format!("https://x.lg.jp/{title}"),
                ..Default::default()
            },
            detail_ref: detail_ref.map(str::to_string),
        }
    }

    fn configured(source: FakeSource) -> ConfiguredSource {
        ConfiguredSource {
            source: Arc::new(source),
            settings: SourceRunSettings {
                concurrency: 2,
                fetch_timeout: Duration::from_millis(200),
            },
        }
    }

    fn use_case() -> CollectUseCase {
        let resolver = GeocodeResolver::new(
            Arc::new(MissGeocoder),
            Arc::new(NoTables),
            Arc::new(NoTables),
            GeocodeSettings::default(),
        );
        let normalize = NormalizeUseCase::new(FragmentNormalizer::default(), Arc::new(resolver), HashMap::new());
        CollectUseCase::new(Arc::new(normalize), 30)
    }

    #[tokio::test]
    async fn test_detail_failures_degrade_to_list_data() {
        let source = FakeSource {
            key: "x".to_string(),
            entries: vec![
                entry("工作教室", "2月7日", Some("ok")),
                entry("読み聞かせ", "2月8日", Some("slow")),
                entry("体操", "2月9日", Some("broken")),
                entry("講演会", "2月10日", None),
            ],
            fail_listing: false,
        };
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let out = use_case().collect(vec![configured(source)], now).await;

        assert_eq!(out.events.len(), 4);
        assert_eq!(out.report.details_unavailable, 2);
        assert_eq!(out.events[0].starts_at, "2026-02-07T13:00:00+09:00");
        assert!(out.events[1].time_unknown);
        assert!(out.events.iter().all(|e| e.source == "x"));
    }

    #[tokio::test]
    async fn test_failing_source_does_not_stop_the_run() {
        let broken = FakeSource {
            key: "down".to_string(),
            entries: Vec::new(),
            fail_listing: true,
        };
        let healthy = FakeSource {
            key: "up".to_string(),
            entries: vec![entry("講座", "2月7日", None), entry("講座", "2月7日", None)],
            fail_listing: false,
        };
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let out = use_case().collect(vec![configured(broken), configured(healthy)], now).await;

        assert_eq!(out.report.sources_failed, 1);
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.report.duplicates_dropped, 1);
    }

    #[tokio::test]
    async fn test_no_sources_is_an_empty_run() {
        let out = use_case().collect(Vec::new(), Utc::now()).await;
        assert!(out.events.is_empty());
        assert_eq!(out.report, RunReport::default());
    }
}
