//! Venue to coordinates, with a run-scoped cache and a per-source fallback.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use regex::Regex;
use tracing::{debug, warn};

use super::sanitize::SanitizedVenue;
use crate::app::ports::{CorrectionHook, FacilityDirectory, Geocoder};
use crate::constants::{
    DEFAULT_GEOCODER_TIMEOUT_SECONDS, DEFAULT_GEOCODE_CANDIDATES, MAX_GEOCODE_CANDIDATES,
    MIN_GEOCODE_CANDIDATES,
};
use crate::observability::metrics;
use crate::types::{GeoPoint, SourceProfile};

const LOCAL_PREFIXES: [&str; 4] = ["市内", "町内", "村内", "区内"];

const PREFECTURES: [&str; 47] = [
    "北海道", "青森県", "岩手県", "宮城県", "秋田県", "山形県", "福島県", "茨城県", "栃木県", "群馬県",
    "埼玉県", "千葉県", "東京都", "神奈川県", "新潟県", "富山県", "石川県", "福井県", "山梨県", "長野県",
    "岐阜県", "静岡県", "愛知県", "三重県", "滋賀県", "京都府", "大阪府", "兵庫県", "奈良県", "和歌山県",
    "鳥取県", "島根県", "岡山県", "広島県", "山口県", "徳島県", "香川県", "愛媛県", "高知県", "福岡県",
    "佐賀県", "長崎県", "熊本県", "大分県", "宮崎県", "鹿児島県", "沖縄県",
];

/// End in 区 without naming a ward.
const NOT_WARDS: [&str; 3] = ["地区", "学区", "校区"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeocodeSettings {
    pub max_candidates: usize,
    pub timeout: Duration,
}

impl GeocodeSettings {
    pub fn new(max_candidates: usize, timeout: Duration) -> Self {
        Self {
            max_candidates: max_candidates.clamp(MIN_GEOCODE_CANDIDATES, MAX_GEOCODE_CANDIDATES),
            timeout,
        }
    }
}

impl Default for GeocodeSettings {
    fn default() -> Self {
        Self::new(
            DEFAULT_GEOCODE_CANDIDATES,
            Duration::from_secs(DEFAULT_GEOCODER_TIMEOUT_SECONDS),
        )
    }
}

/// What a venue resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// `None` only when the source has no default center configured.
    pub point: Option<GeoPoint>,
    /// The point is the source's default center, not the venue.
    pub degraded: bool,
    /// Candidate that succeeded.
    pub query: Option<String>,
}

impl Resolution {
    fn fallback(source: &SourceProfile) -> Self {
        Self {
            point: source.default_center,
            degraded: true,
            query: None,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedPoint {
    point: GeoPoint,
    query: String,
}

pub struct GeocodeResolver {
    geocoder: Arc<dyn Geocoder>,
    facilities: Arc<dyn FacilityDirectory>,
    corrections: Arc<dyn CorrectionHook>,
    settings: GeocodeSettings,
    cache: Mutex<HashMap<(String, String), CachedPoint>>,
}

impl GeocodeResolver {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        facilities: Arc<dyn FacilityDirectory>,
        corrections: Arc<dyn CorrectionHook>,
        settings: GeocodeSettings,
    ) -> Self {
        Self {
            geocoder,
            facilities,
            corrections,
            settings,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Facility master address for a venue, if the source lists one.
    pub fn facility_address(&self, source: &SourceProfile, venue: &SanitizedVenue) -> Option<String> {
        if !venue.has_name() {
            return None;
        }
        self.facilities.lookup(&source.key, &venue.name)
    }

    /// Ordered, deduplicated and capped geocoder queries for a venue.
    pub fn candidates(&self, source: &SourceProfile, venue: &SanitizedVenue, address: &str) -> Vec<String> {
        let mut ordered = Vec::new();
        if let Some(master) = self.facility_address(source, venue) {
            ordered.push(qualify(source, &master));
        }
        if let Some(embedded) = &venue.embedded_address {
            ordered.push(qualify(source, embedded));
        }
        if !address.trim().is_empty() {
            ordered.push(qualify(source, address));
        }
        if venue.has_name() {
            ordered.push(qualify(source, &venue.name));
        }

        let mut out: Vec<String> = Vec::with_capacity(ordered.len());
        for candidate in ordered {
            if !candidate.is_empty() && !out.contains(&candidate) {
                out.push(candidate);
            }
        }
        out.truncate(self.settings.max_candidates);
        out
    }

    /// Hand candidates to the geocoder one at a time until one lands.
    /// Errors, timeouts and implausible points are misses for that
    /// candidate only.
    pub async fn resolve_candidates(&self, candidates: &[String]) -> Option<(GeoPoint, String)> {
        for query in candidates {
            match tokio::time::timeout(self.settings.timeout, self.geocoder.geocode(query)).await {
                Ok(Ok(Some(point))) if point.is_plausible() => return Some((point, query.clone())),
                Ok(Ok(Some(point))) => {
                    debug!("Ignoring implausible point {:?} for '{}'", point, query);
                }
                Ok(Ok(None)) => debug!("No geocode result for '{}'", query),
                Ok(Err(e)) => debug!("Geocoder failed for '{}': {}", query, e),
                Err(_) => debug!("Geocoder timed out for '{}'", query),
            }
            metrics::geocode::candidate_failed();
        }
        None
    }

    /// Resolve a venue, falling back to the source's default center. Never
    /// fails.
    pub async fn resolve(&self, source: &SourceProfile, venue: &SanitizedVenue, address: &str) -> Resolution {
        let key = cache_key(source, venue, address);
        if let Some(hit) = key.as_ref().and_then(|k| self.cached(k)) {
            metrics::geocode::cache_hit();
            return Resolution {
                point: Some(hit.point),
                degraded: false,
                query: Some(hit.query),
            };
        }

        let candidates = self.candidates(source, venue, address);
        let Some((point, query)) = self.resolve_candidates(&candidates).await else {
            metrics::geocode::degraded();
            warn!(
                "Geocoding exhausted {} candidate(s) for '{}' ({}); using default center",
                candidates.len(),
                venue.name,
                source.key
            );
            return Resolution::fallback(source);
        };

        let point = match self.corrections.correct(&source.key, &venue.name, point) {
            Some(corrected) => {
                metrics::geocode::corrected();
                debug!("Applied correction for '{}' ({})", venue.name, source.key);
                corrected
            }
            None => {
                metrics::geocode::resolved();
                point
            }
        };

        if let Some(key) = key {
            if let Ok(mut cache) = self.cache.lock() {
                cache.insert(key, CachedPoint { point, query: query.clone() });
            }
        }
        Resolution {
            point: Some(point),
            degraded: false,
            query: Some(query),
        }
    }

    fn cached(&self, key: &(String, String)) -> Option<CachedPoint> {
        self.cache.lock().ok().and_then(|cache| cache.get(key).cloned())
    }
}

/// Venues are cached by name; a nameless venue falls back to its address.
fn cache_key(source: &SourceProfile, venue: &SanitizedVenue, address: &str) -> Option<(String, String)> {
    if venue.has_name() {
        return Some((source.key.clone(), venue.name.clone()));
    }
    let address = venue.embedded_address.as_deref().unwrap_or(address).trim();
    if address.is_empty() {
        None
    } else {
        Some((source.key.clone(), format!("@{address}")))
    }
}

/// Prefix a query with the source's prefecture and municipality unless it
/// already names them. `市内中央町` means "中央町 in this city".
pub fn qualify(source: &SourceProfile, text: &str) -> String {
    let mut text = text.trim();
    let mut local = false;
    for prefix in LOCAL_PREFIXES {
        if let Some(rest) = text.strip_prefix(prefix) {
            text = rest.trim_start();
            local = true;
            break;
        }
    }
    if text.is_empty() {
        return String::new();
    }
    if names_prefecture(text) || (!source.prefecture.is_empty() && text.starts_with(&source.prefecture)) {
        return text.to_string();
    }
    let municipality = &source.municipality;
    if !municipality.is_empty() && text.starts_with(municipality.as_str()) {
        return format!("{}{}", source.prefecture, text);
    }
    if !local && names_municipality(text) {
        return format!("{}{}", source.prefecture, text);
    }
    format!("{}{}{}", source.prefecture, municipality, text)
}

fn names_prefecture(text: &str) -> bool {
    PREFECTURES.iter().any(|p| text.starts_with(p))
}

fn municipality_prefix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[\p{Han}\p{Hiragana}\p{Katakana}ー]{1,5}?[市区郡]")
            .unwrap_or_else(|e| panic!("invalid municipality pattern: {e}"))
    })
}

/// `横浜市…`, `さいたま市…`, `中央区…`. Facility words such as `市民…`
/// or `地区センター` do not count.
fn names_municipality(text: &str) -> bool {
    let Some(m) = municipality_prefix().find(text) else {
        return false;
    };
    !NOT_WARDS.contains(&m.as_str()) && !text[m.end()..].starts_with('民')
}
