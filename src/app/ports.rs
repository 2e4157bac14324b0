use async_trait::async_trait;

use crate::error::Result;
use crate::types::{DetailFields, GeoPoint, RawFragment};

/// Turns one free-text query into a point. `Ok(None)` is a plain miss.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, query: &str) -> Result<Option<GeoPoint>>;
}

/// Per-source facility master: venue name to street address.
pub trait FacilityDirectory: Send + Sync {
    fn lookup(&self, source_key: &str, venue_name: &str) -> Option<String>;
}

/// Per-source known-good points that replace whatever the geocoder said.
pub trait CorrectionHook: Send + Sync {
    fn correct(&self, source_key: &str, venue_name: &str, resolved: GeoPoint) -> Option<GeoPoint>;
}

/// One row of a source's list page. `detail_ref` is opaque to the engine
/// and handed back to [`EventSource::fetch_detail`].
#[derive(Debug, Clone, Default)]
pub struct ListingEntry {
    pub fragment: RawFragment,
    pub detail_ref: Option<String>,
}

/// A municipal site: a list tier and an optional detail tier.
#[async_trait]
pub trait EventSource: Send + Sync {
    fn source_key(&self) -> &str;

    async fn fetch_listing(&self) -> Result<Vec<ListingEntry>>;

    async fn fetch_detail(&self, detail_ref: &str) -> Result<DetailFields>;
}
