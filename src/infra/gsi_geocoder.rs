use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::app::ports::Geocoder;
use crate::config::GeocoderConfig;
use crate::error::{EngineError, Result};
use crate::pipeline::ingestion::{Limits, SourceLimiter};
use crate::types::GeoPoint;

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    /// `[lng, lat]`
    coordinates: Vec<f64>,
}

/// GSI address search (`GET {endpoint}?q=...`). The first feature wins.
pub struct GsiGeocoder {
    client: reqwest::Client,
    endpoint: String,
    limiter: SourceLimiter,
}

impl GsiGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .user_agent(concat!("muni_events/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let requests_per_min = Some(config.requests_per_min).filter(|rpm| *rpm > 0);
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            limiter: SourceLimiter::new(Limits {
                requests_per_min,
                concurrency: Some(2),
            }),
        })
    }
}

/// First feature's coordinates, swapped into `lat`/`lng` order.
fn first_point(body: &str) -> Result<Option<GeoPoint>> {
    let features: Vec<Feature> = serde_json::from_str(body)?;
    Ok(features.into_iter().find_map(|f| match f.geometry.coordinates.as_slice() {
        [lng, lat, ..] => Some(GeoPoint::new(*lat, *lng)),
        _ => None,
    }))
}

#[async_trait]
impl Geocoder for GsiGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<GeoPoint>> {
        let _permit = self.limiter.acquire().await;
        let resp = self.client.get(&self.endpoint).query(&[("q", query)]).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(EngineError::Geocoder {
                message: format!("GSI responded with status {} for '{}'", status.as_u16(), query),
            });
        }
        let body = resp.text().await?;
        let point = first_point(&body)?;
        debug!("GSI '{}' -> {:?}", query, point);
        Ok(point)
    }
}

/// Never resolves anything; every venue degrades to its source's default.
pub struct NullGeocoder;

#[async_trait]
impl Geocoder for NullGeocoder {
    async fn geocode(&self, _query: &str) -> Result<Option<GeoPoint>> {
        Ok(None)
    }
}
