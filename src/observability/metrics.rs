//! Counters for a collection run.
//!
//! Recording goes through the `metrics` facade, so every function here is a
//! no-op until [`init`] installs the Prometheus recorder. Library users and
//! tests can call them freely.

use std::fmt;
use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::error::{EngineError, Result};

/// All metric names used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    FragmentsTotal,
    FragmentsDropped,
    DatesOutOfWindow,
    GeocodeTotal,
    DedupDropped,
    TasksTotal,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::FragmentsTotal => "muni_fragments_total",
            MetricName::FragmentsDropped => "muni_fragments_dropped_total",
            MetricName::DatesOutOfWindow => "muni_dates_out_of_window_total",
            MetricName::GeocodeTotal => "muni_geocode_total",
            MetricName::DedupDropped => "muni_dedup_dropped_total",
            MetricName::TasksTotal => "muni_tasks_total",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        [
            MetricName::FragmentsTotal,
            MetricName::FragmentsDropped,
            MetricName::DatesOutOfWindow,
            MetricName::GeocodeTotal,
            MetricName::DedupDropped,
            MetricName::TasksTotal,
        ]
        .into_iter()
    }

    pub fn help(&self) -> &'static str {
        match self {
            MetricName::FragmentsTotal => "Raw fragments seen by the normalizer",
            MetricName::FragmentsDropped => "Fragments that produced no event",
            MetricName::DatesOutOfWindow => "Parsed dates outside the collection window",
            MetricName::GeocodeTotal => "Venue resolutions by outcome",
            MetricName::DedupDropped => "Events dropped as duplicates",
            MetricName::TasksTotal => "Fan-out tasks by outcome",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Calling it twice is an error.
pub fn init() -> Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| EngineError::Config(format!("Failed to install Prometheus recorder: {e}")))?;
    for name in MetricName::all_metrics() {
        ::metrics::describe_counter!(name.as_str(), name.help());
    }
    METRICS_HANDLE.set(handle).ok();
    info!("Metrics system initialized");
    Ok(())
}

/// Prometheus text exposition of everything recorded so far.
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

pub mod normalize {
    use super::MetricName;

    pub fn fragment_seen(source_key: &str) {
        ::metrics::counter!(MetricName::FragmentsTotal.as_str(), "source" => source_key.to_string())
            .increment(1);
    }

    /// `reason` is one of `no_title`, `no_dates`, `out_of_window`.
    pub fn fragment_dropped(source_key: &str, reason: &'static str) {
        ::metrics::counter!(
            MetricName::FragmentsDropped.as_str(),
            "source" => source_key.to_string(),
            "reason" => reason
        )
        .increment(1);
    }

    pub fn dates_out_of_window(source_key: &str, count: u64) {
        if count == 0 {
            return;
        }
        ::metrics::counter!(MetricName::DatesOutOfWindow.as_str(), "source" => source_key.to_string())
            .increment(count);
    }
}

pub mod geocode {
    use super::MetricName;

    fn outcome(outcome: &'static str) {
        ::metrics::counter!(MetricName::GeocodeTotal.as_str(), "outcome" => outcome).increment(1);
    }

    pub fn cache_hit() {
        outcome("cache_hit");
    }

    pub fn resolved() {
        outcome("resolved");
    }

    pub fn corrected() {
        outcome("corrected");
    }

    pub fn degraded() {
        outcome("degraded");
    }

    pub fn candidate_failed() {
        outcome("candidate_failed");
    }
}

pub mod dedupe {
    use super::MetricName;

    pub fn duplicate_dropped() {
        ::metrics::counter!(MetricName::DedupDropped.as_str()).increment(1);
    }
}

pub mod tasks {
    use super::MetricName;

    /// `outcome` is one of `ok`, `failed`, `timed_out`.
    pub fn finished(outcome: &'static str) {
        ::metrics::counter!(MetricName::TasksTotal.as_str(), "outcome" => outcome).increment(1);
    }
}
