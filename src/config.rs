use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::constants::{
    CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH, DEFAULT_FETCH_TIMEOUT_SECONDS, DEFAULT_GEOCODER_TIMEOUT_SECONDS,
    DEFAULT_GEOCODE_CANDIDATES, DEFAULT_MAX_DAYS, DEFAULT_SOURCE_CONCURRENCY, GSI_ADDRESS_SEARCH_URL, MAX_DAYS_ENV,
};
use crate::error::{EngineError, Result};
use crate::pipeline::processing::geocode::GeocodeSettings;
use crate::pipeline::processing::normalize::assemble::EndTimePolicy;
use crate::pipeline::processing::normalize::dates::RangePolicy;
use crate::types::{GeoPoint, SourceProfile};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub run: RunConfig,
    pub geocoder: GeocoderConfig,
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub max_days: i64,
    pub end_time_policy: EndTimePolicy,
    pub range_expand_max_days: i64,
    pub range_indefinite_after_days: i64,
}

impl Default for RunConfig {
    fn default() -> Self {
        let range = RangePolicy::default();
        Self {
            max_days: DEFAULT_MAX_DAYS,
            end_time_policy: EndTimePolicy::default(),
            range_expand_max_days: range.expand_max_days,
            range_indefinite_after_days: range.indefinite_after_days,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub endpoint: String,
    pub timeout_seconds: u64,
    pub max_candidates: usize,
    /// 0 disables the request budget.
    pub requests_per_min: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            endpoint: GSI_ADDRESS_SEARCH_URL.to_string(),
            timeout_seconds: DEFAULT_GEOCODER_TIMEOUT_SECONDS,
            max_candidates: DEFAULT_GEOCODE_CANDIDATES,
            requests_per_min: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub prefecture: String,
    #[serde(default)]
    pub municipality: String,
    #[serde(default)]
    pub default_center: Option<GeoPoint>,
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_seconds: u64,
    /// Facility master: venue name to address.
    #[serde(default)]
    pub facilities: BTreeMap<String, String>,
    /// Known-good points by venue name.
    #[serde(default)]
    pub corrections: BTreeMap<String, GeoPoint>,
}

fn default_concurrency() -> u32 {
    DEFAULT_SOURCE_CONCURRENCY
}

fn default_fetch_timeout() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECONDS
}

impl SourceConfig {
    pub fn profile(&self) -> SourceProfile {
        SourceProfile {
            key: self.key.clone(),
            label: if self.label.is_empty() { self.key.clone() } else { self.label.clone() },
            prefecture: self.prefecture.clone(),
            municipality: self.municipality.clone(),
            default_center: self.default_center,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds.max(1))
    }
}

impl Config {
    /// Path from the CLI, else `MUNI_EVENTS_CONFIG`, else `config.toml`.
    pub fn resolve_path(cli: Option<&Path>) -> PathBuf {
        if let Some(p) = cli {
            return p.to_path_buf();
        }
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
            _ => PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_max_days_override(std::env::var(MAX_DAYS_ENV).ok().as_deref())?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        warn!("Config file '{}' not found; using defaults", path.display());
        let mut config = Self::default();
        config.apply_max_days_override(std::env::var(MAX_DAYS_ENV).ok().as_deref())?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_max_days_override(&mut self, value: Option<&str>) -> Result<()> {
        let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return Ok(());
        };
        self.run.max_days = raw
            .parse()
            .map_err(|_| EngineError::Config(format!("{MAX_DAYS_ENV} must be an integer, got '{raw}'")))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.run.max_days < 0 {
            return Err(EngineError::Config("run.max_days must not be negative".to_string()));
        }
        if self.run.range_expand_max_days < 0
            || self.run.range_indefinite_after_days < self.run.range_expand_max_days
        {
            return Err(EngineError::Config(
                "range_indefinite_after_days must be >= range_expand_max_days >= 0".to_string(),
            ));
        }

        let mut keys = HashSet::new();
        for source in &self.sources {
            if source.key.trim().is_empty() {
                return Err(EngineError::Config("source key must not be empty".to_string()));
            }
            if !keys.insert(source.key.as_str()) {
                return Err(EngineError::Config(format!("duplicate source key '{}'", source.key)));
            }
            if let Some(center) = source.default_center {
                if !center.is_plausible() {
                    return Err(EngineError::Config(format!(
                        "source '{}' has an invalid default_center",
                        source.key
                    )));
                }
            }
            if let Some((name, _)) = source.corrections.iter().find(|(_, p)| !p.is_plausible()) {
                return Err(EngineError::Config(format!(
                    "source '{}' has an invalid correction for '{}'",
                    source.key, name
                )));
            }
        }
        Ok(())
    }

    pub fn range_policy(&self) -> RangePolicy {
        RangePolicy {
            expand_max_days: self.run.range_expand_max_days,
            indefinite_after_days: self.run.range_indefinite_after_days,
        }
    }

    pub fn geocode_settings(&self) -> GeocodeSettings {
        GeocodeSettings::new(
            self.geocoder.max_candidates,
            Duration::from_secs(self.geocoder.timeout_seconds.max(1)),
        )
    }

    pub fn source_profiles(&self) -> HashMap<String, SourceProfile> {
        self.sources.iter().map(|s| (s.key.clone(), s.profile())).collect()
    }

    pub fn source(&self, key: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.key == key)
    }
}
