/// Shared constants for the normalization engine and its configuration.

// Japan Standard Time, fixed UTC+9
pub const JST_OFFSET_SECONDS: i32 = 9 * 3600;
pub const JST_SUFFIX: &str = "+09:00";

// Collection window
pub const DEFAULT_MAX_DAYS: i64 = 30;

// Geocoding candidate list bounds
pub const MIN_GEOCODE_CANDIDATES: usize = 3;
pub const MAX_GEOCODE_CANDIDATES: usize = 7;
pub const DEFAULT_GEOCODE_CANDIDATES: usize = 5;

pub const GSI_ADDRESS_SEARCH_URL: &str = "https://msearch.gsi.go.jp/address-search/AddressSearch";
pub const DEFAULT_GEOCODER_TIMEOUT_SECONDS: u64 = 10;

// Per-source fetch defaults
pub const DEFAULT_SOURCE_CONCURRENCY: u32 = 4;
pub const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 15;

// Environment overrides
pub const CONFIG_PATH_ENV: &str = "MUNI_EVENTS_CONFIG";
pub const MAX_DAYS_ENV: &str = "MUNI_EVENTS_MAX_DAYS";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
