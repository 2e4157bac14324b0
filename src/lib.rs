pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod types;

// Layered boundaries for application and infrastructure
pub mod app;
pub mod infra;

pub use app::collect_use_case::{CollectUseCase, ConfiguredSource, RunOutput, RunReport};
pub use config::Config;
pub use error::{EngineError, Result};
pub use types::{CalendarDate, CanonicalEvent, GeoPoint, RawFragment, TimeRange};
