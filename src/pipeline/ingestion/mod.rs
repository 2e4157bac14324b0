// Pipeline ingestion: bounded fan-out and per-source request budgets

pub mod batch;
pub mod rate_limiter;

pub use batch::{run_isolated, TaskOutcome};
pub use rate_limiter::{Limits, SourceLimiter};
