// Data processing pipeline: ingestion fan-out and processing stages

pub mod ingestion;
pub mod processing;
