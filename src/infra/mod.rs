pub mod file_source;
pub mod gsi_geocoder;
pub mod static_tables;

pub use file_source::{load_fragments, FileSource};
pub use gsi_geocoder::{GsiGeocoder, NullGeocoder};
pub use static_tables::{CorrectionTable, FacilityTable};
