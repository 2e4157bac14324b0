// Pipeline processing: text normalization, venue cleanup, geocoding and dedup

pub mod dedupe;
pub mod geocode;
pub mod normalize;
pub mod sanitize;

pub use dedupe::{identity_key, Deduplicator};
pub use geocode::{GeocodeResolver, GeocodeSettings, Resolution};
pub use normalize::FragmentNormalizer;
pub use sanitize::{SanitizedVenue, VenueAddressSanitizer};
