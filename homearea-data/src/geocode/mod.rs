//! Address geocoding over HTTP.

mod mapbox;

pub use mapbox::{DEFAULT_BASE_URL, MapboxGeocoder, MapboxGeocoderConfig};
