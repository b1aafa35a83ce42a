//! Concrete collaborators for the homearea engine.
//!
//! Responsibilities:
//! - Fetch isochrones from TravelTime and geocode addresses with Mapbox.
//! - Load ranked statistical zones from GeoJSON datasets.
//! - Pace and retry outbound requests.
//!
//! Boundaries:
//! - Do not encode pipeline rules (live in `homearea-core`).
//! - Present synchronous trait implementations; async stays internal.
//!
//! Invariants:
//! - Credentials never appear in error messages or logs.
//! - No global mutable state; limiters are shared explicitly via `Arc`.

pub mod geocode;
pub mod http;
pub mod isochrone;
pub mod zones;

pub use geocode::{MapboxGeocoder, MapboxGeocoderConfig};
pub use http::{MinIntervalLimiter, NoRateLimit, ProviderBuildError, RateLimiter, RetryPolicy};
pub use isochrone::{TravelTimeIsochroneProvider, TravelTimeIsochroneProviderConfig};
pub use zones::{GeoJsonZoneSource, ZoneSchema};
