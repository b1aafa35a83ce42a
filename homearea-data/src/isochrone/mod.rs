//! Isochrone fetching over HTTP.

mod provider;
mod traveltime;

pub use provider::{
    DEFAULT_BASE_URL, DEFAULT_DEPARTURE_TIME, DEFAULT_USER_AGENT, TravelTimeIsochroneProvider,
    TravelTimeIsochroneProviderConfig,
};
