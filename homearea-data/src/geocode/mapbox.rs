//! HTTP-based `GeocodeProvider` using the Mapbox forward geocoding API.

use std::sync::Arc;
use std::time::Duration;

use geo::Point;
use homearea_core::{GeocodeError, GeocodeProvider};
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::http::{
    BlockingRuntime, FailureKind, NoRateLimit, ProviderBuildError, RateLimiter, RetryPolicy,
    build_client, classify_status,
};

/// Default Mapbox API host.
pub const DEFAULT_BASE_URL: &str = "https://api.mapbox.com";

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Forward geocoding response; only the fields the engine reads.
#[derive(Debug, Deserialize)]
struct PlacesResponse {
    #[serde(default)]
    features: Vec<PlaceFeature>,
}

#[derive(Debug, Deserialize)]
struct PlaceFeature {
    /// `[longitude, latitude]`.
    center: [f64; 2],
}

/// Configuration for [`MapboxGeocoder`].
#[derive(Debug, Clone)]
pub struct MapboxGeocoderConfig {
    /// Service root, without the geocoding path.
    pub base_url: String,
    /// Mapbox access token sent as a query parameter.
    pub access_token: String,
    /// Request timeout.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
    /// Retry behaviour for transient failures.
    pub retry: RetryPolicy,
}

impl Default for MapboxGeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            access_token: String::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: crate::isochrone::DEFAULT_USER_AGENT.to_owned(),
            retry: RetryPolicy::default(),
        }
    }
}

impl MapboxGeocoderConfig {
    /// Create a configuration with the given access token.
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..Default::default()
        }
    }

    /// Point at a different service root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Geocoder resolving addresses through `mapbox.places`.
pub struct MapboxGeocoder {
    client: Client,
    config: MapboxGeocoderConfig,
    base: Url,
    runtime: BlockingRuntime,
    limiter: Arc<dyn RateLimiter>,
}

impl std::fmt::Debug for MapboxGeocoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapboxGeocoder")
            .field("base", &self.base.as_str())
            .field("timeout", &self.config.timeout)
            .finish_non_exhaustive()
    }
}

/// A failed attempt, kept separate from [`GeocodeError`] so retries can see
/// the status.
#[derive(Debug)]
enum Attempt {
    Status(u16, String),
    Transport { timeout: bool, message: String },
    Parse(String),
}

impl std::fmt::Display for Attempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status(status, message) => write!(f, "HTTP {status}: {message}"),
            Self::Transport { message, .. } | Self::Parse(message) => f.write_str(message),
        }
    }
}

impl Attempt {
    fn is_transient(&self) -> bool {
        match self {
            Self::Status(status, _) => classify_status(*status) == FailureKind::Transient,
            Self::Transport { .. } => true,
            Self::Parse(_) => false,
        }
    }
}

impl MapboxGeocoder {
    /// Create a geocoder for the public service.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or Tokio runtime fails to build.
    pub fn new(access_token: impl Into<String>) -> Result<Self, ProviderBuildError> {
        Self::with_config(MapboxGeocoderConfig::new(access_token))
    }

    /// Create a geocoder with explicit configuration and no rate limit.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client or
    /// Tokio runtime fails to build.
    pub fn with_config(config: MapboxGeocoderConfig) -> Result<Self, ProviderBuildError> {
        let base = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(ProviderBuildError::BaseUrl)?;
        let client = build_client(&config.user_agent, config.timeout)?;
        let runtime = BlockingRuntime::new()?;
        Ok(Self {
            client,
            config,
            base,
            runtime,
            limiter: Arc::new(NoRateLimit),
        })
    }

    /// Share `limiter` with this geocoder.
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    /// Build the lookup URL without the access token.
    ///
    /// The address becomes a single percent-encoded path segment.
    fn lookup_url(&self, address: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["geocoding", "v5", "mapbox.places"])
                .push(&format!("{address}.json"));
        }
        url.query_pairs_mut().append_pair("limit", "1");
        url
    }

    async fn lookup_once(&self, url: &Url) -> Result<Option<Point<f64>>, Attempt> {
        let response = self
            .client
            .get(url.clone())
            .query(&[("access_token", self.config.access_token.as_str())])
            .send()
            .await
            .map_err(|err| Attempt::Transport {
                timeout: err.is_timeout(),
                message: err.without_url().to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or_default().to_owned();
            return Err(Attempt::Status(status.as_u16(), reason));
        }

        let places: PlacesResponse = response
            .json()
            .await
            .map_err(|err| Attempt::Parse(err.without_url().to_string()))?;
        Ok(first_center(places))
    }
}

fn first_center(places: PlacesResponse) -> Option<Point<f64>> {
    places
        .features
        .into_iter()
        .next()
        .map(|feature| Point::new(feature.center[0], feature.center[1]))
}

impl GeocodeProvider for MapboxGeocoder {
    fn resolve(&self, address: &str) -> Result<Point<f64>, GeocodeError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(GeocodeError::EmptyAddress);
        }
        let url = self.lookup_url(address);
        debug!("geocoding {address:?} via {url}");

        let future = self
            .config
            .retry
            .run(self.limiter.as_ref(), Attempt::is_transient, || {
                self.lookup_once(&url)
            });
        match self.runtime.block_on(future) {
            Ok(Some(point)) => Ok(point),
            Ok(None) => Err(GeocodeError::NoMatch {
                address: address.to_owned(),
            }),
            Err(Attempt::Parse(message)) => Err(GeocodeError::ParseError { message }),
            Err(Attempt::Transport { timeout: true, .. }) => Err(GeocodeError::Upstream {
                url: url.to_string(),
                message: format!("timed out after {}s", self.config.timeout.as_secs()),
            }),
            Err(other) => Err(GeocodeError::Upstream {
                url: url.to_string(),
                message: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn geocoder() -> MapboxGeocoder {
        MapboxGeocoder::new("token").expect("geocoder should build")
    }

    #[rstest]
    fn lookup_url_encodes_the_address(geocoder: MapboxGeocoder) {
        let url = geocoder.lookup_url("10 Downing St, London/SW1A");

        assert_eq!(
            url.as_str(),
            "https://api.mapbox.com/geocoding/v5/mapbox.places/10%20Downing%20St,%20London%2FSW1A.json?limit=1"
        );
    }

    #[rstest]
    fn lookup_url_keeps_a_base_path() {
        let config = MapboxGeocoderConfig::new("token").with_base_url("http://localhost:9000/proxy/");
        let geocoder = MapboxGeocoder::with_config(config).expect("geocoder should build");

        let url = geocoder.lookup_url("EH1");

        assert_eq!(
            url.as_str(),
            "http://localhost:9000/proxy/geocoding/v5/mapbox.places/EH1.json?limit=1"
        );
    }

    #[rstest]
    fn lookup_url_never_carries_the_token(geocoder: MapboxGeocoder) {
        assert!(!geocoder.lookup_url("EH1").as_str().contains("token"));
    }

    #[rstest]
    fn blank_address_is_rejected_without_a_request(geocoder: MapboxGeocoder) {
        assert_eq!(geocoder.resolve("   "), Err(GeocodeError::EmptyAddress));
    }

    #[rstest]
    fn first_feature_center_is_used() {
        let places: PlacesResponse = serde_json::from_str(
            r#"{"type": "FeatureCollection", "features": [
                {"place_name": "Edinburgh", "center": [-3.1883, 55.9533]},
                {"place_name": "Edinburgh, Indiana", "center": [-85.96, 39.35]}
            ]}"#,
        )
        .expect("should deserialise");

        assert_eq!(first_center(places), Some(Point::new(-3.1883, 55.9533)));
    }

    #[rstest]
    fn no_features_means_no_match() {
        let places: PlacesResponse =
            serde_json::from_str(r#"{"type": "FeatureCollection", "features": []}"#)
                .expect("should deserialise");

        assert_eq!(first_center(places), None);
    }

    #[rstest]
    #[case::throttled(Attempt::Status(429, String::new()), true)]
    #[case::server(Attempt::Status(502, String::new()), true)]
    #[case::forbidden(Attempt::Status(401, String::new()), false)]
    #[case::dropped(Attempt::Transport { timeout: false, message: String::new() }, true)]
    #[case::garbled(Attempt::Parse(String::new()), false)]
    fn attempts_are_classified(#[case] attempt: Attempt, #[case] transient: bool) {
        assert_eq!(attempt.is_transient(), transient);
    }
}
