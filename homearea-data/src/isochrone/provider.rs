//! HTTP-based `IsochroneProvider` backed by the TravelTime API.
//!
//! [`TravelTimeIsochroneProvider`] implements the synchronous
//! [`IsochroneProvider`] trait by blocking on an async `reqwest` call. Every
//! attempt waits for a slot from the configured [`RateLimiter`], and
//! timeouts, throttling and server errors are retried per the
//! [`RetryPolicy`].
//!
//! # Example
//!
//! ```no_run
//! use geo::Point;
//! use homearea_core::{IsochroneProvider, TransportMode};
//! use homearea_data::isochrone::{
//!     TravelTimeIsochroneProvider, TravelTimeIsochroneProviderConfig,
//! };
//!
//! let config = TravelTimeIsochroneProviderConfig::new("app-id", "api-key");
//! let provider = TravelTimeIsochroneProvider::with_config(config)?;
//! let area = provider.fetch(Point::new(-0.1276, 51.5072), TransportMode::Bus, 20)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::sync::Arc;
use std::time::Duration;

use geo::Point;
use homearea_core::{IsochroneProvider, PolygonSet, ProviderError, TransportMode, normalize};
use log::debug;
use reqwest::Client;
use url::Url;

use super::traveltime::{
    Coords, DepartureSearch, TimeMapError, TimeMapRequest, TimeMapResponse, Transportation,
};
use crate::http::{
    BlockingRuntime, FailureKind, NoRateLimit, ProviderBuildError, RateLimiter, RetryPolicy,
    build_client, classify_status,
};

/// Default TravelTime API host.
pub const DEFAULT_BASE_URL: &str = "https://api.traveltimeapp.com";

/// Default user agent for isochrone requests.
pub const DEFAULT_USER_AGENT: &str = "homearea/0.1";

/// Fixed weekday-morning departure so results are comparable between runs.
pub const DEFAULT_DEPARTURE_TIME: &str = "2019-09-30T08:00:00+0000";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for [`TravelTimeIsochroneProvider`].
#[derive(Debug, Clone)]
pub struct TravelTimeIsochroneProviderConfig {
    /// Service root, without the `/v4/time-map` path.
    pub base_url: String,
    /// Value of the `X-Application-Id` header.
    pub app_id: String,
    /// Value of the `X-Api-Key` header.
    pub api_key: String,
    /// Request timeout.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
    /// ISO-8601 departure timestamp sent with every search.
    pub departure_time: String,
    /// Retry behaviour for transient failures.
    pub retry: RetryPolicy,
}

impl Default for TravelTimeIsochroneProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            app_id: String::new(),
            api_key: String::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            departure_time: DEFAULT_DEPARTURE_TIME.to_owned(),
            retry: RetryPolicy::default(),
        }
    }
}

impl TravelTimeIsochroneProviderConfig {
    /// Create a configuration with the given credentials.
    #[must_use]
    pub fn new(app_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            api_key: api_key.into(),
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

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the departure timestamp.
    #[must_use]
    pub fn with_departure_time(mut self, departure_time: impl Into<String>) -> Self {
        self.departure_time = departure_time.into();
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Isochrone provider using the TravelTime `time-map` endpoint.
///
/// Owns a current-thread Tokio runtime reused across calls. When invoked from
/// inside a multi-threaded Tokio runtime it borrows that runtime's handle
/// instead; inside a `current_thread` runtime it falls back to its own, which
/// may deadlock if the caller's runtime drives IO this request needs.
pub struct TravelTimeIsochroneProvider {
    client: Client,
    config: TravelTimeIsochroneProviderConfig,
    endpoint: Url,
    runtime: BlockingRuntime,
    limiter: Arc<dyn RateLimiter>,
}

impl std::fmt::Debug for TravelTimeIsochroneProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TravelTimeIsochroneProvider")
            .field("endpoint", &self.endpoint.as_str())
            .field("app_id", &self.config.app_id)
            .field("timeout", &self.config.timeout)
            .field("retry", &self.config.retry)
            .finish_non_exhaustive()
    }
}

impl TravelTimeIsochroneProvider {
    /// Create a provider for the public service with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or Tokio runtime fails to build.
    pub fn new(
        app_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderBuildError> {
        Self::with_config(TravelTimeIsochroneProviderConfig::new(app_id, api_key))
    }

    /// Create a provider with explicit configuration and no rate limit.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client or
    /// Tokio runtime fails to build.
    pub fn with_config(config: TravelTimeIsochroneProviderConfig) -> Result<Self, ProviderBuildError> {
        let endpoint = Url::parse(&format!(
            "{}/v4/time-map",
            config.base_url.trim_end_matches('/')
        ))
        .map_err(ProviderBuildError::BaseUrl)?;
        let client = build_client(&config.user_agent, config.timeout)?;
        let runtime = BlockingRuntime::new()?;
        Ok(Self {
            client,
            config,
            endpoint,
            runtime,
            limiter: Arc::new(NoRateLimit),
        })
    }

    /// Share `limiter` with this provider.
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    /// Full `time-map` URL requests are sent to.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn build_request(&self, origin: Point<f64>, mode: TransportMode, max_minutes: u32) -> TimeMapRequest {
        TimeMapRequest {
            departure_searches: vec![DepartureSearch {
                id: mode.key().to_owned(),
                coords: Coords {
                    lat: origin.y(),
                    lng: origin.x(),
                },
                transportation: Transportation {
                    kind: mode.key().to_owned(),
                },
                departure_time: self.config.departure_time.clone(),
                travel_time: max_minutes.saturating_mul(60),
            }],
            arrival_searches: Vec::new(),
        }
    }

    async fn fetch_once(&self, request: &TimeMapRequest) -> Result<PolygonSet, ProviderError> {
        let url = self.endpoint.as_str();
        let response = self
            .client
            .post(self.endpoint.clone())
            .header("X-Application-Id", &self.config.app_id)
            .header("X-Api-Key", &self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, url))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(convert_error_body(url, status, &body));
        }

        let parsed: TimeMapResponse =
            response
                .json()
                .await
                .map_err(|err| ProviderError::ParseError {
                    message: err.to_string(),
                })?;
        convert_response(parsed)
    }

    /// Convert a reqwest error to a `ProviderError`.
    fn convert_reqwest_error(&self, error: &reqwest::Error, url: &str) -> ProviderError {
        if error.is_timeout() {
            return ProviderError::Timeout {
                url: url.to_owned(),
                timeout_secs: self.config.timeout.as_secs(),
            };
        }

        if let Some(status) = error.status() {
            return ProviderError::HttpError {
                url: url.to_owned(),
                status: status.as_u16(),
                message: error.to_string(),
            };
        }

        ProviderError::NetworkError {
            url: url.to_owned(),
            message: error.to_string(),
        }
    }
}

/// Whether another attempt could succeed.
fn is_transient(error: &ProviderError) -> bool {
    match error {
        ProviderError::NetworkError { .. } | ProviderError::Timeout { .. } => true,
        ProviderError::HttpError { status, .. } => {
            classify_status(*status) == FailureKind::Transient
        }
        ProviderError::ServiceError { .. }
        | ProviderError::ParseError { .. }
        | ProviderError::InvalidShape { .. } => false,
    }
}

/// Map a non-success response to an error.
///
/// Client errors carrying a structured body become
/// [`ProviderError::ServiceError`]; everything else stays an HTTP error so
/// retry classification can see the status.
fn convert_error_body(url: &str, status: u16, body: &str) -> ProviderError {
    let structured = serde_json::from_str::<TimeMapError>(body).ok();
    match structured {
        Some(error) if classify_status(status) == FailureKind::Permanent => {
            ProviderError::ServiceError {
                code: error.code(),
                message: error.description,
            }
        }
        Some(error) => ProviderError::HttpError {
            url: url.to_owned(),
            status,
            message: error.description,
        },
        None => ProviderError::HttpError {
            url: url.to_owned(),
            status,
            message: body.trim().to_owned(),
        },
    }
}

/// Normalize the first result's shapes into a polygon set.
fn convert_response(response: TimeMapResponse) -> Result<PolygonSet, ProviderError> {
    let result = response
        .results
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::ParseError {
            message: "time-map response contained no results".to_owned(),
        })?;
    let polygons: Vec<_> = result
        .shapes
        .into_iter()
        .map(|shape| shape.into_polygon())
        .collect();
    normalize(polygons).map_err(|source| ProviderError::InvalidShape { source })
}

impl IsochroneProvider for TravelTimeIsochroneProvider {
    fn fetch(
        &self,
        origin: Point<f64>,
        mode: TransportMode,
        max_minutes: u32,
    ) -> Result<PolygonSet, ProviderError> {
        let request = self.build_request(origin, mode, max_minutes);
        debug!("requesting {max_minutes} min {mode} isochrone from {}", self.endpoint);
        let future = self.config.retry.run(self.limiter.as_ref(), is_transient, || {
            self.fetch_once(&request)
        });
        self.runtime.block_on(future)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;
    use homearea_core::InvalidGeometryError;
    use rstest::{fixture, rstest};

    #[fixture]
    fn provider() -> TravelTimeIsochroneProvider {
        TravelTimeIsochroneProvider::new("app", "key").expect("provider should build")
    }

    fn shape(json: &str) -> TimeMapResponse {
        serde_json::from_str(json).expect("should deserialise")
    }

    #[rstest]
    #[case::default_host(DEFAULT_BASE_URL, "https://api.traveltimeapp.com/v4/time-map")]
    #[case::trailing_slash("http://localhost:8080/", "http://localhost:8080/v4/time-map")]
    fn endpoint_appends_time_map_path(#[case] base: &str, #[case] expected: &str) {
        let config = TravelTimeIsochroneProviderConfig::new("app", "key").with_base_url(base);

        let provider = TravelTimeIsochroneProvider::with_config(config).expect("provider should build");

        assert_eq!(provider.endpoint().as_str(), expected);
    }

    #[rstest]
    fn invalid_base_url_is_rejected() {
        let config = TravelTimeIsochroneProviderConfig::new("app", "key").with_base_url("not a url");

        let error = TravelTimeIsochroneProvider::with_config(config).expect_err("should fail");

        assert!(matches!(error, ProviderBuildError::BaseUrl(_)));
    }

    #[rstest]
    fn request_uses_mode_key_and_seconds(provider: TravelTimeIsochroneProvider) {
        let request = provider.build_request(Point::new(-3.19, 55.95), TransportMode::Cycling, 25);

        let search = &request.departure_searches[0];
        assert_eq!(search.transportation.kind, "cycling");
        assert_eq!(search.travel_time, 1500);
        assert_eq!(search.coords, Coords { lat: 55.95, lng: -3.19 });
        assert_eq!(search.departure_time, DEFAULT_DEPARTURE_TIME);
        assert!(request.arrival_searches.is_empty());
    }

    #[rstest]
    fn response_shapes_are_normalized() {
        let response = shape(
            r#"{"results": [{"search_id": "walking", "shapes": [
                {"shell": [{"lat": 0.0, "lng": 0.0}, {"lat": 0.0, "lng": 1.0},
                           {"lat": 1.0, "lng": 1.0}, {"lat": 1.0, "lng": 0.0}]},
                {"shell": [{"lat": 0.5, "lng": 0.5}, {"lat": 0.5, "lng": 2.0},
                           {"lat": 2.0, "lng": 2.0}, {"lat": 2.0, "lng": 0.5}]}
            ]}]}"#,
        );

        let set = convert_response(response).expect("shapes are valid");

        assert_eq!(set.len(), 1);
        assert!((set.total_area() - 3.0).abs() < 1e-3);
        assert!(set.polygons()[0].unsigned_area() > 0.0);
    }

    #[rstest]
    fn empty_shape_list_is_an_empty_set() {
        let response = shape(r#"{"results": [{"search_id": "train", "shapes": []}]}"#);

        let set = convert_response(response).expect("no shapes is valid");

        assert!(set.is_empty());
    }

    #[rstest]
    fn missing_results_is_a_parse_error() {
        let error = convert_response(shape(r#"{"results": []}"#)).expect_err("should fail");

        assert!(matches!(error, ProviderError::ParseError { .. }));
    }

    #[rstest]
    fn degenerate_shell_is_an_invalid_shape() {
        let response = shape(
            r#"{"results": [{"search_id": "bus", "shapes": [
                {"shell": [{"lat": 0.0, "lng": 0.0}, {"lat": 1.0, "lng": 1.0}]}
            ]}]}"#,
        );

        let error = convert_response(response).expect_err("should fail");

        assert!(matches!(
            error,
            ProviderError::InvalidShape {
                source: InvalidGeometryError::TooFewPoints { .. }
            }
        ));
    }

    #[rstest]
    fn client_error_body_becomes_service_error() {
        let body = r#"{"http_status": 422, "error_code": 15, "description": "bad travel_time"}"#;

        let error = convert_error_body("http://x/v4/time-map", 422, body);

        assert_eq!(
            error,
            ProviderError::ServiceError {
                code: "15".to_owned(),
                message: "bad travel_time".to_owned(),
            }
        );
        assert!(!is_transient(&error));
    }

    #[rstest]
    #[case::throttled(429, true)]
    #[case::unavailable(503, true)]
    #[case::unauthorised(401, false)]
    fn unstructured_errors_keep_their_status(#[case] status: u16, #[case] transient: bool) {
        let error = convert_error_body("http://x/v4/time-map", status, "oops\n");

        assert!(matches!(
            &error,
            ProviderError::HttpError { status: got, message, .. } if *got == status && message == "oops"
        ));
        assert_eq!(is_transient(&error), transient);
    }
}
