use thiserror::Error;

use crate::InvalidGeometryError;

/// Errors from [`crate::isochrone::IsochroneProvider::fetch`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The service could not be reached.
    #[error("network error contacting {url}: {message}")]
    NetworkError {
        /// Request URL.
        url: String,
        /// Transport-level failure description.
        message: String,
    },
    /// The request did not complete in time.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout {
        /// Request URL.
        url: String,
        /// Configured timeout.
        timeout_secs: u64,
    },
    /// The service answered with a non-success status.
    #[error("HTTP {status} from {url}: {message}")]
    HttpError {
        /// Request URL.
        url: String,
        /// Status code returned.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },
    /// The service reported an application-level error.
    #[error("isochrone service error {code}: {message}")]
    ServiceError {
        /// Service error code.
        code: String,
        /// Service error description.
        message: String,
    },
    /// The response body could not be decoded.
    #[error("failed to parse isochrone response: {message}")]
    ParseError {
        /// Decoder failure description.
        message: String,
    },
    /// A returned shape was not a usable polygon.
    #[error("isochrone response contained an invalid shape: {source}")]
    InvalidShape {
        /// Why the shape was rejected.
        #[source]
        source: InvalidGeometryError,
    },
}
