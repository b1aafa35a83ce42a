//! Geocoding collaborator contract.

use geo::Point;
use thiserror::Error;

/// Errors from [`GeocodeProvider::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeocodeError {
    /// The address matched nothing.
    #[error("no location found for address {address:?}")]
    NoMatch {
        /// Address that was looked up.
        address: String,
    },
    /// The address was empty after trimming.
    #[error("address must not be empty")]
    EmptyAddress,
    /// The geocoding service failed.
    #[error("geocoding request to {url} failed: {message}")]
    Upstream {
        /// Request URL with credentials removed.
        url: String,
        /// Failure description.
        message: String,
    },
    /// The geocoding response could not be decoded.
    #[error("failed to parse geocoding response: {message}")]
    ParseError {
        /// Decoder failure description.
        message: String,
    },
}

/// Resolve a free-text address to a point.
pub trait GeocodeProvider: Send + Sync {
    /// Return the (longitude, latitude) of `address`.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::NoMatch`] when nothing matches and other
    /// variants when the lookup itself fails.
    fn resolve(&self, address: &str) -> Result<Point<f64>, GeocodeError>;
}

impl<T: GeocodeProvider + ?Sized> GeocodeProvider for &T {
    fn resolve(&self, address: &str) -> Result<Point<f64>, GeocodeError> {
        (**self).resolve(address)
    }
}

impl<T: GeocodeProvider + ?Sized> GeocodeProvider for Box<T> {
    fn resolve(&self, address: &str) -> Result<Point<f64>, GeocodeError> {
        (**self).resolve(address)
    }
}
