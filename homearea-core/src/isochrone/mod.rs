//! Isochrone collaborator contract.
//!
//! The engine asks an [`IsochroneProvider`] for the area reachable from a
//! point within a time limit for one [`TransportMode`]. Providers own their
//! rate limiting and retries; the engine treats every answer as final.

mod error;

use std::fmt;

use geo::Point;

use crate::PolygonSet;
use crate::cache::{Fingerprint, Fingerprinter};

pub use error::ProviderError;

/// A way of travelling from the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TransportMode {
    /// On foot.
    Walking,
    /// By bicycle.
    Cycling,
    /// By bus.
    Bus,
    /// By long-distance coach.
    Coach,
    /// By train.
    Train,
    /// By car.
    Driving,
}

impl TransportMode {
    /// Every mode in pipeline order.
    pub const ALL: [Self; 6] = [
        Self::Walking,
        Self::Cycling,
        Self::Bus,
        Self::Coach,
        Self::Train,
        Self::Driving,
    ];

    /// Stable machine key, also used as the provider's transport type.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Walking => "walking",
            Self::Cycling => "cycling",
            Self::Bus => "bus",
            Self::Coach => "coach",
            Self::Train => "train",
            Self::Driving => "driving",
        }
    }

    /// Short noun used in region labels.
    #[must_use]
    pub const fn noun(self) -> &'static str {
        match self {
            Self::Walking => "Walk",
            Self::Cycling => "Cycle",
            Self::Bus => "Bus",
            Self::Coach => "Coach",
            Self::Train => "Train",
            Self::Driving => "Drive",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl Fingerprint for TransportMode {
    fn fingerprint(&self, state: &mut Fingerprinter) {
        state.write_str(self.key());
    }
}

/// Fetch the area reachable from a point.
///
/// # Examples
///
/// ```
/// use geo::{Point, polygon};
/// use homearea_core::{IsochroneProvider, PolygonSet, ProviderError, TransportMode};
///
/// struct FixedSquare;
///
/// impl IsochroneProvider for FixedSquare {
///     fn fetch(
///         &self,
///         origin: Point<f64>,
///         _mode: TransportMode,
///         _max_minutes: u32,
///     ) -> Result<PolygonSet, ProviderError> {
///         let (x, y) = origin.x_y();
///         Ok(PolygonSet::from(polygon![
///             (x: x - 0.01, y: y - 0.01),
///             (x: x + 0.01, y: y - 0.01),
///             (x: x + 0.01, y: y + 0.01),
///             (x: x - 0.01, y: y + 0.01),
///         ]))
///     }
/// }
///
/// let area = FixedSquare.fetch(Point::new(-0.1, 51.5), TransportMode::Walking, 15)?;
/// assert_eq!(area.len(), 1);
/// # Ok::<(), ProviderError>(())
/// ```
pub trait IsochroneProvider: Send + Sync {
    /// Return the normalized area reachable from `origin` by `mode` within
    /// `max_minutes`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the upstream service fails or answers
    /// with something that is not a usable shape.
    fn fetch(
        &self,
        origin: Point<f64>,
        mode: TransportMode,
        max_minutes: u32,
    ) -> Result<PolygonSet, ProviderError>;
}

impl<T: IsochroneProvider + ?Sized> IsochroneProvider for &T {
    fn fetch(
        &self,
        origin: Point<f64>,
        mode: TransportMode,
        max_minutes: u32,
    ) -> Result<PolygonSet, ProviderError> {
        (**self).fetch(origin, mode, max_minutes)
    }
}

impl<T: IsochroneProvider + ?Sized> IsochroneProvider for Box<T> {
    fn fetch(
        &self,
        origin: Point<f64>,
        mode: TransportMode,
        max_minutes: u32,
    ) -> Result<PolygonSet, ProviderError> {
        (**self).fetch(origin, mode, max_minutes)
    }
}
