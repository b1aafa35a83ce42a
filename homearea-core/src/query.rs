//! Per-request search parameters.

use std::collections::BTreeMap;

use geo::Point;
use thiserror::Error;

use crate::cache::{Fingerprint, Fingerprinter};
use crate::rank::MAX_DECILE;
use crate::{RankCategory, TransportMode};

/// Default radius used when no transport mode is enabled.
pub const DEFAULT_FALLBACK_RADIUS_MILES: f64 = 1.0;

/// Where the search is centred.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TargetLocation {
    /// A free-text address resolved by the geocoder.
    Address(String),
    /// A known (longitude, latitude) point.
    Point(Point<f64>),
}

impl TargetLocation {
    /// Label fragment describing the target.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Address(address) => address.clone(),
            Self::Point(point) => format!("{:.5}, {:.5}", point.x(), point.y()),
        }
    }
}

impl Fingerprint for TargetLocation {
    fn fingerprint(&self, state: &mut Fingerprinter) {
        match self {
            Self::Address(address) => {
                state.write_u64(0);
                state.write_str(address);
            }
            Self::Point(point) => {
                state.write_u64(1);
                point.fingerprint(state);
            }
        }
    }
}

/// Validation failures for [`QueryParameters`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryValidationError {
    /// A numeric field is negative or not finite.
    #[error("{field} must be a finite, non-negative number (got {value})")]
    InvalidNumber {
        /// Name of the offending field.
        field: &'static str,
        /// Value supplied.
        value: f64,
    },
    /// A rank threshold exceeds the decile range.
    #[error("{category} threshold {threshold} exceeds the maximum decile of 10")]
    ThresholdOutOfRange {
        /// Category with the bad threshold.
        category: RankCategory,
        /// Threshold supplied.
        threshold: u8,
    },
    /// The target address is blank.
    #[error("target address must not be empty")]
    EmptyAddress,
}

/// Everything needed to compute one region.
///
/// Zero minutes disables a transport mode and a zero threshold disables a
/// ranking filter.
///
/// # Examples
///
/// ```
/// use homearea_core::{QueryParameters, RankCategory, TransportMode};
///
/// let query = QueryParameters::for_address("Edinburgh Waverley")
///     .with_travel(TransportMode::Walking, 15)
///     .with_min_rank(RankCategory::Crime, 6)
///     .with_max_radius_miles(3.0);
/// assert_eq!(query.travel_minutes(TransportMode::Walking), 15);
/// assert_eq!(query.travel_minutes(TransportMode::Bus), 0);
/// query.validate()?;
/// # Ok::<(), homearea_core::QueryValidationError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QueryParameters {
    /// Search centre.
    pub target: TargetLocation,
    /// Maximum travel minutes per mode.
    #[cfg_attr(feature = "serde", serde(default))]
    pub travel: BTreeMap<TransportMode, u32>,
    /// Radius bounding every stage, in miles. Zero disables it.
    #[cfg_attr(feature = "serde", serde(default))]
    pub max_radius_miles: f64,
    /// Radius used when no transport mode is enabled, in miles.
    #[cfg_attr(feature = "serde", serde(default = "default_fallback_radius"))]
    pub fallback_radius_miles: f64,
    /// Minimum decile per ranking category.
    #[cfg_attr(feature = "serde", serde(default))]
    pub min_ranks: BTreeMap<RankCategory, u8>,
    /// Pieces smaller than this many square miles are dropped.
    #[cfg_attr(feature = "serde", serde(default))]
    pub min_area_sq_miles: f64,
    /// Simplify tolerance for the final region, in degrees.
    #[cfg_attr(feature = "serde", serde(default))]
    pub simplify_factor: f64,
    /// Buffer distance for the final region, in degrees.
    #[cfg_attr(feature = "serde", serde(default))]
    pub buffer_factor: f64,
}

#[cfg(feature = "serde")]
const fn default_fallback_radius() -> f64 {
    DEFAULT_FALLBACK_RADIUS_MILES
}

impl QueryParameters {
    /// Parameters centred on `target` with every filter disabled.
    #[must_use]
    pub fn new(target: TargetLocation) -> Self {
        Self {
            target,
            travel: BTreeMap::new(),
            max_radius_miles: 0.0,
            fallback_radius_miles: DEFAULT_FALLBACK_RADIUS_MILES,
            min_ranks: BTreeMap::new(),
            min_area_sq_miles: 0.0,
            simplify_factor: 0.0,
            buffer_factor: 0.0,
        }
    }

    /// Parameters centred on a free-text address.
    #[must_use]
    pub fn for_address(address: impl Into<String>) -> Self {
        Self::new(TargetLocation::Address(address.into()))
    }

    /// Parameters centred on a known point.
    #[must_use]
    pub fn for_point(point: Point<f64>) -> Self {
        Self::new(TargetLocation::Point(point))
    }

    /// Set the travel limit for `mode`.
    #[must_use]
    pub fn with_travel(mut self, mode: TransportMode, minutes: u32) -> Self {
        self.travel.insert(mode, minutes);
        self
    }

    /// Set the minimum decile for `category`.
    #[must_use]
    pub fn with_min_rank(mut self, category: RankCategory, decile: u8) -> Self {
        self.min_ranks.insert(category, decile);
        self
    }

    /// Set the bounding radius.
    #[must_use]
    pub const fn with_max_radius_miles(mut self, miles: f64) -> Self {
        self.max_radius_miles = miles;
        self
    }

    /// Set the fallback radius.
    #[must_use]
    pub const fn with_fallback_radius_miles(mut self, miles: f64) -> Self {
        self.fallback_radius_miles = miles;
        self
    }

    /// Set the minimum piece area.
    #[must_use]
    pub const fn with_min_area_sq_miles(mut self, square_miles: f64) -> Self {
        self.min_area_sq_miles = square_miles;
        self
    }

    /// Set the final simplify tolerance.
    #[must_use]
    pub const fn with_simplify_factor(mut self, factor: f64) -> Self {
        self.simplify_factor = factor;
        self
    }

    /// Set the final buffer distance.
    #[must_use]
    pub const fn with_buffer_factor(mut self, factor: f64) -> Self {
        self.buffer_factor = factor;
        self
    }

    /// Travel limit for `mode`; zero when disabled.
    #[must_use]
    pub fn travel_minutes(&self, mode: TransportMode) -> u32 {
        self.travel.get(&mode).copied().unwrap_or(0)
    }

    /// Minimum decile for `category`; zero when disabled.
    #[must_use]
    pub fn min_rank(&self, category: RankCategory) -> u8 {
        self.min_ranks.get(&category).copied().unwrap_or(0)
    }

    /// Enabled modes with their limits, in pipeline order.
    pub fn enabled_modes(&self) -> impl Iterator<Item = (TransportMode, u32)> + '_ {
        TransportMode::ALL
            .into_iter()
            .map(|mode| (mode, self.travel_minutes(mode)))
            .filter(|(_, minutes)| *minutes > 0)
    }

    /// Enabled ranking filters with their thresholds, in pipeline order.
    pub fn enabled_categories(&self) -> impl Iterator<Item = (RankCategory, u8)> + '_ {
        RankCategory::ALL
            .into_iter()
            .map(|category| (category, self.min_rank(category)))
            .filter(|(_, decile)| *decile > 0)
    }

    /// Check every field is usable.
    ///
    /// # Errors
    ///
    /// Returns the first [`QueryValidationError`] found.
    pub fn validate(&self) -> Result<(), QueryValidationError> {
        if let TargetLocation::Address(address) = &self.target
            && address.trim().is_empty()
        {
            return Err(QueryValidationError::EmptyAddress);
        }
        for (field, value) in [
            ("max_radius_miles", self.max_radius_miles),
            ("fallback_radius_miles", self.fallback_radius_miles),
            ("min_area_sq_miles", self.min_area_sq_miles),
            ("simplify_factor", self.simplify_factor),
            ("buffer_factor", self.buffer_factor),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(QueryValidationError::InvalidNumber { field, value });
            }
        }
        if let Some((category, threshold)) = self
            .enabled_categories()
            .find(|(_, decile)| *decile > MAX_DECILE)
        {
            return Err(QueryValidationError::ThresholdOutOfRange {
                category,
                threshold,
            });
        }
        Ok(())
    }
}

impl Fingerprint for QueryParameters {
    fn fingerprint(&self, state: &mut Fingerprinter) {
        self.target.fingerprint(state);
        for (mode, minutes) in self.enabled_modes() {
            (mode, minutes).fingerprint(state);
        }
        for (category, decile) in self.enabled_categories() {
            (category, decile).fingerprint(state);
        }
        (
            self.max_radius_miles,
            self.fallback_radius_miles,
            self.min_area_sq_miles,
            (self.simplify_factor, self.buffer_factor),
        )
            .fingerprint(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn enabled_modes_follow_pipeline_order() {
        let query = QueryParameters::for_address("somewhere")
            .with_travel(TransportMode::Driving, 10)
            .with_travel(TransportMode::Walking, 15)
            .with_travel(TransportMode::Bus, 0);

        let modes: Vec<TransportMode> = query.enabled_modes().map(|(mode, _)| mode).collect();

        assert_eq!(modes, vec![TransportMode::Walking, TransportMode::Driving]);
    }

    #[rstest]
    #[case::negative_radius(QueryParameters::for_address("x").with_max_radius_miles(-1.0))]
    #[case::nan_area(QueryParameters::for_address("x").with_min_area_sq_miles(f64::NAN))]
    #[case::threshold(QueryParameters::for_address("x").with_min_rank(RankCategory::Health, 11))]
    #[case::blank_address(QueryParameters::for_address("  "))]
    fn invalid_parameters_are_rejected(#[case] query: QueryParameters) {
        assert!(query.validate().is_err());
    }

    #[rstest]
    fn disabled_entries_do_not_change_fingerprint() {
        let plain = QueryParameters::for_address("x").with_travel(TransportMode::Walking, 10);
        let padded = plain.clone().with_travel(TransportMode::Bus, 0);

        let digest = |query: &QueryParameters| {
            let mut state = Fingerprinter::new();
            query.fingerprint(&mut state);
            state.finish()
        };

        assert_eq!(digest(&plain), digest(&padded));
    }

    #[cfg(feature = "serde")]
    #[rstest]
    fn deserializes_with_defaults() {
        let json = r#"{"target": {"address": "Leith"}, "travel": {"walking": 20}}"#;

        let query: QueryParameters = serde_json::from_str(json).expect("valid request");

        assert_eq!(query.travel_minutes(TransportMode::Walking), 20);
        assert!((query.fallback_radius_miles - DEFAULT_FALLBACK_RADIUS_MILES).abs() < f64::EPSILON);
    }
}
