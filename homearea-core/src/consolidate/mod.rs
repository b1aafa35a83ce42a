//! Merge disjoint polygons into one connected region.
//!
//! [`RegionConsolidator`] first tries a plain union. Components that remain
//! apart are joined by thin "bridge" shapes drawn between the closest
//! boundary points of each component and its nearest neighbour, and the
//! whole lot is unioned again. Every pass must strictly reduce the number of
//! components; a pass that does not is reported as
//! [`ConsolidationStalledError`] instead of looping.

mod bridge;

use geo::Polygon;
use log::debug;
use thiserror::Error;

use crate::{PolygonSet, Shape, shape::empty_polygon};

/// Distance each bridge line is buffered by, in degrees.
pub const DEFAULT_BRIDGE_BUFFER: f64 = 0.0001;

/// A bridging pass failed to reduce the number of components.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("consolidation stalled at {components} components after {iterations} bridging passes")]
pub struct ConsolidationStalledError {
    /// Components present before the pass that made no progress.
    pub components: usize,
    /// Passes completed, including the one that stalled.
    pub iterations: usize,
}

/// Outcome of a successful consolidation.
#[derive(Debug, Clone, PartialEq)]
pub struct Consolidation {
    /// The single connected polygon.
    pub polygon: Polygon<f64>,
    /// Bridging passes performed after the initial union.
    pub iterations: usize,
    /// Bridges inserted across all passes.
    pub bridges: usize,
}

/// Joins disjoint polygons into one connected polygon.
///
/// # Examples
///
/// ```
/// use geo::polygon;
/// use homearea_core::{PolygonSet, RegionConsolidator};
///
/// let set = PolygonSet::new(vec![
///     polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)],
///     polygon![(x: 2.0, y: 0.0), (x: 3.0, y: 0.0), (x: 3.0, y: 1.0), (x: 2.0, y: 1.0)],
/// ]);
/// let joined = RegionConsolidator::default().consolidate(&set)?;
/// assert!(geo::Area::unsigned_area(&joined) >= 2.0);
/// # Ok::<(), homearea_core::ConsolidationStalledError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionConsolidator {
    bridge_buffer: f64,
}

impl Default for RegionConsolidator {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionConsolidator {
    /// Create a consolidator using [`DEFAULT_BRIDGE_BUFFER`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bridge_buffer: DEFAULT_BRIDGE_BUFFER,
        }
    }

    /// Override the distance bridge lines are buffered by.
    #[must_use]
    pub const fn with_bridge_buffer(mut self, bridge_buffer: f64) -> Self {
        self.bridge_buffer = bridge_buffer;
        self
    }

    /// Distance bridge lines are buffered by.
    #[must_use]
    pub const fn bridge_buffer(&self) -> f64 {
        self.bridge_buffer
    }

    /// Consolidate a set into one polygon.
    ///
    /// An empty set yields an empty polygon.
    ///
    /// # Errors
    ///
    /// Returns [`ConsolidationStalledError`] when a bridging pass leaves the
    /// component count unchanged.
    pub fn consolidate(&self, set: &PolygonSet) -> Result<Polygon<f64>, ConsolidationStalledError> {
        self.consolidate_with_report(set)
            .map(|outcome| outcome.polygon)
    }

    /// Consolidate a set and report how much bridging it took.
    ///
    /// # Errors
    ///
    /// Returns [`ConsolidationStalledError`] when a bridging pass leaves the
    /// component count unchanged.
    pub fn consolidate_with_report(
        &self,
        set: &PolygonSet,
    ) -> Result<Consolidation, ConsolidationStalledError> {
        let mut shape = match Shape::from(set.clone()) {
            Shape::Multiple(members) if members.len() > 1 => {
                Shape::from(PolygonSet::union_of(&members))
            }
            other => other,
        };
        let mut iterations = 0;
        let mut bridges = 0;

        loop {
            let components = match shape {
                Shape::Single(polygon) => {
                    return Ok(Consolidation {
                        polygon,
                        iterations,
                        bridges,
                    });
                }
                Shape::Multiple(members) if members.is_empty() => {
                    return Ok(Consolidation {
                        polygon: empty_polygon(),
                        iterations,
                        bridges,
                    });
                }
                Shape::Multiple(members) => members,
            };

            let before = components.len();
            let (merged, built) = self.bridge_pass(&components);
            iterations += 1;
            bridges += built;
            debug!(
                "bridging pass {iterations}: {before} components, {built} bridges, {} remaining",
                merged.len()
            );
            if merged.len() >= before {
                return Err(ConsolidationStalledError {
                    components: before,
                    iterations,
                });
            }
            shape = Shape::from(merged);
        }
    }

    fn bridge_pass(&self, components: &PolygonSet) -> (PolygonSet, usize) {
        let members = components.polygons();
        let mut pieces = members.to_vec();
        let mut built = 0;
        for (first, second) in bridge::nearest_pairs(members) {
            let (Some(left), Some(right)) = (members.get(first), members.get(second)) else {
                continue;
            };
            let Some((from, to)) = bridge::closest_boundary_points(left, right) else {
                continue;
            };
            pieces.extend(bridge::bridge(from, to, self.bridge_buffer));
            built += 1;
        }
        (PolygonSet::union_of(&pieces), built)
    }
}
