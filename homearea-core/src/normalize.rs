//! Turn raw provider coordinates into well-formed polygon sets.

use std::collections::HashSet;

use geo::algorithm::bool_ops::FillRule;
use geo::orient::Direction;
use geo::{BooleanOps, Buffer, Coord, LineString, MultiPolygon, Orient, Polygon, Simplify};
use thiserror::Error;

use crate::PolygonSet;

/// Magnitude of the simplify and buffer passes applied to every ring.
///
/// Small enough to leave the shape visually unchanged while removing
/// duplicate vertices and closing self-intersections.
pub const NORMALIZE_TOLERANCE: f64 = 1e-7;

/// Errors raised while normalizing input geometry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidGeometryError {
    /// A ring has fewer than three distinct points.
    #[error("ring {ring} has {distinct} distinct points; at least 3 are required")]
    TooFewPoints {
        /// Index of the offending ring in the input.
        ring: usize,
        /// Number of distinct points found.
        distinct: usize,
    },
    /// A ring contains a NaN or infinite coordinate.
    #[error("ring {ring} contains a non-finite coordinate")]
    NonFiniteCoordinate {
        /// Index of the offending ring in the input.
        ring: usize,
    },
}

/// Any of the input shapes accepted by [`normalize`].
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinateInput {
    /// A single coordinate ring.
    Ring(Vec<Coord<f64>>),
    /// Several coordinate rings, each an independent polygon exterior.
    Rings(Vec<Vec<Coord<f64>>>),
    /// Polygons that may overlap or self-intersect.
    Polygons(Vec<Polygon<f64>>),
    /// A set produced by a previous normalization; passed through untouched.
    Set(PolygonSet),
}

impl From<Vec<Coord<f64>>> for CoordinateInput {
    fn from(ring: Vec<Coord<f64>>) -> Self {
        Self::Ring(ring)
    }
}

impl From<Vec<Vec<Coord<f64>>>> for CoordinateInput {
    fn from(rings: Vec<Vec<Coord<f64>>>) -> Self {
        Self::Rings(rings)
    }
}

impl From<Polygon<f64>> for CoordinateInput {
    fn from(polygon: Polygon<f64>) -> Self {
        Self::Polygons(vec![polygon])
    }
}

impl From<Vec<Polygon<f64>>> for CoordinateInput {
    fn from(polygons: Vec<Polygon<f64>>) -> Self {
        Self::Polygons(polygons)
    }
}

impl From<MultiPolygon<f64>> for CoordinateInput {
    fn from(multi: MultiPolygon<f64>) -> Self {
        Self::Polygons(multi.0)
    }
}

impl From<PolygonSet> for CoordinateInput {
    fn from(set: PolygonSet) -> Self {
        Self::Set(set)
    }
}

/// Normalize rings or polygons into a disjoint [`PolygonSet`].
///
/// Each polygon is first split at its self-intersections using the non-zero
/// fill rule, so a bow tie keeps both lobes and a loop that crosses back
/// over the ring keeps its area. The pieces are simplified then buffered by
/// [`NORMALIZE_TOLERANCE`], and the results are unioned. Inputs that do not overlap stay as separate members.
/// Normalizing the output again returns it unchanged.
///
/// # Errors
///
/// Returns [`InvalidGeometryError`] when a ring has fewer than three distinct
/// points or holds a non-finite coordinate.
///
/// # Examples
///
/// ```
/// use geo::Coord;
/// use homearea_core::normalize;
///
/// let ring = vec![
///     Coord { x: 0.0, y: 0.0 },
///     Coord { x: 1.0, y: 0.0 },
///     Coord { x: 1.0, y: 1.0 },
///     Coord { x: 0.0, y: 1.0 },
/// ];
/// let set = normalize(ring)?;
/// assert_eq!(set.len(), 1);
/// assert_eq!(normalize(set.clone())?, set);
/// # Ok::<(), homearea_core::InvalidGeometryError>(())
/// ```
pub fn normalize(input: impl Into<CoordinateInput>) -> Result<PolygonSet, InvalidGeometryError> {
    let polygons = match input.into() {
        CoordinateInput::Set(set) => return Ok(set),
        CoordinateInput::Ring(ring) => vec![polygon_from_ring(0, ring)?],
        CoordinateInput::Rings(rings) => rings
            .into_iter()
            .enumerate()
            .map(|(index, ring)| polygon_from_ring(index, ring))
            .collect::<Result<Vec<_>, _>>()?,
        CoordinateInput::Polygons(polygons) => {
            for (index, polygon) in polygons.iter().enumerate() {
                validate_ring(index, &polygon.exterior().0)?;
            }
            polygons
        }
    };

    let cleaned: Vec<Polygon<f64>> = polygons
        .iter()
        .flat_map(|polygon| repair(polygon).0)
        .flat_map(|polygon| {
            polygon
                .simplify(NORMALIZE_TOLERANCE)
                .buffer(NORMALIZE_TOLERANCE)
                .0
        })
        .collect();
    Ok(PolygonSet::union_of(&cleaned))
}

/// Split `polygon` into valid pieces.
///
/// Rings are oriented first so holes wind against their shell and cancel
/// under the non-zero rule instead of filling in.
fn repair(polygon: &Polygon<f64>) -> MultiPolygon<f64> {
    polygon
        .orient(Direction::Default)
        .union_with_fill_rule(&MultiPolygon::new(Vec::new()), FillRule::NonZero)
}

fn polygon_from_ring(
    index: usize,
    ring: Vec<Coord<f64>>,
) -> Result<Polygon<f64>, InvalidGeometryError> {
    validate_ring(index, &ring)?;
    Ok(Polygon::new(LineString::new(ring), Vec::new()))
}

fn validate_ring(index: usize, ring: &[Coord<f64>]) -> Result<(), InvalidGeometryError> {
    if ring.iter().any(|coord| !coord.x.is_finite() || !coord.y.is_finite()) {
        return Err(InvalidGeometryError::NonFiniteCoordinate { ring: index });
    }
    let distinct = ring
        .iter()
        .map(|coord| (coord.x.to_bits(), coord.y.to_bits()))
        .collect::<HashSet<_>>()
        .len();
    if distinct < 3 {
        return Err(InvalidGeometryError::TooFewPoints {
            ring: index,
            distinct,
        });
    }
    Ok(())
}
