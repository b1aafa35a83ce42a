//! Predicate reductions over polygon sets.
//!
//! All filters are pure: they return a new set and never fail. An empty
//! result means "nothing matched" and flows on to later stages as such.

use geo::{Area, Contains, Polygon};

use crate::{PolygonSet, shape::representative_point};

/// How a polygon must relate to a filter shape to be kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Containment {
    /// The polygon's representative point lies inside the filter.
    #[default]
    RepresentativePoint,
    /// The whole polygon lies inside the filter.
    Entire,
}

/// Keep polygons whose representative point lies inside `boundary`.
#[must_use]
pub fn by_bounding_shape(set: &PolygonSet, boundary: &Polygon<f64>) -> PolygonSet {
    by_containment(set, boundary, Containment::RepresentativePoint)
}

/// Keep polygons whose area strictly exceeds `min_area`.
///
/// A non-positive threshold keeps everything.
#[must_use]
pub fn by_min_area(set: &PolygonSet, min_area: f64) -> PolygonSet {
    if min_area <= 0.0 {
        return set.clone();
    }
    set.iter()
        .filter(|polygon| polygon.unsigned_area() > min_area)
        .cloned()
        .collect()
}

/// Keep polygons that satisfy `mode` against `filter`.
#[must_use]
pub fn by_containment(set: &PolygonSet, filter: &Polygon<f64>, mode: Containment) -> PolygonSet {
    set.iter()
        .filter(|polygon| match mode {
            Containment::RepresentativePoint => {
                representative_point(polygon).is_some_and(|point| filter.contains(&point))
            }
            Containment::Entire => filter.contains(*polygon),
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::square;
    use rstest::{fixture, rstest};

    #[fixture]
    fn scattered() -> PolygonSet {
        PolygonSet::new(vec![
            square(0.0, 0.0, 1.0),
            square(1.5, 0.0, 0.1),
            square(9.5, 0.0, 1.0),
        ])
    }

    #[rstest]
    fn bounding_shape_keeps_members_centred_inside(scattered: PolygonSet) {
        let boundary = square(-1.0, -1.0, 4.0);

        let kept = by_bounding_shape(&scattered, &boundary);

        assert_eq!(kept.len(), 2);
    }

    #[rstest]
    fn bounding_shape_keeps_partially_overlapping_member() {
        let set = PolygonSet::from(square(0.0, 0.0, 2.0));
        let boundary = square(0.5, 0.5, 5.0);

        assert_eq!(by_bounding_shape(&set, &boundary).len(), 1);
    }

    #[rstest]
    #[case(0.0, 3)]
    #[case(0.5, 2)]
    #[case(1.0, 0)]
    fn min_area_drops_small_members(
        scattered: PolygonSet,
        #[case] min_area: f64,
        #[case] expected: usize,
    ) {
        assert_eq!(by_min_area(&scattered, min_area).len(), expected);
    }

    #[rstest]
    #[case(Containment::RepresentativePoint, 1)]
    #[case(Containment::Entire, 0)]
    fn containment_mode_decides_straddling_members(
        #[case] mode: Containment,
        #[case] expected: usize,
    ) {
        let set = PolygonSet::from(square(0.0, 0.0, 2.0));
        let filter = square(-1.0, -1.0, 2.5);

        assert_eq!(by_containment(&set, &filter, mode).len(), expected);
    }

    #[rstest]
    fn empty_input_is_not_an_error() {
        let boundary = square(0.0, 0.0, 1.0);
        assert!(by_bounding_shape(&PolygonSet::empty(), &boundary).is_empty());
        assert!(by_min_area(&PolygonSet::empty(), 1.0).is_empty());
    }
}
