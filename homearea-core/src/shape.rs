//! Polygon collections shared by every stage of the engine.
//!
//! [`PolygonSet`] is the unit of exchange between providers, filters and the
//! pipeline. [`Shape`] makes the "one polygon" versus "many disjoint
//! polygons" distinction explicit so callers never inspect geometry to find
//! out which case they hold.

use geo::orient::Direction;
use geo::{
    Area, BooleanOps, BoundingRect, Centroid, InteriorPoint, LineString, MultiPolygon, Orient,
    Point, Polygon, Rect, unary_union,
};

/// A set of zero or more disjoint polygons.
///
/// Iteration order carries no meaning but is stable: sets built from a
/// boolean operation are sorted by the lower-left corner of each member's
/// bounding rectangle so diagnostics are reproducible.
///
/// # Examples
///
/// ```
/// use geo::polygon;
/// use homearea_core::PolygonSet;
///
/// let set = PolygonSet::new(vec![
///     polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)],
/// ]);
/// assert_eq!(set.len(), 1);
/// assert!((set.total_area() - 1.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct PolygonSet(Vec<Polygon<f64>>);

impl PolygonSet {
    /// Wrap polygons the caller already knows to be disjoint.
    ///
    /// Empty polygons are dropped. Shells are wound counter-clockwise and
    /// holes clockwise.
    #[must_use]
    pub fn new(polygons: Vec<Polygon<f64>>) -> Self {
        Self(
            polygons
                .into_iter()
                .filter(|polygon| !is_empty_polygon(polygon))
                .map(|polygon| polygon.orient(Direction::Default))
                .collect(),
        )
    }

    /// A set with no members.
    #[must_use]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// Build a set from the output of a boolean operation.
    #[must_use]
    pub fn from_multi_polygon(multi: MultiPolygon<f64>) -> Self {
        let mut polygons: Vec<Polygon<f64>> = multi
            .0
            .into_iter()
            .filter(|polygon| !is_empty_polygon(polygon))
            .collect();
        polygons.sort_by(|left, right| {
            let (lx, ly) = lower_left(left);
            let (rx, ry) = lower_left(right);
            lx.total_cmp(&rx).then(ly.total_cmp(&ry))
        });
        Self(polygons)
    }

    /// Union an arbitrary collection of polygons into a disjoint set.
    ///
    /// Members are oriented before the union: the overlay picks its fill rule
    /// from the first ring's winding, so mixed windings would drop area.
    pub fn union_of<'a, I>(polygons: I) -> Self
    where
        I: IntoIterator<Item = &'a Polygon<f64>>,
    {
        let oriented: Vec<Polygon<f64>> = polygons
            .into_iter()
            .map(|polygon| polygon.orient(Direction::Default))
            .collect();
        Self::from_multi_polygon(unary_union(&oriented))
    }

    /// Number of disjoint members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the member polygons.
    pub fn iter(&self) -> std::slice::Iter<'_, Polygon<f64>> {
        self.0.iter()
    }

    /// Borrow the member polygons.
    #[must_use]
    pub fn polygons(&self) -> &[Polygon<f64>] {
        &self.0
    }

    /// Consume the set and return its members.
    #[must_use]
    pub fn into_polygons(self) -> Vec<Polygon<f64>> {
        self.0
    }

    /// Copy the members into a `geo` multi-polygon for boolean operations.
    #[must_use]
    pub fn to_multi_polygon(&self) -> MultiPolygon<f64> {
        MultiPolygon::new(self.0.clone())
    }

    /// Sum of the unsigned areas of all members.
    #[must_use]
    pub fn total_area(&self) -> f64 {
        self.0.iter().map(Area::unsigned_area).sum()
    }

    /// Bounding rectangle of every member, or `None` when empty.
    #[must_use]
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.to_multi_polygon().bounding_rect()
    }

    /// Union this set with another.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self::union_of(self.0.iter().chain(other.0.iter()))
    }

    /// Intersect this set with another.
    ///
    /// Intersecting with an empty set yields an empty set.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        if self.is_empty() || other.is_empty() {
            return Self::empty();
        }
        Self::from_multi_polygon(
            self.to_multi_polygon()
                .intersection(&other.to_multi_polygon()),
        )
    }
}

impl From<Polygon<f64>> for PolygonSet {
    fn from(polygon: Polygon<f64>) -> Self {
        Self::new(vec![polygon])
    }
}

impl From<MultiPolygon<f64>> for PolygonSet {
    fn from(multi: MultiPolygon<f64>) -> Self {
        Self::from_multi_polygon(multi)
    }
}

impl FromIterator<Polygon<f64>> for PolygonSet {
    fn from_iter<T: IntoIterator<Item = Polygon<f64>>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for PolygonSet {
    type Item = Polygon<f64>;
    type IntoIter = std::vec::IntoIter<Polygon<f64>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a PolygonSet {
    type Item = &'a Polygon<f64>;
    type IntoIter = std::slice::Iter<'a, Polygon<f64>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A region that is either one connected polygon or several disjoint ones.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Exactly one connected component.
    Single(Polygon<f64>),
    /// Zero or several disjoint components.
    Multiple(PolygonSet),
}

impl Shape {
    /// Number of disjoint components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Multiple(set) => set.len(),
        }
    }

    /// Whether the shape covers no area at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single(polygon) => is_empty_polygon(polygon),
            Self::Multiple(set) => set.is_empty(),
        }
    }

    /// Flatten into a polygon set.
    #[must_use]
    pub fn into_set(self) -> PolygonSet {
        match self {
            Self::Single(polygon) => PolygonSet::from(polygon),
            Self::Multiple(set) => set,
        }
    }
}

impl From<PolygonSet> for Shape {
    fn from(set: PolygonSet) -> Self {
        if set.len() == 1 {
            let mut polygons = set.into_polygons();
            match polygons.pop() {
                Some(polygon) => Self::Single(polygon),
                None => Self::Multiple(PolygonSet::empty()),
            }
        } else {
            Self::Multiple(set)
        }
    }
}

/// A polygon with no vertices, standing in for "no area".
#[must_use]
pub fn empty_polygon() -> Polygon<f64> {
    Polygon::new(LineString::new(Vec::new()), Vec::new())
}

/// Whether a polygon has no exterior vertices.
#[must_use]
pub fn is_empty_polygon(polygon: &Polygon<f64>) -> bool {
    polygon.exterior().0.is_empty()
}

/// A point guaranteed to lie inside the polygon.
///
/// Falls back to the centroid for degenerate rings where no interior point
/// can be computed.
#[must_use]
pub fn representative_point(polygon: &Polygon<f64>) -> Option<Point<f64>> {
    polygon.interior_point().or_else(|| polygon.centroid())
}

/// The centroid of a polygon, used as its anchor when measuring how far
/// apart two components are.
#[must_use]
pub fn anchor_point(polygon: &Polygon<f64>) -> Option<Point<f64>> {
    polygon.centroid().or_else(|| polygon.interior_point())
}

fn lower_left(polygon: &Polygon<f64>) -> (f64, f64) {
    polygon
        .bounding_rect()
        .map_or((f64::INFINITY, f64::INFINITY), |rect| {
            (rect.min().x, rect.min().y)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::square;
    use geo::Winding;
    use geo::polygon;
    use rstest::rstest;

    #[rstest]
    fn from_multi_polygon_orders_by_lower_left_corner() {
        let multi = MultiPolygon::new(vec![square(5.0, 0.0, 1.0), square(0.0, 0.0, 1.0)]);

        let set = PolygonSet::from_multi_polygon(multi);

        let corners: Vec<(f64, f64)> = set.iter().map(lower_left).collect();
        assert_eq!(corners, vec![(0.0, 0.0), (5.0, 0.0)]);
    }

    #[rstest]
    fn new_drops_empty_polygons() {
        let set = PolygonSet::new(vec![empty_polygon(), square(0.0, 0.0, 1.0)]);
        assert_eq!(set.len(), 1);
    }

    #[rstest]
    fn union_merges_overlapping_members() {
        let left = PolygonSet::from(square(0.0, 0.0, 2.0));
        let right = PolygonSet::from(square(1.0, 1.0, 2.0));

        let merged = left.union(&right);

        assert_eq!(merged.len(), 1);
        assert!((merged.total_area() - 7.0).abs() < 1e-9);
    }

    fn same_winding_donut() -> Polygon<f64> {
        Polygon::new(
            square(0.0, 0.0, 4.0).exterior().clone(),
            vec![square(1.0, 1.0, 2.0).exterior().clone()],
        )
    }

    #[rstest]
    fn union_keeps_holes_wound_like_their_shell() {
        let donut = same_winding_donut();

        let merged = PolygonSet::union_of([&donut]);

        assert!((merged.total_area() - 12.0).abs() < 1e-9);
    }

    #[rstest]
    fn union_keeps_members_of_either_winding() {
        let clockwise = square(5.0, 0.0, 1.0).orient(Direction::Reversed);
        let counter_clockwise = square(0.0, 0.0, 1.0);

        let merged = PolygonSet::union_of([&clockwise, &counter_clockwise]);

        assert_eq!(merged.len(), 2);
        assert!((merged.total_area() - 2.0).abs() < 1e-9);
    }

    #[rstest]
    fn new_orients_shells_and_holes() {
        let set = PolygonSet::new(vec![same_winding_donut()]);
        let polygon = &set.polygons()[0];

        assert!(polygon.exterior().is_ccw());
        assert!(polygon.interiors().iter().all(|hole| hole.is_cw()));
    }

    #[rstest]
    fn intersection_with_empty_set_is_empty() {
        let set = PolygonSet::from(square(0.0, 0.0, 1.0));
        assert!(set.intersection(&PolygonSet::empty()).is_empty());
        assert!(PolygonSet::empty().intersection(&set).is_empty());
    }

    #[rstest]
    fn intersection_with_superset_preserves_area() {
        let inner = PolygonSet::from(square(1.0, 1.0, 1.0));
        let outer = PolygonSet::from(square(0.0, 0.0, 4.0));

        let clipped = inner.intersection(&outer);

        assert!((clipped.total_area() - inner.total_area()).abs() < 1e-9);
    }

    #[rstest]
    #[case(PolygonSet::empty(), 0)]
    #[case(PolygonSet::from(square(0.0, 0.0, 1.0)), 1)]
    #[case(PolygonSet::new(vec![square(0.0, 0.0, 1.0), square(3.0, 0.0, 1.0)]), 2)]
    fn shape_reports_component_count(#[case] set: PolygonSet, #[case] expected: usize) {
        let shape = Shape::from(set);
        assert_eq!(shape.component_count(), expected);
        assert_eq!(matches!(shape, Shape::Single(_)), expected == 1);
    }

    #[rstest]
    fn representative_point_lies_inside_concave_polygon() {
        let horseshoe = geo::polygon![
            (x: 0.0, y: 0.0),
            (x: 3.0, y: 0.0),
            (x: 3.0, y: 3.0),
            (x: 2.0, y: 3.0),
            (x: 2.0, y: 1.0),
            (x: 1.0, y: 1.0),
            (x: 1.0, y: 3.0),
            (x: 0.0, y: 3.0),
        ];
        let point = representative_point(&horseshoe).expect("interior point");
        assert!(geo::Contains::contains(&horseshoe, &point));
    }
}
