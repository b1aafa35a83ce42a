//! Bridge construction between disjoint components.

use std::collections::BTreeSet;

use geo::{Buffer, Closest, ClosestPoint, Distance, Euclidean, LineString, Point, Polygon};

use crate::shape::anchor_point;

/// Pick, for every component, the component whose anchor is nearest.
///
/// Pairs are returned once each as `(lower, higher)` indices.
pub(super) fn nearest_pairs(components: &[Polygon<f64>]) -> BTreeSet<(usize, usize)> {
    let anchors: Vec<Option<Point<f64>>> = components.iter().map(anchor_point).collect();
    let mut pairs = BTreeSet::new();
    for (index, anchor) in anchors.iter().enumerate() {
        let Some(origin) = anchor else {
            continue;
        };
        let nearest = anchors
            .iter()
            .enumerate()
            .filter(|(other, _)| *other != index)
            .filter_map(|(other, point)| point.map(|p| (other, Euclidean.distance(*origin, p))))
            .min_by(|left, right| left.1.total_cmp(&right.1));
        if let Some((other, _)) = nearest {
            pairs.insert((index.min(other), index.max(other)));
        }
    }
    pairs
}

/// The pair of boundary points, one on each polygon, that are closest.
///
/// Searches from every exterior vertex of each polygon to the other's
/// exterior ring and keeps the shortest connection found.
pub(super) fn closest_boundary_points(
    first: &Polygon<f64>,
    second: &Polygon<f64>,
) -> Option<(Point<f64>, Point<f64>)> {
    let forward = closest_from(first.exterior(), second.exterior());
    let backward = closest_from(second.exterior(), first.exterior())
        .map(|(from, to, distance)| (to, from, distance));
    [forward, backward]
        .into_iter()
        .flatten()
        .min_by(|left, right| left.2.total_cmp(&right.2))
        .map(|(from, to, _)| (from, to))
}

fn closest_from(
    source: &LineString<f64>,
    target: &LineString<f64>,
) -> Option<(Point<f64>, Point<f64>, f64)> {
    source
        .points()
        .filter_map(|vertex| match target.closest_point(&vertex) {
            Closest::Intersection(hit) | Closest::SinglePoint(hit) => {
                Some((vertex, hit, Euclidean.distance(vertex, hit)))
            }
            Closest::Indeterminate => None,
        })
        .min_by(|left, right| left.2.total_cmp(&right.2))
}

/// A thin polygon joining two points.
///
/// Coincident endpoints produce a small disc so touching components still
/// fuse.
pub(super) fn bridge(from: Point<f64>, to: Point<f64>, half_width: f64) -> Vec<Polygon<f64>> {
    if from == to {
        return from.buffer(half_width).0;
    }
    LineString::from(vec![from.0, to.0]).buffer(half_width).0
}
