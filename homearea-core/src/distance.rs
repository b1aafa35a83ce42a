//! Fixed degrees-per-mile approximations.
//!
//! The engine works in planar longitude/latitude degrees. Distances are
//! converted with a single degrees-per-mile constant and latitude is
//! compressed by a fixed factor, which is accurate enough for coarse search
//! areas around British latitudes.

use geo::{BoundingRect, Buffer, Coord, Point, Polygon, Rect, Scale};

use crate::PolygonSet;

/// Miles represented by one degree of longitude.
pub const MILES_PER_DEGREE: f64 = 50.0;

/// Factor applied to latitude extents to correct for distortion.
pub const LATITUDE_SCALE: f64 = 0.65;

/// Margin added around a region's bounding rectangle before narrowing zones.
pub const EXTENT_MARGIN: f64 = 0.001;

/// Convert miles to degrees of longitude.
#[must_use]
pub fn miles_to_degrees(miles: f64) -> f64 {
    miles / MILES_PER_DEGREE
}

/// Convert an area in square miles to square degrees.
#[must_use]
pub fn square_miles_to_square_degrees(square_miles: f64) -> f64 {
    square_miles * LATITUDE_SCALE / (MILES_PER_DEGREE * MILES_PER_DEGREE)
}

/// An ellipse approximating a circle of `radius_miles` around `center`.
///
/// Returns `None` for non-positive or non-finite radii.
///
/// # Examples
///
/// ```
/// use geo::{Contains, Point};
/// use homearea_core::distance::bounding_circle;
///
/// let circle = bounding_circle(Point::new(-0.1, 51.5), 2.0).expect("positive radius");
/// assert!(circle.contains(&Point::new(-0.1, 51.5)));
/// assert!(bounding_circle(Point::new(-0.1, 51.5), 0.0).is_none());
/// ```
#[must_use]
pub fn bounding_circle(center: Point<f64>, radius_miles: f64) -> Option<Polygon<f64>> {
    if !radius_miles.is_finite() || radius_miles <= 0.0 {
        return None;
    }
    center
        .buffer(miles_to_degrees(radius_miles))
        .scale_xy(1.0, LATITUDE_SCALE)
        .0
        .into_iter()
        .next()
}

/// The bounding rectangle of `set` grown by `margin` on every side.
#[must_use]
pub fn padded_extent(set: &PolygonSet, margin: f64) -> Option<Polygon<f64>> {
    set.bounding_rect().map(|rect| {
        Rect::new(
            Coord {
                x: rect.min().x - margin,
                y: rect.min().y - margin,
            },
            Coord {
                x: rect.max().x + margin,
                y: rect.max().y + margin,
            },
        )
        .to_polygon()
    })
}

/// The bounding rectangle and centroid of a polygon, if it has any area.
#[must_use]
pub fn extent_and_centre(polygon: &Polygon<f64>) -> Option<(Rect<f64>, Point<f64>)> {
    let rect = polygon.bounding_rect()?;
    let centre = geo::Centroid::centroid(polygon)?;
    Some((rect, centre))
}
