//! GeoJSON rendering of computed regions.
//!
//! Every stage region becomes one feature carrying `target`, `key` and
//! `label` properties. The combined region, when present, is appended last
//! with its bounds and centroid.

use geo::{Point, Polygon, Rect};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use homearea_core::pipeline::COMBINED_LABEL;
use homearea_core::shape::is_empty_polygon;
use homearea_core::{CombinedRegion, CombinedRegions, RegionGeometry, RegionMap};
use serde_json::json;

/// Key used for the combined feature.
pub(crate) const COMBINED_KEY: &str = "combined";

/// Render every target's regions, then the combined region.
pub(crate) fn to_feature_collection(regions: &CombinedRegions) -> FeatureCollection {
    let mut features: Vec<Feature> = regions
        .targets
        .iter()
        .enumerate()
        .flat_map(|(index, map)| target_features(index, map))
        .collect();
    features.extend(regions.combined.as_ref().map(combined_feature));
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn target_features(index: usize, map: &RegionMap) -> Vec<Feature> {
    map.iter()
        .map(|(key, region)| {
            let mut properties = JsonObject::new();
            properties.insert("target".to_owned(), json!(index));
            properties.insert("key".to_owned(), json!(key));
            properties.insert("label".to_owned(), json!(region.label));
            feature(geometry_of(&region.geometry), properties)
        })
        .collect()
}

fn combined_feature(combined: &CombinedRegion) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("key".to_owned(), json!(COMBINED_KEY));
    properties.insert("label".to_owned(), json!(COMBINED_LABEL));
    if let Some(bounds) = combined.bounds {
        properties.insert("bounds".to_owned(), bounds_json(bounds));
    }
    if let Some(centroid) = combined.centroid {
        properties.insert("centroid".to_owned(), json!([centroid.x(), centroid.y()]));
    }
    feature(polygon_geometry(&combined.polygon), properties)
}

fn feature(geometry: Option<Geometry>, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry,
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Empty regions render with a null geometry.
fn geometry_of(geometry: &RegionGeometry) -> Option<Geometry> {
    match geometry {
        RegionGeometry::Point(point) => Some(point_geometry(*point)),
        RegionGeometry::Polygon(polygon) => polygon_geometry(polygon),
        RegionGeometry::Polygons(set) if set.is_empty() => None,
        RegionGeometry::Polygons(set) => {
            Some(Geometry::new(Value::from(&set.to_multi_polygon())))
        }
    }
}

fn point_geometry(point: Point<f64>) -> Geometry {
    Geometry::new(Value::from(&point))
}

fn polygon_geometry(polygon: &Polygon<f64>) -> Option<Geometry> {
    if is_empty_polygon(polygon) {
        None
    } else {
        Some(Geometry::new(Value::from(polygon)))
    }
}

fn bounds_json(bounds: Rect<f64>) -> serde_json::Value {
    let (min, max) = (bounds.min(), bounds.max());
    json!([min.x, min.y, max.x, max.y])
}
