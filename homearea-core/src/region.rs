//! Labelled stage outputs returned to callers.

use geo::{Point, Polygon};

use crate::{PolygonSet, shape::is_empty_polygon};

/// Key of the final region in every [`RegionMap`].
pub const RESULT_KEY: &str = "result_intersection";

/// Key of the target point in every [`RegionMap`].
pub const TARGET_KEY: &str = "target";

/// The geometry a stage produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionGeometry {
    /// A bare coordinate, used for the target.
    Point(Point<f64>),
    /// One connected polygon, possibly empty.
    Polygon(Polygon<f64>),
    /// Several disjoint polygons.
    Polygons(PolygonSet),
}

impl RegionGeometry {
    /// Whether the geometry covers no area and is not a point.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Point(_) => false,
            Self::Polygon(polygon) => is_empty_polygon(polygon),
            Self::Polygons(set) => set.is_empty(),
        }
    }
}

/// One labelled stage output.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Human-readable provenance, e.g. `"15 min Walk"`.
    pub label: String,
    /// Stage geometry.
    pub geometry: RegionGeometry,
}

impl Region {
    /// Build a region.
    #[must_use]
    pub fn new(label: impl Into<String>, geometry: RegionGeometry) -> Self {
        Self {
            label: label.into(),
            geometry,
        }
    }
}

/// A stage that produced no area.
///
/// Empty stages are valid outcomes, not failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyResultWarning {
    /// Key of the empty stage.
    pub stage: String,
}

/// Stage outputs in computation order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RegionMap {
    entries: Vec<(String, Region)>,
    warnings: Vec<EmptyResultWarning>,
}

impl RegionMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `region` under `key`.
    ///
    /// Re-using a key replaces the region in place. Empty polygon stages are
    /// also noted as warnings.
    pub fn insert(&mut self, key: impl Into<String>, region: Region) {
        let key = key.into();
        if region.geometry.is_empty() {
            self.warnings.push(EmptyResultWarning { stage: key.clone() });
        }
        if let Some(slot) = self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            slot.1 = region;
        } else {
            self.entries.push((key, region));
        }
    }

    /// Region recorded under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Region> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, region)| region)
    }

    /// Keys in computation order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Entries in computation order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Region)> {
        self.entries.iter().map(|(key, region)| (key.as_str(), region))
    }

    /// Number of recorded stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stages that produced no area.
    #[must_use]
    pub fn warnings(&self) -> &[EmptyResultWarning] {
        &self.warnings
    }

    /// The final intersected polygon, if it was recorded.
    #[must_use]
    pub fn result(&self) -> Option<&Polygon<f64>> {
        match self.get(RESULT_KEY).map(|region| &region.geometry) {
            Some(RegionGeometry::Polygon(polygon)) => Some(polygon),
            _ => None,
        }
    }
}

impl IntoIterator for RegionMap {
    type Item = (String, Region);
    type IntoIter = std::vec::IntoIter<(String, Region)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
