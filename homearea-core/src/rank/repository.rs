//! Threshold filtering and regional narrowing of ranked zones.

use std::sync::Arc;

use geo::{BoundingRect, Contains, Intersects, Point, Polygon, Rect};
use log::debug;
use rstar::{AABB, RTree, RTreeObject};

use super::{Jurisdiction, RankCategory, RankZoneError, RankedZone, ZoneDataSource, ZoneSourceError};
use crate::{
    PolygonSet,
    cache::{Cache, CacheKey},
    shape::representative_point,
};

#[derive(Debug, Clone, PartialEq)]
struct IndexedZone {
    position: usize,
    location: Point<f64>,
    extent: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedZone {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.extent
    }
}

fn envelope_of(rect: Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

/// Zones that cleared a threshold, indexed by extent.
#[derive(Debug)]
pub struct QualifyingZones {
    polygons: Vec<Polygon<f64>>,
    index: RTree<IndexedZone>,
}

impl QualifyingZones {
    /// Index the given zone boundaries.
    #[must_use]
    pub fn new(polygons: Vec<Polygon<f64>>) -> Self {
        let entries = polygons
            .iter()
            .enumerate()
            .filter_map(|(position, polygon)| {
                let location = representative_point(polygon)?;
                let rect = polygon.bounding_rect()?;
                Some(IndexedZone {
                    position,
                    location,
                    extent: envelope_of(rect),
                })
            })
            .collect();
        Self {
            polygons,
            index: RTree::bulk_load(entries),
        }
    }

    /// Number of qualifying zones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    /// Whether no zone qualified.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Borrow the zone boundaries.
    #[must_use]
    pub fn polygons(&self) -> &[Polygon<f64>] {
        &self.polygons
    }

    /// Copy every zone into a polygon set.
    #[must_use]
    pub fn to_set(&self) -> PolygonSet {
        PolygonSet::new(self.polygons.clone())
    }

    /// Zones whose representative point lies inside `boundary`.
    ///
    /// Results keep their original order.
    #[must_use]
    pub fn within(&self, boundary: &Polygon<f64>) -> PolygonSet {
        self.select(boundary, |entry| boundary.contains(&entry.location))
    }

    /// Zones sharing any area or edge with `boundary`.
    ///
    /// Results keep their original order.
    #[must_use]
    pub fn overlapping(&self, boundary: &Polygon<f64>) -> PolygonSet {
        self.select(boundary, |entry| {
            self.polygons
                .get(entry.position)
                .is_some_and(|polygon| boundary.intersects(polygon))
        })
    }

    fn select(
        &self,
        boundary: &Polygon<f64>,
        keep: impl Fn(&IndexedZone) -> bool,
    ) -> PolygonSet {
        let Some(rect) = boundary.bounding_rect() else {
            return PolygonSet::empty();
        };
        let mut hits: Vec<usize> = self
            .index
            .locate_in_envelope_intersecting(&envelope_of(rect))
            .filter(|entry| keep(entry))
            .map(|entry| entry.position)
            .collect();
        hits.sort_unstable();
        hits.into_iter()
            .filter_map(|position| self.polygons.get(position).cloned())
            .collect()
    }
}

/// Resolves which zones clear a threshold, optionally bounded to a region.
///
/// Loaded datasets, per-jurisdiction selections and national selections are
/// all memoized through the injected cache, so narrowing to a region reuses
/// the wider result instead of filtering from scratch.
#[derive(Debug)]
pub struct RankZoneRepository<S, C> {
    source: S,
    cache: C,
}

impl<S: ZoneDataSource, C: Cache> RankZoneRepository<S, C> {
    /// Create a repository over `source`.
    pub const fn new(source: S, cache: C) -> Self {
        Self { source, cache }
    }

    /// Every zone of `jurisdiction` whose `category` value clears `min_decile`.
    ///
    /// # Errors
    ///
    /// Returns [`RankZoneError::InvalidThreshold`] for deciles above 10 and
    /// [`RankZoneError::Source`] when the dataset cannot be loaded.
    pub fn zones_above(
        &self,
        category: RankCategory,
        min_decile: u8,
        jurisdiction: Jurisdiction,
    ) -> Result<PolygonSet, RankZoneError> {
        Ok(self
            .qualifying(category, min_decile, jurisdiction)?
            .to_set())
    }

    /// Every zone of every jurisdiction clearing `min_decile`.
    ///
    /// # Errors
    ///
    /// As for [`Self::zones_above`]. Jurisdictions without a configured
    /// dataset are skipped.
    pub fn national_zones_above(
        &self,
        category: RankCategory,
        min_decile: u8,
    ) -> Result<PolygonSet, RankZoneError> {
        Ok(self.national_qualifying(category, min_decile)?.to_set())
    }

    /// Qualifying zones whose representative point lies inside `boundary`.
    ///
    /// # Errors
    ///
    /// As for [`Self::national_zones_above`].
    pub fn zones_in_region(
        &self,
        category: RankCategory,
        min_decile: u8,
        boundary: &Polygon<f64>,
    ) -> Result<PolygonSet, RankZoneError> {
        let zones = self.national_qualifying(category, min_decile)?;
        let bounded = zones.within(boundary);
        debug!(
            "{category} >= {min_decile}: {} of {} qualifying zones inside region",
            bounded.len(),
            zones.len()
        );
        Ok(bounded)
    }

    /// Qualifying zones sharing any area with `boundary`.
    ///
    /// Unlike [`Self::zones_in_region`] this keeps zones that straddle the
    /// boundary, which is what clipping a region against the zones needs.
    ///
    /// # Errors
    ///
    /// As for [`Self::national_zones_above`].
    pub fn zones_overlapping(
        &self,
        category: RankCategory,
        min_decile: u8,
        boundary: &Polygon<f64>,
    ) -> Result<PolygonSet, RankZoneError> {
        Ok(self
            .national_qualifying(category, min_decile)?
            .overlapping(boundary))
    }

    /// Indexed zones of one jurisdiction clearing `min_decile`.
    ///
    /// # Errors
    ///
    /// As for [`Self::zones_above`].
    pub fn qualifying(
        &self,
        category: RankCategory,
        min_decile: u8,
        jurisdiction: Jurisdiction,
    ) -> Result<Arc<QualifyingZones>, RankZoneError> {
        let threshold = jurisdiction
            .stored_threshold(category, min_decile)
            .ok_or(RankZoneError::InvalidThreshold {
                category,
                threshold: min_decile,
            })?;
        let key = CacheKey::new("zones.above", &(category, min_decile, jurisdiction));
        self.cache.get_or_compute(key, || {
            let zones = self.load(jurisdiction)?;
            let polygons: Vec<Polygon<f64>> = zones
                .iter()
                .filter(|zone| zone.rank(category).is_some_and(|value| value >= threshold))
                .map(|zone| zone.polygon.clone())
                .collect();
            debug!(
                "{jurisdiction} {category}: {} of {} zones at or above {threshold}",
                polygons.len(),
                zones.len()
            );
            Ok(Arc::new(QualifyingZones::new(polygons)))
        })
    }

    /// Indexed zones of every jurisdiction clearing `min_decile`.
    ///
    /// # Errors
    ///
    /// As for [`Self::national_zones_above`].
    pub fn national_qualifying(
        &self,
        category: RankCategory,
        min_decile: u8,
    ) -> Result<Arc<QualifyingZones>, RankZoneError> {
        let key = CacheKey::new("zones.national", &(category, min_decile));
        self.cache.get_or_compute(key, || {
            let mut polygons = Vec::new();
            for jurisdiction in Jurisdiction::ALL {
                match self.qualifying(category, min_decile, jurisdiction) {
                    Ok(zones) => polygons.extend_from_slice(zones.polygons()),
                    Err(RankZoneError::Source(ZoneSourceError::NotConfigured { .. })) => {
                        debug!("skipping {jurisdiction}: no dataset configured");
                    }
                    Err(err) => return Err(err),
                }
            }
            Ok(Arc::new(QualifyingZones::new(polygons)))
        })
    }

    fn load(&self, jurisdiction: Jurisdiction) -> Result<Arc<Vec<RankedZone>>, RankZoneError> {
        let key = CacheKey::new("zones.load", &jurisdiction);
        self.cache.get_or_compute(key, || {
            let zones = self.source.load(jurisdiction)?;
            debug!("loaded {} {jurisdiction} zones", zones.len());
            Ok(Arc::new(zones))
        })
    }
}
