//! Per-target region computation.
//!
//! [`IntersectionPipeline::compute_region`] resolves the target, gathers one
//! isochrone per enabled transport mode, unions them, and then narrows the
//! result by each enabled ranking filter in turn. Every intermediate stage is
//! recorded in the returned [`RegionMap`] so callers can show how the final
//! area was reached.

mod combine;
mod error;

use std::panic::resume_unwind;
use std::sync::Arc;
use std::thread;

use geo::{Buffer, Point, Polygon, Simplify};
use log::{debug, info};

pub use combine::{COMBINED_LABEL, CombinedRegion, CombinedRegions};
pub use error::PipelineError;

use crate::cache::{Cache, CacheKey};
use crate::distance::{
    EXTENT_MARGIN, bounding_circle, padded_extent, square_miles_to_square_degrees,
};
use crate::filter::{by_bounding_shape, by_min_area};
use crate::query::TargetLocation;
use crate::rank::{RankZoneError, RankZoneRepository};
use crate::region::{RESULT_KEY, TARGET_KEY};
use crate::shape::empty_polygon;
use crate::timing::StageTimings;
use crate::{
    GeocodeError, GeocodeProvider, IsochroneProvider, PolygonSet, ProviderError, QueryParameters,
    Region, RegionConsolidator, RegionGeometry, RegionMap, TransportMode, ZoneDataSource,
};

/// Key of the bounding radius stage.
pub const RADIUS_KEY: &str = "radius";

/// Key of the radius used when no transport mode is enabled.
pub const FALLBACK_RADIUS_KEY: &str = "fallback_radius";

/// Key of the union of every transport isochrone.
pub const COMBINED_TRANSPORT_KEY: &str = "combined_transport";

/// Key of the intersected region before buffering and simplification.
pub const PRE_SIMPLIFY_KEY: &str = "pre_simplify";

/// Tuning shared by every query a pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    consolidator: RegionConsolidator,
    extent_margin: f64,
    concurrent_fetch: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            consolidator: RegionConsolidator::new(),
            extent_margin: EXTENT_MARGIN,
            concurrent_fetch: false,
        }
    }
}

impl PipelineConfig {
    /// Replace the consolidator used for every stage.
    #[must_use]
    pub const fn with_consolidator(mut self, consolidator: RegionConsolidator) -> Self {
        self.consolidator = consolidator;
        self
    }

    /// Margin added around the running region before zones are narrowed.
    #[must_use]
    pub const fn with_extent_margin(mut self, margin: f64) -> Self {
        self.extent_margin = margin;
        self
    }

    /// Fetch isochrones for different modes on scoped threads.
    ///
    /// Results are merged in mode order either way.
    #[must_use]
    pub const fn with_concurrent_fetch(mut self, enabled: bool) -> Self {
        self.concurrent_fetch = enabled;
        self
    }

    /// Consolidator used for every stage.
    #[must_use]
    pub const fn consolidator(&self) -> &RegionConsolidator {
        &self.consolidator
    }

    /// Margin added around the running region.
    #[must_use]
    pub const fn extent_margin(&self) -> f64 {
        self.extent_margin
    }

    /// Whether isochrones are fetched concurrently.
    #[must_use]
    pub const fn concurrent_fetch(&self) -> bool {
        self.concurrent_fetch
    }
}

/// Computes labelled stage regions for one or more targets.
///
/// Collaborators are injected so the pipeline itself performs no I/O. The
/// cache is shared with the zone repository, so datasets and isochrones are
/// reused across queries.
#[derive(Debug)]
pub struct IntersectionPipeline<G, I, S, C> {
    geocoder: G,
    isochrones: I,
    zones: RankZoneRepository<S, Arc<C>>,
    cache: Arc<C>,
    config: PipelineConfig,
}

impl<G, I, S, C> IntersectionPipeline<G, I, S, C>
where
    G: GeocodeProvider,
    I: IsochroneProvider,
    S: ZoneDataSource,
    C: Cache,
{
    /// Assemble a pipeline from its collaborators.
    pub fn new(geocoder: G, isochrones: I, zones: S, cache: Arc<C>) -> Self {
        Self {
            geocoder,
            isochrones,
            zones: RankZoneRepository::new(zones, Arc::clone(&cache)),
            cache,
            config: PipelineConfig::default(),
        }
    }

    /// Replace the pipeline configuration.
    #[must_use]
    pub const fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Ranked zone repository backing the filters.
    #[must_use]
    pub const fn zones(&self) -> &RankZoneRepository<S, Arc<C>> {
        &self.zones
    }

    /// Compute every stage region for `query`.
    ///
    /// Stages that produce no area are recorded as empty polygons and listed
    /// in [`RegionMap::warnings`]; they are not errors.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidQuery`] before any collaborator is
    /// called when the parameters are unusable, and the failing stage's error
    /// otherwise.
    pub fn compute_region(&self, query: &QueryParameters) -> Result<RegionMap, PipelineError> {
        let timings = StageTimings::new();
        let outcome = self.compute_region_timed(query, &timings);
        timings.report_and_reset();
        outcome
    }

    /// Compute every stage region for `query`, charging stage time to
    /// `timings` instead of logging it.
    ///
    /// # Errors
    ///
    /// As [`Self::compute_region`].
    pub fn compute_region_timed(
        &self,
        query: &QueryParameters,
        timings: &StageTimings,
    ) -> Result<RegionMap, PipelineError> {
        query.validate()?;
        let key = CacheKey::new(
            "region",
            &(
                query,
                self.config.consolidator.bridge_buffer(),
                self.config.extent_margin,
            ),
        );
        self.cache
            .get_or_compute(key, || self.build_region(query, timings))
    }

    fn build_region(
        &self,
        query: &QueryParameters,
        timings: &StageTimings,
    ) -> Result<RegionMap, PipelineError> {
        let mut regions = RegionMap::new();
        let target = timings.time("geocode", || self.resolve_target(&query.target))?;
        regions.insert(
            TARGET_KEY,
            Region::new(
                format!("Target: {}", query.target.describe()),
                RegionGeometry::Point(target),
            ),
        );

        let radius = bounding_circle(target, query.max_radius_miles);
        if let Some(circle) = &radius {
            regions.insert(
                RADIUS_KEY,
                Region::new(
                    format!("{} mile Radius", query.max_radius_miles),
                    RegionGeometry::Polygon(circle.clone()),
                ),
            );
        }

        let min_area = square_miles_to_square_degrees(query.min_area_sq_miles);
        let stage = Stage {
            query,
            timings,
            min_area,
        };
        let reachable = self.transport_stage(&stage, target, radius.as_ref(), &mut regions)?;
        let ranked = self.ranking_stage(&stage, reachable, &mut regions)?;
        self.refine_stage(&stage, ranked, &mut regions)?;

        info!(
            "computed {} stages for {} ({} empty)",
            regions.len(),
            query.target.describe(),
            regions.warnings().len()
        );
        Ok(regions)
    }

    fn resolve_target(&self, target: &TargetLocation) -> Result<Point<f64>, GeocodeError> {
        match target {
            TargetLocation::Point(point) => Ok(*point),
            TargetLocation::Address(address) => {
                let key = CacheKey::new("geocode", address);
                self.cache
                    .get_or_compute(key, || self.geocoder.resolve(address))
            }
        }
    }

    fn transport_stage(
        &self,
        stage: &Stage<'_>,
        target: Point<f64>,
        radius: Option<&Polygon<f64>>,
        regions: &mut RegionMap,
    ) -> Result<PolygonSet, PipelineError> {
        let Stage {
            query,
            timings,
            min_area,
        } = *stage;
        let modes: Vec<(TransportMode, u32)> = query.enabled_modes().collect();
        if modes.is_empty() {
            let circle = match radius {
                Some(circle) => Some(circle.clone()),
                None => {
                    let fallback = bounding_circle(target, query.fallback_radius_miles);
                    if let Some(circle) = &fallback {
                        regions.insert(
                            FALLBACK_RADIUS_KEY,
                            Region::new(
                                format!("{} mile Fallback Radius", query.fallback_radius_miles),
                                RegionGeometry::Polygon(circle.clone()),
                            ),
                        );
                    }
                    fallback
                }
            };
            regions.insert(
                COMBINED_TRANSPORT_KEY,
                Region::new(
                    "Combined Transport",
                    RegionGeometry::Polygon(circle.clone().unwrap_or_else(empty_polygon)),
                ),
            );
            return Ok(circle.map(PolygonSet::from).unwrap_or_default());
        }

        let fetched = timings.time("isochrones", || self.fetch_all(target, &modes))?;
        let mut pieces = Vec::new();
        for ((mode, minutes), shape) in modes.into_iter().zip(fetched) {
            let shape = match radius {
                Some(circle) => by_bounding_shape(&shape, circle),
                None => shape,
            };
            let joined = self.consolidate(timings, mode.key(), &shape)?;
            regions.insert(
                mode.key(),
                Region::new(
                    format!("{minutes} min {}", mode.noun()),
                    RegionGeometry::Polygon(joined),
                ),
            );
            pieces.extend(shape);
        }

        let mut reachable = by_min_area(&PolygonSet::union_of(&pieces), min_area);
        if let Some(circle) = radius {
            reachable = timings.time("intersect", || {
                reachable.intersection(&PolygonSet::from(circle.clone()))
            });
        }
        let combined = self.consolidate(timings, COMBINED_TRANSPORT_KEY, &reachable)?;
        regions.insert(
            COMBINED_TRANSPORT_KEY,
            Region::new("Combined Transport", RegionGeometry::Polygon(combined)),
        );
        debug!("{} reachable polygons after transport", reachable.len());
        Ok(reachable)
    }

    fn ranking_stage(
        &self,
        stage: &Stage<'_>,
        mut running: PolygonSet,
        regions: &mut RegionMap,
    ) -> Result<PolygonSet, PipelineError> {
        let Stage {
            query,
            timings,
            min_area,
        } = *stage;
        for (category, decile) in query.enabled_categories() {
            let label = format!("{} >= {decile}", category.label());
            let Some(extent) = padded_extent(&running, self.config.extent_margin) else {
                regions.insert(
                    category.key(),
                    Region::new(label, RegionGeometry::Polygon(empty_polygon())),
                );
                continue;
            };

            let (shown, clip) = timings
                .time("zones", || {
                    let shown = self.zones.zones_in_region(category, decile, &extent)?;
                    let clip = self.zones.zones_overlapping(category, decile, &extent)?;
                    Ok::<_, RankZoneError>((shown, clip))
                })
                .map_err(|source| PipelineError::Zones { category, source })?;
            let joined = self.consolidate(timings, category.key(), &shown)?;
            regions.insert(category.key(), Region::new(label, RegionGeometry::Polygon(joined)));

            running = timings.time("intersect", || {
                by_min_area(&running.intersection(&clip), min_area)
            });
            debug!(
                "{} polygons remain after {category} >= {decile}",
                running.len()
            );
        }
        Ok(running)
    }

    fn refine_stage(
        &self,
        stage: &Stage<'_>,
        running: PolygonSet,
        regions: &mut RegionMap,
    ) -> Result<(), PipelineError> {
        let Stage { query, timings, .. } = *stage;
        regions.insert(
            PRE_SIMPLIFY_KEY,
            Region::new("Pre-simplify", geometry_of(&running)),
        );

        let refined = timings.time("refine", || {
            let mut refined = running;
            if query.buffer_factor > 0.0 && !refined.is_empty() {
                refined = PolygonSet::from_multi_polygon(
                    refined.to_multi_polygon().buffer(query.buffer_factor),
                );
            }
            if query.simplify_factor > 0.0 {
                refined = refined
                    .iter()
                    .map(|polygon| polygon.simplify(query.simplify_factor))
                    .collect();
            }
            refined
        });
        let result = self.consolidate(timings, RESULT_KEY, &refined)?;
        regions.insert(
            RESULT_KEY,
            Region::new("Intersection", RegionGeometry::Polygon(result)),
        );
        Ok(())
    }

    fn fetch_all(
        &self,
        target: Point<f64>,
        modes: &[(TransportMode, u32)],
    ) -> Result<Vec<PolygonSet>, PipelineError> {
        let fetch = |&(mode, minutes): &(TransportMode, u32)| {
            self.fetch_isochrone(target, mode, minutes)
                .map_err(|source| PipelineError::Provider { mode, source })
        };
        if !self.config.concurrent_fetch || modes.len() < 2 {
            return modes.iter().map(fetch).collect();
        }
        thread::scope(|scope| {
            let handles: Vec<_> = modes
                .iter()
                .map(|entry| scope.spawn(move || fetch(entry)))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|panic| resume_unwind(panic)))
                .collect()
        })
    }

    fn fetch_isochrone(
        &self,
        target: Point<f64>,
        mode: TransportMode,
        minutes: u32,
    ) -> Result<PolygonSet, ProviderError> {
        let key = CacheKey::new("isochrone", &(target, mode, minutes));
        self.cache.get_or_compute(key, || {
            let shape = self.isochrones.fetch(target, mode, minutes)?;
            debug!("{mode}: {} polygons within {minutes} min", shape.len());
            Ok(shape)
        })
    }

    fn consolidate(
        &self,
        timings: &StageTimings,
        stage: &str,
        set: &PolygonSet,
    ) -> Result<Polygon<f64>, PipelineError> {
        timings
            .time("consolidate", || self.config.consolidator.consolidate(set))
            .map_err(|source| PipelineError::Consolidation {
                stage: stage.to_owned(),
                source,
            })
    }
}

/// Per-call inputs shared by the stage methods.
#[derive(Clone, Copy)]
struct Stage<'a> {
    query: &'a QueryParameters,
    timings: &'a StageTimings,
    min_area: f64,
}

fn geometry_of(set: &PolygonSet) -> RegionGeometry {
    match set.polygons() {
        [] => RegionGeometry::Polygon(empty_polygon()),
        [single] => RegionGeometry::Polygon(single.clone()),
        _ => RegionGeometry::Polygons(set.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCache, NoCache};
    use crate::test_support::{MemoryZoneSource, StubGeocoder, StubIsochroneProvider, square};
    use crate::{RankCategory, rank::Jurisdiction, rank::RankedZone};
    use geo::{Area, Contains};
    use rstest::{fixture, rstest};

    const ADDRESS: &str = "1 Test Street";

    #[fixture]
    fn geocoder() -> StubGeocoder {
        StubGeocoder::new().with_address(ADDRESS, Point::new(0.0, 0.0))
    }

    #[fixture]
    fn isochrones() -> StubIsochroneProvider {
        StubIsochroneProvider::new()
            .with_shape(TransportMode::Walking, PolygonSet::from(square(-1.0, -1.0, 2.0)))
            .with_shape(TransportMode::Bus, PolygonSet::from(square(0.0, -1.0, 2.0)))
    }

    #[fixture]
    fn zones() -> MemoryZoneSource {
        MemoryZoneSource::new(vec![
            RankedZone::new("E1", Jurisdiction::England, square(-1.0, -1.0, 1.5))
                .with_rank(RankCategory::Crime, 8),
            RankedZone::new("E2", Jurisdiction::England, square(0.5, -1.0, 1.5))
                .with_rank(RankCategory::Crime, 3),
        ])
    }

    #[rstest]
    fn result_is_inside_every_stage(
        geocoder: StubGeocoder,
        isochrones: StubIsochroneProvider,
        zones: MemoryZoneSource,
    ) {
        let pipeline = IntersectionPipeline::new(geocoder, isochrones, zones, Arc::new(NoCache));
        let query = QueryParameters::for_address(ADDRESS)
            .with_travel(TransportMode::Walking, 15)
            .with_travel(TransportMode::Bus, 10)
            .with_min_rank(RankCategory::Crime, 6);

        let regions = pipeline.compute_region(&query).expect("region computes");

        let result = regions.result().expect("result recorded");
        assert!(
            (result.unsigned_area() - 2.25).abs() < 1e-3,
            "E1 lies wholly inside the transport union"
        );
        let Some(RegionGeometry::Polygon(combined)) = regions
            .get(COMBINED_TRANSPORT_KEY)
            .map(|region| &region.geometry)
        else {
            panic!("combined transport recorded");
        };
        assert!(combined.unsigned_area() >= result.unsigned_area());
        assert_eq!(
            regions.get("walking").map(|region| region.label.as_str()),
            Some("15 min Walk")
        );
        assert_eq!(
            regions.get("crime").map(|region| region.label.as_str()),
            Some("Crime Rank >= 6")
        );
    }

    #[rstest]
    fn no_modes_falls_back_to_fallback_radius(
        geocoder: StubGeocoder,
        isochrones: StubIsochroneProvider,
        zones: MemoryZoneSource,
    ) {
        let pipeline = IntersectionPipeline::new(geocoder, isochrones, zones, Arc::new(NoCache));
        let query = QueryParameters::for_address(ADDRESS).with_fallback_radius_miles(2.0);

        let regions = pipeline.compute_region(&query).expect("region computes");

        assert!(regions.get(FALLBACK_RADIUS_KEY).is_some());
        let result = regions.result().expect("result recorded");
        assert!(result.contains(&Point::new(0.0, 0.0)));
    }

    #[rstest]
    #[case::fallback(None, FALLBACK_RADIUS_KEY)]
    #[case::radius(Some(3.0), RADIUS_KEY)]
    fn no_modes_record_the_circle_as_combined_transport(
        geocoder: StubGeocoder,
        isochrones: StubIsochroneProvider,
        zones: MemoryZoneSource,
        #[case] max_radius: Option<f64>,
        #[case] circle_key: &str,
    ) {
        let pipeline = IntersectionPipeline::new(geocoder, isochrones, zones, Arc::new(NoCache));
        let mut query = QueryParameters::for_address(ADDRESS).with_fallback_radius_miles(2.0);
        if let Some(miles) = max_radius {
            query = query.with_max_radius_miles(miles);
        }

        let regions = pipeline.compute_region(&query).expect("region computes");

        let circle = regions.get(circle_key).map(|region| &region.geometry);
        let combined = regions.get(COMBINED_TRANSPORT_KEY).expect("combined recorded");
        assert_eq!(combined.label, "Combined Transport");
        assert_eq!(Some(&combined.geometry), circle);
    }

    #[rstest]
    fn each_call_times_its_own_stages(
        geocoder: StubGeocoder,
        isochrones: StubIsochroneProvider,
        zones: MemoryZoneSource,
    ) {
        let pipeline = IntersectionPipeline::new(geocoder, isochrones, zones, Arc::new(NoCache));
        let walk = QueryParameters::for_address(ADDRESS).with_travel(TransportMode::Walking, 15);
        let bus = QueryParameters::for_address(ADDRESS).with_travel(TransportMode::Bus, 10);
        let (walk_timings, bus_timings) = (StageTimings::new(), StageTimings::new());

        thread::scope(|scope| {
            let walking = scope.spawn(|| pipeline.compute_region_timed(&walk, &walk_timings));
            let riding = scope.spawn(|| pipeline.compute_region_timed(&bus, &bus_timings));
            for handle in [walking, riding] {
                let outcome = handle.join().expect("worker completes");
                assert!(outcome.is_ok());
            }
        });

        for timings in [&walk_timings, &bus_timings] {
            let stages = timings.snapshot();
            assert_eq!(stages.get("geocode").map(|stage| stage.calls), Some(1));
            assert_eq!(stages.get("isochrones").map(|stage| stage.calls), Some(1));
        }
    }

    #[rstest]
    fn provider_failures_name_the_mode(geocoder: StubGeocoder, zones: MemoryZoneSource) {
        let failure = ProviderError::ServiceError {
            code: "2".to_owned(),
            message: "quota".to_owned(),
        };
        let isochrones =
            StubIsochroneProvider::new().with_error(TransportMode::Train, failure.clone());
        let pipeline = IntersectionPipeline::new(geocoder, isochrones, zones, Arc::new(NoCache));
        let query = QueryParameters::for_address(ADDRESS).with_travel(TransportMode::Train, 30);

        let err = pipeline.compute_region(&query).expect_err("train fails");

        assert_eq!(
            err,
            PipelineError::Provider {
                mode: TransportMode::Train,
                source: failure,
            }
        );
    }

    #[rstest]
    fn invalid_queries_skip_collaborators(
        geocoder: StubGeocoder,
        isochrones: StubIsochroneProvider,
        zones: MemoryZoneSource,
    ) {
        let pipeline =
            IntersectionPipeline::new(&geocoder, &isochrones, zones, Arc::new(NoCache));
        let query = QueryParameters::for_address(ADDRESS)
            .with_travel(TransportMode::Walking, 15)
            .with_max_radius_miles(-3.0);

        let err = pipeline.compute_region(&query).expect_err("negative radius");

        assert!(matches!(err, PipelineError::InvalidQuery(_)));
        assert_eq!(geocoder.calls(), 0);
        assert_eq!(isochrones.calls(), 0);
    }

    #[rstest]
    fn repeated_queries_hit_the_cache(
        geocoder: StubGeocoder,
        isochrones: StubIsochroneProvider,
        zones: MemoryZoneSource,
    ) {
        let cache = Arc::new(MemoryCache::new());
        let pipeline = IntersectionPipeline::new(&geocoder, &isochrones, zones, Arc::clone(&cache));
        let query = QueryParameters::for_address(ADDRESS).with_travel(TransportMode::Walking, 15);

        let first = pipeline.compute_region(&query).expect("first run");
        let second = pipeline.compute_region(&query).expect("second run");

        assert_eq!(first, second);
        assert_eq!(geocoder.calls(), 1);
        assert_eq!(isochrones.calls(), 1);
        assert!(cache.stats().hits >= 1);
    }

    #[rstest]
    fn concurrent_fetch_matches_sequential(
        geocoder: StubGeocoder,
        isochrones: StubIsochroneProvider,
        zones: MemoryZoneSource,
    ) {
        let query = QueryParameters::for_address(ADDRESS)
            .with_travel(TransportMode::Walking, 15)
            .with_travel(TransportMode::Bus, 10);
        let sequential =
            IntersectionPipeline::new(&geocoder, &isochrones, zones.clone(), Arc::new(NoCache));
        let concurrent = IntersectionPipeline::new(&geocoder, &isochrones, zones, Arc::new(NoCache))
            .with_config(PipelineConfig::default().with_concurrent_fetch(true));

        let expected = sequential.compute_region(&query).expect("sequential run");
        let actual = concurrent.compute_region(&query).expect("concurrent run");

        assert_eq!(expected, actual);
    }

    #[rstest]
    fn radius_clips_the_transport_union(
        geocoder: StubGeocoder,
        isochrones: StubIsochroneProvider,
        zones: MemoryZoneSource,
    ) {
        let pipeline = IntersectionPipeline::new(geocoder, isochrones, zones, Arc::new(NoCache));
        let query = QueryParameters::for_address(ADDRESS)
            .with_travel(TransportMode::Walking, 15)
            .with_max_radius_miles(25.0);

        let regions = pipeline.compute_region(&query).expect("region computes");

        let Some(RegionGeometry::Polygon(circle)) =
            regions.get(RADIUS_KEY).map(|region| &region.geometry)
        else {
            panic!("radius recorded");
        };
        let result = regions.result().expect("result recorded");
        assert!(result.unsigned_area() <= circle.unsigned_area() + 1e-9);
        assert!(result.unsigned_area() > 0.0);
    }
}
