//! Core geometry and orchestration for the homearea engine.
//!
//! The engine answers "where could I live?" by intersecting travel-time
//! isochrones around a target with areas whose deprivation rankings clear
//! chosen thresholds. Everything here is pure computation: geocoding,
//! isochrone fetching, zone datasets and memoization are injected through
//! the [`GeocodeProvider`], [`IsochroneProvider`], [`ZoneDataSource`] and
//! [`Cache`] traits.
//!
//! Coordinates are planar `(longitude, latitude)` degrees throughout.

pub mod cache;
pub mod consolidate;
pub mod distance;
pub mod filter;
pub mod geocode;
pub mod isochrone;
pub mod normalize;
pub mod pipeline;
pub mod query;
pub mod rank;
pub mod region;
pub mod shape;
pub mod timing;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use cache::{Cache, CacheKey, MemoryCache, NoCache};
pub use consolidate::{Consolidation, ConsolidationStalledError, RegionConsolidator};
pub use filter::Containment;
pub use geocode::{GeocodeError, GeocodeProvider};
pub use isochrone::{IsochroneProvider, ProviderError, TransportMode};
pub use normalize::{CoordinateInput, InvalidGeometryError, normalize};
pub use pipeline::{
    CombinedRegion, CombinedRegions, IntersectionPipeline, PipelineConfig, PipelineError,
};
pub use query::{QueryParameters, QueryValidationError, TargetLocation};
pub use rank::{
    Jurisdiction, RankCategory, RankZoneError, RankZoneRepository, RankedZone, ZoneDataSource,
    ZoneSourceError, scotland_rank_cutoff,
};
pub use region::{EmptyResultWarning, Region, RegionGeometry, RegionMap};
pub use shape::{PolygonSet, Shape};
pub use timing::StageTimings;
