//! Facade crate for the homearea region engine.
//!
//! This crate re-exports the core domain types: query parameters, the
//! intersection pipeline, its collaborator traits and the region map it
//! produces. Concrete HTTP and file-backed collaborators live in
//! `homearea-data`.

#![forbid(unsafe_code)]

pub use homearea_core::{
    Cache, CacheKey, CombinedRegion, CombinedRegions, Consolidation, ConsolidationStalledError,
    Containment, CoordinateInput, EmptyResultWarning, GeocodeError, GeocodeProvider,
    IntersectionPipeline, InvalidGeometryError, IsochroneProvider, Jurisdiction, MemoryCache,
    NoCache, PipelineConfig, PipelineError, PolygonSet, ProviderError, QueryParameters,
    QueryValidationError, RankCategory, RankZoneError, RankZoneRepository, RankedZone, Region,
    RegionConsolidator, RegionGeometry, RegionMap, Shape, StageTimings, TargetLocation,
    TransportMode, ZoneDataSource, ZoneSourceError, normalize, scotland_rank_cutoff,
};

#[cfg(feature = "test-support")]
pub use homearea_core::test_support;
