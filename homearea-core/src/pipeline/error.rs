use thiserror::Error;

use crate::rank::RankZoneError;
use crate::{
    ConsolidationStalledError, GeocodeError, ProviderError, QueryValidationError, RankCategory,
    TransportMode,
};

/// Errors from [`crate::IntersectionPipeline`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// The query failed validation before any work began.
    #[error("invalid query: {0}")]
    InvalidQuery(#[from] QueryValidationError),
    /// The target address could not be resolved.
    #[error(transparent)]
    Geocode(#[from] GeocodeError),
    /// An isochrone fetch failed.
    #[error("{mode} isochrone fetch failed: {source}")]
    Provider {
        /// Mode being fetched.
        mode: TransportMode,
        /// Provider failure, unmodified.
        #[source]
        source: ProviderError,
    },
    /// A stage could not be consolidated into one polygon.
    #[error("failed to consolidate stage {stage}: {source}")]
    Consolidation {
        /// Key of the stage being consolidated.
        stage: String,
        /// Consolidation failure.
        #[source]
        source: ConsolidationStalledError,
    },
    /// Qualifying zones could not be resolved.
    #[error("failed to resolve {category} zones: {source}")]
    Zones {
        /// Category being filtered.
        category: RankCategory,
        /// Repository failure.
        #[source]
        source: RankZoneError,
    },
}
