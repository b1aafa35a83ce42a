//! Union of several targets' results into one combined region.

use geo::{Point, Polygon, Rect};
use log::info;

use super::{IntersectionPipeline, PipelineError};
use crate::distance::extent_and_centre;
use crate::shape::is_empty_polygon;
use crate::timing::StageTimings;
use crate::{
    Cache, GeocodeProvider, IsochroneProvider, PolygonSet, QueryParameters, RegionMap,
    ZoneDataSource,
};

/// Label of the union of every target's result.
pub const COMBINED_LABEL: &str = "All Targets Combined";

/// The union of several targets' results.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedRegion {
    /// Always [`COMBINED_LABEL`].
    pub label: String,
    /// Consolidated union.
    pub polygon: Polygon<f64>,
    /// Bounding rectangle of the union.
    pub bounds: Option<Rect<f64>>,
    /// Centroid of the union.
    pub centroid: Option<Point<f64>>,
}

/// Per-target stage maps plus their combined result.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedRegions {
    /// One map per query, in query order.
    pub targets: Vec<RegionMap>,
    /// Union of every non-empty result; `None` when all were empty.
    pub combined: Option<CombinedRegion>,
}

impl<G, I, S, C> IntersectionPipeline<G, I, S, C>
where
    G: GeocodeProvider,
    I: IsochroneProvider,
    S: ZoneDataSource,
    C: Cache,
{
    /// Compute each query's region and union the non-empty results.
    ///
    /// # Errors
    ///
    /// Returns the first query's [`PipelineError`], in query order.
    pub fn compute_combined(
        &self,
        queries: &[QueryParameters],
    ) -> Result<CombinedRegions, PipelineError> {
        let targets = queries
            .iter()
            .map(|query| self.compute_region(query))
            .collect::<Result<Vec<_>, _>>()?;
        let results: Vec<Polygon<f64>> = targets
            .iter()
            .filter_map(RegionMap::result)
            .filter(|polygon| !is_empty_polygon(polygon))
            .cloned()
            .collect();
        if results.is_empty() {
            info!("no target produced an area to combine");
            return Ok(CombinedRegions {
                targets,
                combined: None,
            });
        }

        let timings = StageTimings::new();
        let polygon = self.consolidate(&timings, "combined", &PolygonSet::union_of(&results))?;
        timings.report_and_reset();
        let (bounds, centroid) = extent_and_centre(&polygon).unzip();
        info!(
            "combined {} of {} target results",
            results.len(),
            targets.len()
        );
        Ok(CombinedRegions {
            targets,
            combined: Some(CombinedRegion {
                label: COMBINED_LABEL.to_owned(),
                polygon,
                bounds,
                centroid,
            }),
        })
    }
}
