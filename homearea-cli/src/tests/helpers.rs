//! Helpers for writing request and dataset fixtures.

use camino::{Utf8Path, Utf8PathBuf};
use geo::Point;
use homearea_core::test_support::{StubGeocoder, StubIsochroneProvider, square};
use homearea_core::{
    CombinedRegions, IntersectionPipeline, MemoryCache, PolygonSet, QueryParameters,
    TransportMode,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;

use crate::CliError;
use crate::area::{AreaConfig, RegionEngine};

pub(super) const ORIGIN_ADDRESS: &str = "1 Origin Road";

pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    std::fs::write(path.as_std_path(), contents).expect("write fixture");
}

pub(super) fn temp_root() -> (TempDir, Utf8PathBuf) {
    let tmp = TempDir::new().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf-8 workspace");
    (tmp, root)
}

/// English zones: decile 9 under the origin, decile 3 to its east.
pub(super) fn english_zones_json() -> String {
    let zone = |code: &str, x: f64, decile: u32| -> Value {
        json!({
            "type": "Feature",
            "properties": {"lsoa11cd": code, "IMDDec0": decile},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[x, 0.0], [x + 1.0, 0.0], [x + 1.0, 1.0], [x, 1.0], [x, 0.0]]]
            }
        })
    };
    json!({
        "type": "FeatureCollection",
        "features": [zone("E01000001", 0.0, 9), zone("E01000002", 1.0, 3)]
    })
    .to_string()
}

/// Runs the real pipeline against stub geocoding and isochrones, reading
/// zones from the configured datasets.
#[derive(Debug, Default)]
pub(super) struct StubRegionEngine;

impl RegionEngine for StubRegionEngine {
    fn compute(
        &self,
        config: &AreaConfig,
        queries: &[QueryParameters],
    ) -> Result<CombinedRegions, CliError> {
        let geocoder = StubGeocoder::new().with_address(ORIGIN_ADDRESS, Point::new(0.0, 0.0));
        let isochrones = StubIsochroneProvider::new()
            .with_shape(TransportMode::Walking, PolygonSet::from(square(0.0, 0.0, 2.0)));
        let pipeline = IntersectionPipeline::new(
            geocoder,
            isochrones,
            config.zone_source(),
            Arc::new(MemoryCache::new()),
        )
        .with_config(config.pipeline_config());
        Ok(pipeline.compute_combined(queries)?)
    }
}
