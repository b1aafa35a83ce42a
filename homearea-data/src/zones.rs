//! Ranked zones loaded from GeoJSON feature collections.
//!
//! Each jurisdiction has its own dataset file and [`ZoneSchema`] naming the
//! feature properties that hold the zone code and each category's rank.
//! Geometries must already be in the engine's longitude/latitude degrees.

use std::collections::BTreeMap;
use std::io::BufReader;

use camino::{Utf8Path, Utf8PathBuf};
use geo::orient::Direction;
use geo::{Geometry, Orient, Polygon};
use geojson::{Feature, FeatureCollection};
use homearea_core::{Jurisdiction, RankCategory, RankedZone, ZoneDataSource, ZoneSourceError};
use homearea_fs::open_utf8_file;
use log::{debug, info};
use serde_json::Value;

/// Property names for one national dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneSchema {
    /// Property holding the zone code.
    pub code_property: String,
    /// Property holding each category's decile or rank.
    pub ranks: BTreeMap<RankCategory, String>,
}

impl ZoneSchema {
    /// A schema with a code property and no rank columns yet.
    #[must_use]
    pub fn new(code_property: impl Into<String>) -> Self {
        Self {
            code_property: code_property.into(),
            ranks: BTreeMap::new(),
        }
    }

    /// Read `category` from `property`.
    #[must_use]
    pub fn with_rank(mut self, category: RankCategory, property: impl Into<String>) -> Self {
        self.ranks.insert(category, property.into());
        self
    }

    /// English Indices of Deprivation 2019 LSOA deciles.
    #[must_use]
    pub fn england() -> Self {
        Self::new("lsoa11cd")
            .with_rank(RankCategory::Deprivation, "IMDDec0")
            .with_rank(RankCategory::Income, "IncDec")
            .with_rank(RankCategory::Crime, "CriDec")
            .with_rank(RankCategory::Health, "HDDDec")
            .with_rank(RankCategory::Education, "EduDec")
            .with_rank(RankCategory::Services, "BHSDec")
            .with_rank(RankCategory::Environment, "EnvDec")
    }

    /// Scottish Index of Multiple Deprivation 2016 data zones: an overall
    /// decile plus raw domain ranks.
    #[must_use]
    pub fn scotland() -> Self {
        Self::new("DataZone")
            .with_rank(RankCategory::Deprivation, "Decile")
            .with_rank(RankCategory::Income, "IncRank")
            .with_rank(RankCategory::Crime, "CrimeRank")
            .with_rank(RankCategory::Health, "HlthRank")
            .with_rank(RankCategory::Education, "EduRank")
            .with_rank(RankCategory::Services, "GAccRank")
            .with_rank(RankCategory::Environment, "HouseRank")
    }

    /// The published schema for `jurisdiction`.
    #[must_use]
    pub fn for_jurisdiction(jurisdiction: Jurisdiction) -> Self {
        match jurisdiction {
            Jurisdiction::England => Self::england(),
            Jurisdiction::Scotland => Self::scotland(),
        }
    }
}

#[derive(Debug, Clone)]
struct ZoneDataset {
    path: Utf8PathBuf,
    schema: ZoneSchema,
}

/// [`ZoneDataSource`] reading one GeoJSON `FeatureCollection` per
/// jurisdiction.
///
/// Jurisdictions without a dataset report
/// [`ZoneSourceError::NotConfigured`], which the repository treats as "no
/// zones" rather than a failure. A multi-polygon zone contributes one
/// [`RankedZone`] per part, all sharing its code and ranks.
#[derive(Debug, Clone, Default)]
pub struct GeoJsonZoneSource {
    datasets: BTreeMap<Jurisdiction, ZoneDataset>,
}

impl GeoJsonZoneSource {
    /// A source with no datasets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `jurisdiction` from `path` using `schema`.
    #[must_use]
    pub fn with_dataset(
        mut self,
        jurisdiction: Jurisdiction,
        path: impl Into<Utf8PathBuf>,
        schema: ZoneSchema,
    ) -> Self {
        self.datasets.insert(
            jurisdiction,
            ZoneDataset {
                path: path.into(),
                schema,
            },
        );
        self
    }

    /// Configured dataset path for `jurisdiction`.
    #[must_use]
    pub fn path(&self, jurisdiction: Jurisdiction) -> Option<&Utf8Path> {
        self.datasets
            .get(&jurisdiction)
            .map(|dataset| dataset.path.as_path())
    }
}

impl ZoneDataSource for GeoJsonZoneSource {
    fn load(&self, jurisdiction: Jurisdiction) -> Result<Vec<RankedZone>, ZoneSourceError> {
        let dataset = self
            .datasets
            .get(&jurisdiction)
            .ok_or(ZoneSourceError::NotConfigured { jurisdiction })?;
        let read_error = |message: String| ZoneSourceError::Read {
            jurisdiction,
            location: dataset.path.to_string(),
            message,
        };

        debug!("loading {jurisdiction} zones from {}", dataset.path);
        let file = open_utf8_file(&dataset.path).map_err(|err| read_error(err.to_string()))?;
        let collection: FeatureCollection = serde_json::from_reader(BufReader::new(file))
            .map_err(|err| read_error(err.to_string()))?;

        let mut zones = Vec::with_capacity(collection.features.len());
        for (index, feature) in collection.features.into_iter().enumerate() {
            zones.extend(zones_from_feature(jurisdiction, &dataset.schema, index, feature)?);
        }
        info!("loaded {} {jurisdiction} zones from {}", zones.len(), dataset.path);
        Ok(zones)
    }
}

fn zones_from_feature(
    jurisdiction: Jurisdiction,
    schema: &ZoneSchema,
    index: usize,
    feature: Feature,
) -> Result<Vec<RankedZone>, ZoneSourceError> {
    let invalid = |record: String, message: String| ZoneSourceError::InvalidRecord {
        jurisdiction,
        record,
        message,
    };

    let code = match feature.property(&schema.code_property) {
        Some(Value::String(code)) => code.clone(),
        Some(Value::Number(code)) => code.to_string(),
        _ => {
            return Err(invalid(
                format!("#{index}"),
                format!("missing {} property", schema.code_property),
            ));
        }
    };

    let mut ranks = BTreeMap::new();
    for (&category, property) in &schema.ranks {
        match feature.property(property).map(parse_rank) {
            None | Some(Ok(None)) => {}
            Some(Ok(Some(rank))) => {
                ranks.insert(category, rank);
            }
            Some(Err(message)) => {
                return Err(invalid(code, format!("{property}: {message}")));
            }
        }
    }

    let polygons = match feature.geometry {
        Some(geometry) => polygons_of(geometry).map_err(|message| invalid(code.clone(), message))?,
        None => return Err(invalid(code, "feature has no geometry".to_owned())),
    };

    Ok(polygons
        .into_iter()
        .map(|polygon| {
            let mut zone = RankedZone::new(code.clone(), jurisdiction, polygon);
            zone.ranks.clone_from(&ranks);
            zone
        })
        .collect())
}

/// Interpret a rank property. Null means "not published".
fn parse_rank(value: &Value) -> Result<Option<u32>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(number) => {
            if let Some(rank) = number.as_u64() {
                return u32::try_from(rank).map(Some).map_err(|err| err.to_string());
            }
            match number.as_f64() {
                Some(rank) if rank.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&rank) => {
                    // Integral and in range, so the cast is exact.
                    Ok(Some(rank as u32))
                }
                _ => Err(format!("{number} is not a whole non-negative rank")),
            }
        }
        Value::String(text) if text.trim().is_empty() => Ok(None),
        Value::String(text) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| format!("{text:?} is not a rank")),
        other => Err(format!("unexpected value {other}")),
    }
}

/// Rings are reoriented; published datasets do not agree on hole winding.
fn polygons_of(geometry: geojson::Geometry) -> Result<Vec<Polygon<f64>>, String> {
    let polygons = match Geometry::<f64>::try_from(geometry).map_err(|err| err.to_string())? {
        Geometry::Polygon(polygon) => vec![polygon],
        Geometry::MultiPolygon(multi) => multi.0,
        other => return Err(format!("unsupported geometry {}", geometry_name(&other))),
    };
    Ok(polygons
        .iter()
        .map(|polygon| polygon.orient(Direction::Default))
        .collect())
}

fn geometry_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}
