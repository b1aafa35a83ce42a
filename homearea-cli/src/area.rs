//! Area command implementation for the homearea CLI.

use std::io::{BufReader, Write};
use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use homearea_core::{
    CombinedRegions, IntersectionPipeline, Jurisdiction, MemoryCache, PipelineConfig,
    QueryParameters, TargetLocation,
};
use homearea_data::{
    GeoJsonZoneSource, MapboxGeocoder, MapboxGeocoderConfig, MinIntervalLimiter,
    TravelTimeIsochroneProvider, TravelTimeIsochroneProviderConfig, ZoneSchema,
};
use homearea_fs::{create_utf8_file, open_utf8_file};
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::geojson_output::to_feature_collection;
use crate::{
    ARG_AREA_REQUEST, ARG_CONCURRENT, ARG_ENGLAND_ZONES, ARG_MAPBOX_TOKEN, ARG_OUTPUT,
    ARG_REQUEST_INTERVAL_MS, ARG_SCOTLAND_ZONES, ARG_TRAVELTIME_API_KEY, ARG_TRAVELTIME_APP_ID,
    ARG_TRAVELTIME_BASE_URL, CliError, ENV_AREA_REQUEST, ENV_MAPBOX_TOKEN,
    ENV_TRAVELTIME_API_KEY, ENV_TRAVELTIME_APP_ID,
};

/// Default spacing between outbound requests to each service.
pub(crate) const DEFAULT_REQUEST_INTERVAL_MS: u64 = 250;

/// CLI arguments for the `area` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Compute the area matching each target in a JSON request \
                 file: travel-time isochrones clipped to a radius, narrowed by \
                 deprivation rankings, then simplified. Credentials and \
                 dataset paths can come from CLI flags, configuration files, \
                 or environment variables.",
    about = "Compute regions for one or more targets"
)]
#[ortho_config(prefix = "HOMEAREA")]
pub(crate) struct AreaArgs {
    /// Path to a JSON file holding one query or a list of queries.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) request_path: Option<Utf8PathBuf>,
    /// TravelTime application id.
    #[arg(long = ARG_TRAVELTIME_APP_ID, value_name = "id")]
    #[serde(default)]
    pub(crate) traveltime_app_id: Option<String>,
    /// TravelTime API key.
    #[arg(long = ARG_TRAVELTIME_API_KEY, value_name = "key")]
    #[serde(default)]
    pub(crate) traveltime_api_key: Option<String>,
    /// Override the TravelTime service root.
    #[arg(long = ARG_TRAVELTIME_BASE_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) traveltime_base_url: Option<String>,
    /// Mapbox access token for geocoding addresses.
    #[arg(long = ARG_MAPBOX_TOKEN, value_name = "token")]
    #[serde(default)]
    pub(crate) mapbox_token: Option<String>,
    /// GeoJSON file of English LSOAs with IMD 2019 deciles.
    #[arg(long = ARG_ENGLAND_ZONES, value_name = "path")]
    #[serde(default)]
    pub(crate) england_zones: Option<Utf8PathBuf>,
    /// GeoJSON file of Scottish data zones with SIMD 2016 ranks.
    #[arg(long = ARG_SCOTLAND_ZONES, value_name = "path")]
    #[serde(default)]
    pub(crate) scotland_zones: Option<Utf8PathBuf>,
    /// Minimum milliseconds between requests to each service.
    #[arg(long = ARG_REQUEST_INTERVAL_MS, value_name = "ms")]
    #[serde(default)]
    pub(crate) request_interval_ms: Option<u64>,
    /// Fetch transport modes in parallel.
    #[arg(long = ARG_CONCURRENT, value_name = "bool")]
    #[serde(default)]
    pub(crate) concurrent: Option<bool>,
    /// Write GeoJSON here instead of stdout.
    #[arg(long = ARG_OUTPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
}

impl AreaArgs {
    pub(crate) fn into_config(self) -> Result<AreaConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        AreaConfig::try_from(merged)
    }
}

/// Resolved `area` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AreaConfig {
    /// Path to the JSON request file.
    pub(crate) request_path: Utf8PathBuf,
    pub(crate) traveltime_app_id: Option<String>,
    pub(crate) traveltime_api_key: Option<String>,
    pub(crate) traveltime_base_url: String,
    pub(crate) mapbox_token: Option<String>,
    pub(crate) england_zones: Option<Utf8PathBuf>,
    pub(crate) scotland_zones: Option<Utf8PathBuf>,
    pub(crate) request_interval: Duration,
    pub(crate) concurrent: bool,
    /// `None` writes to stdout.
    pub(crate) output: Option<Utf8PathBuf>,
}

impl AreaConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        Self::require_existing(&self.request_path, ARG_AREA_REQUEST)?;
        if let Some(path) = &self.england_zones {
            Self::require_existing(path, ARG_ENGLAND_ZONES)?;
        }
        if let Some(path) = &self.scotland_zones {
            Self::require_existing(path, ARG_SCOTLAND_ZONES)?;
        }
        Ok(())
    }

    fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
        match homearea_fs::file_is_file(path) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CliError::SourcePathNotFile {
                field,
                path: path.to_path_buf(),
            }),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                Err(CliError::MissingSourceFile {
                    field,
                    path: path.to_path_buf(),
                })
            }
            Err(source) => Err(CliError::InspectSourcePath {
                field,
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Zone datasets for every configured jurisdiction.
    pub(crate) fn zone_source(&self) -> GeoJsonZoneSource {
        let datasets = [
            (Jurisdiction::England, &self.england_zones),
            (Jurisdiction::Scotland, &self.scotland_zones),
        ];
        datasets
            .into_iter()
            .filter_map(|(jurisdiction, path)| path.clone().map(|path| (jurisdiction, path)))
            .fold(GeoJsonZoneSource::new(), |source, (jurisdiction, path)| {
                source.with_dataset(jurisdiction, path, ZoneSchema::for_jurisdiction(jurisdiction))
            })
    }

    pub(crate) fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::default().with_concurrent_fetch(self.concurrent)
    }
}

impl TryFrom<AreaArgs> for AreaConfig {
    type Error = CliError;

    fn try_from(args: AreaArgs) -> Result<Self, Self::Error> {
        let request_path = args.request_path.ok_or(CliError::MissingArgument {
            field: ARG_AREA_REQUEST,
            env: ENV_AREA_REQUEST,
        })?;
        let traveltime_base_url = args
            .traveltime_base_url
            .unwrap_or_else(|| TravelTimeIsochroneProviderConfig::default().base_url);
        let interval_ms = args
            .request_interval_ms
            .unwrap_or(DEFAULT_REQUEST_INTERVAL_MS);

        Ok(Self {
            request_path,
            traveltime_app_id: args.traveltime_app_id,
            traveltime_api_key: args.traveltime_api_key,
            traveltime_base_url,
            mapbox_token: args.mapbox_token,
            england_zones: args.england_zones,
            scotland_zones: args.scotland_zones,
            request_interval: Duration::from_millis(interval_ms),
            concurrent: args.concurrent.unwrap_or(false),
            output: args.output,
        })
    }
}

/// Computes regions for the current invocation.
pub(super) trait RegionEngine {
    fn compute(
        &self,
        config: &AreaConfig,
        queries: &[QueryParameters],
    ) -> Result<CombinedRegions, CliError>;
}

/// Wires the TravelTime, Mapbox and GeoJSON collaborators into a pipeline.
pub(super) struct DefaultRegionEngine;

impl RegionEngine for DefaultRegionEngine {
    fn compute(
        &self,
        config: &AreaConfig,
        queries: &[QueryParameters],
    ) -> Result<CombinedRegions, CliError> {
        let needs_isochrones = queries
            .iter()
            .any(|query| query.enabled_modes().next().is_some());
        let needs_geocoder = queries
            .iter()
            .any(|query| matches!(query.target, TargetLocation::Address(_)));

        let app_id = credential(
            config.traveltime_app_id.as_deref(),
            needs_isochrones,
            ARG_TRAVELTIME_APP_ID,
            ENV_TRAVELTIME_APP_ID,
        )?;
        let api_key = credential(
            config.traveltime_api_key.as_deref(),
            needs_isochrones,
            ARG_TRAVELTIME_API_KEY,
            ENV_TRAVELTIME_API_KEY,
        )?;
        let token = credential(
            config.mapbox_token.as_deref(),
            needs_geocoder,
            ARG_MAPBOX_TOKEN,
            ENV_MAPBOX_TOKEN,
        )?;

        let isochrones = TravelTimeIsochroneProvider::with_config(
            TravelTimeIsochroneProviderConfig::new(app_id, api_key)
                .with_base_url(config.traveltime_base_url.clone()),
        )
        .map_err(|source| CliError::BuildProvider {
            provider: "TravelTime",
            source,
        })?
        .with_rate_limiter(Arc::new(MinIntervalLimiter::new(config.request_interval)));
        let geocoder = MapboxGeocoder::with_config(MapboxGeocoderConfig::new(token))
            .map_err(|source| CliError::BuildProvider {
                provider: "Mapbox",
                source,
            })?
            .with_rate_limiter(Arc::new(MinIntervalLimiter::new(config.request_interval)));

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

/// A credential is only mandatory when some query needs the service.
fn credential(
    value: Option<&str>,
    required: bool,
    field: &'static str,
    env: &'static str,
) -> Result<String, CliError> {
    match value {
        Some(value) => Ok(value.to_owned()),
        None if required => Err(CliError::MissingArgument { field, env }),
        None => Ok(String::new()),
    }
}

pub(super) fn run_area(args: AreaArgs) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    run_area_with(args, &DefaultRegionEngine, &mut stdout)
}

pub(super) fn run_area_with(
    args: AreaArgs,
    engine: &dyn RegionEngine,
    stdout: &mut dyn Write,
) -> Result<(), CliError> {
    let config = resolve_area_config(args)?;
    let queries = load_area_request(&config.request_path)?;
    let regions = engine.compute(&config, &queries)?;
    info!(
        "computed {} target(s); combined region {}",
        regions.targets.len(),
        if regions.combined.is_some() { "present" } else { "empty" }
    );
    match &config.output {
        Some(path) => {
            let mut file = create_utf8_file(path).map_err(|source| CliError::CreateOutput {
                path: path.clone(),
                source,
            })?;
            write_regions(&mut file, &regions)
        }
        None => write_regions(stdout, &regions),
    }
}

fn resolve_area_config(args: AreaArgs) -> Result<AreaConfig, CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    Ok(config)
}

/// A request file holds one query or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AreaRequest {
    Many(Vec<QueryParameters>),
    One(Box<QueryParameters>),
}

/// Loads the queries in a JSON request file.
pub(super) fn load_area_request(path: &Utf8Path) -> Result<Vec<QueryParameters>, CliError> {
    let file = open_utf8_file(path).map_err(|source| CliError::OpenRequest {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);
    let request: AreaRequest =
        serde_json::from_reader(reader).map_err(|source| CliError::ParseRequest {
            path: path.to_path_buf(),
            source,
        })?;
    let queries = match request {
        AreaRequest::Many(queries) => queries,
        AreaRequest::One(query) => vec![*query],
    };
    if queries.is_empty() {
        return Err(CliError::EmptyRequest {
            path: path.to_path_buf(),
        });
    }
    Ok(queries)
}

fn write_regions(writer: &mut dyn Write, regions: &CombinedRegions) -> Result<(), CliError> {
    let collection = to_feature_collection(regions);
    let payload = serde_json::to_string_pretty(&collection).map_err(CliError::SerializeOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<AreaConfig, CliError> {
    let merged = AreaArgs::merge_from_layers(layers).map_err(CliError::from)?;
    AreaConfig::try_from(merged)
}
