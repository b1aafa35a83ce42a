//! Command-line interface for computing homearea regions.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod area;
mod error;
mod geojson_output;

pub use error::CliError;

use area::{AreaArgs, run_area};

pub(crate) const ARG_AREA_REQUEST: &str = "request";
pub(crate) const ARG_TRAVELTIME_APP_ID: &str = "traveltime-app-id";
pub(crate) const ARG_TRAVELTIME_API_KEY: &str = "traveltime-api-key";
pub(crate) const ARG_TRAVELTIME_BASE_URL: &str = "traveltime-base-url";
pub(crate) const ARG_MAPBOX_TOKEN: &str = "mapbox-token";
pub(crate) const ARG_ENGLAND_ZONES: &str = "england-zones";
pub(crate) const ARG_SCOTLAND_ZONES: &str = "scotland-zones";
pub(crate) const ARG_REQUEST_INTERVAL_MS: &str = "request-interval-ms";
pub(crate) const ARG_CONCURRENT: &str = "concurrent";
pub(crate) const ARG_OUTPUT: &str = "output";
pub(crate) const ENV_AREA_REQUEST: &str = "HOMEAREA_CMDS_AREA_REQUEST_PATH";
pub(crate) const ENV_TRAVELTIME_APP_ID: &str = "HOMEAREA_CMDS_AREA_TRAVELTIME_APP_ID";
pub(crate) const ENV_TRAVELTIME_API_KEY: &str = "HOMEAREA_CMDS_AREA_TRAVELTIME_API_KEY";
pub(crate) const ENV_MAPBOX_TOKEN: &str = "HOMEAREA_CMDS_AREA_MAPBOX_TOKEN";

/// Run the homearea CLI with the current process arguments and environment.
///
/// # Errors
///
/// Returns [`CliError`] when arguments or configuration are invalid, inputs
/// cannot be read, a region cannot be computed or output cannot be written.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Area(args) => run_area(args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "homearea",
    about = "Find where to live by intersecting travel times with area rankings",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compute regions for one or more targets and print them as GeoJSON.
    Area(AreaArgs),
}

#[cfg(test)]
mod tests;
