//! Footprint command - read asset bounds and print them as GeoJSON.

use tilemosaic::builder::{footprints_from_assets, to_feature_collection, TilerInfoReader};
use tilemosaic::http::AsyncReqwestClient;

use super::common::{print_json, read_asset_list};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the footprint command.
pub struct FootprintArgs {
    /// Newline-separated asset list (`-` for stdin)
    pub input: String,
    /// Tiler `/info` endpoint
    pub tiler: String,
    /// Concurrent metadata requests; defaults to `builder.max_threads`
    pub max_threads: Option<usize>,
    pub debug: bool,
}

/// Run the footprint command.
pub fn run(args: FootprintArgs) -> Result<(), CliError> {
    let runner = CliRunner::with_debug(args.debug)?;
    runner.log_startup("footprint");

    let assets = read_asset_list(&args.input)?;
    let max_threads = args
        .max_threads
        .unwrap_or(runner.config().builder.max_threads);
    let client = AsyncReqwestClient::with_timeout(runner.config().http.timeout)
        .map_err(|e| CliError::Config(format!("Failed to create HTTP client: {}", e)))?;
    let reader = TilerInfoReader::new(client, args.tiler);

    let footprints = runner.block_on(footprints_from_assets(&reader, &assets, max_threads));
    if footprints.len() < assets.len() {
        eprintln!(
            "Skipped {} of {} assets (see log for details)",
            assets.len() - footprints.len(),
            assets.len()
        );
    }

    print_json(&to_feature_collection(&footprints))
}
