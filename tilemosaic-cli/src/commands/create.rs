//! Create command - build a mosaic from footprints or assets and store it.

use tilemosaic::backend::create;
use tilemosaic::builder::{build_from_assets, build_from_footprints, BuildOptions, TilerInfoReader};
use tilemosaic::http::AsyncReqwestClient;
use tilemosaic::mosaic::MosaicDocument;

use super::common::{read_asset_list, read_footprints, FilterArgs, TmsArg};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Where the index content comes from.
pub enum CreateSource {
    /// GeoJSON footprints file (`-` for stdin)
    Footprints(String),
    /// Asset list plus the tiler `/info` endpoint used to read bounds
    Assets { list: String, tiler: String },
}

/// Arguments for the create command.
pub struct CreateArgs {
    pub output: String,
    pub source: CreateSource,
    pub minzoom: Option<u8>,
    pub maxzoom: Option<u8>,
    pub quadkey_zoom: Option<u8>,
    pub tms: TmsArg,
    pub filter: FilterArgs,
    pub name: Option<String>,
    pub description: Option<String>,
    pub attribution: Option<String>,
    pub asset_prefix: Option<String>,
    pub overwrite: bool,
    pub debug: bool,
}

/// Run the create command.
pub fn run(args: CreateArgs) -> Result<(), CliError> {
    let runner = CliRunner::with_debug(args.debug)?;
    runner.log_startup("create");

    let mut options = args.filter.apply(runner.build_options())?;
    options.minzoom = args.minzoom;
    options.maxzoom = args.maxzoom;
    options.quadkey_zoom = args.quadkey_zoom;
    options.tile_matrix_set = args.tms.into();

    let config = runner.backend_config(Default::default());
    let max_threads = runner.config().builder.max_threads;
    let timeout_secs = runner.config().http.timeout;

    runner.block_on(async {
        let doc = build(&args.source, &options, max_threads, timeout_secs).await?;
        let doc = with_metadata(doc, &args);
        let quadkeys = doc.tiles().len();

        let mosaic = create(&args.output, doc, args.overwrite, &config).await?;
        eprintln!(
            "Created {} ({} quadkeys at zoom {}, {} backend)",
            mosaic.uri(),
            quadkeys,
            mosaic.document().quadkey_zoom(),
            mosaic.backend_name()
        );
        mosaic.close()?;
        Ok::<(), CliError>(())
    })
}

async fn build(
    source: &CreateSource,
    options: &BuildOptions,
    max_threads: usize,
    timeout_secs: u64,
) -> Result<MosaicDocument, CliError> {
    match source {
        CreateSource::Footprints(path) => {
            let footprints = read_footprints(path)?;
            Ok(build_from_footprints(&footprints, options)?)
        }
        CreateSource::Assets { list, tiler } => {
            let assets = read_asset_list(list)?;
            let client = AsyncReqwestClient::with_timeout(timeout_secs)
                .map_err(|e| CliError::Config(format!("Failed to create HTTP client: {}", e)))?;
            let reader = TilerInfoReader::new(client, tiler.clone());
            Ok(build_from_assets(&reader, &assets, max_threads, options).await?)
        }
    }
}

fn with_metadata(mut doc: MosaicDocument, args: &CreateArgs) -> MosaicDocument {
    if let Some(name) = &args.name {
        doc = doc.with_name(name);
    }
    if let Some(description) = &args.description {
        doc = doc.with_description(description);
    }
    if let Some(attribution) = &args.attribution {
        doc = doc.with_attribution(attribution);
    }
    if let Some(prefix) = &args.asset_prefix {
        doc = doc.with_asset_prefix(prefix);
    }
    doc
}
