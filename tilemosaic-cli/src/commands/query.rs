//! Query commands - list the assets covering a tile, a point or a box.

use tilemosaic::backend::open;
use tilemosaic::coord::{BBox, Crs};

use super::common::{parse_stac_query, print_json};
use crate::error::CliError;
use crate::runner::CliRunner;

/// The geographic query to resolve.
#[derive(Debug, Clone)]
pub enum Query {
    Tile { x: u32, y: u32, z: u8 },
    Point { lon: f64, lat: f64, crs: Crs },
    Bbox { bbox: BBox, crs: Crs },
}

impl Query {
    fn command(&self) -> &'static str {
        match self {
            Query::Tile { .. } => "tile",
            Query::Point { .. } => "point",
            Query::Bbox { .. } => "bbox",
        }
    }
}

/// Arguments shared by the query commands.
pub struct QueryArgs {
    pub uri: String,
    pub query: Query,
    pub stac_query: Option<String>,
    pub debug: bool,
}

/// Run a query command, printing the asset list as a JSON array.
pub fn run(args: QueryArgs) -> Result<(), CliError> {
    let runner = CliRunner::with_debug(args.debug)?;
    runner.log_startup(args.query.command());
    let config = runner.backend_config(parse_stac_query(args.stac_query.as_deref())?);

    let assets = runner.block_on(async {
        let mosaic = open(&args.uri, &config).await?;
        let assets = match &args.query {
            Query::Tile { x, y, z } => mosaic.tile(*x, *y, *z).await?,
            Query::Point { lon, lat, crs } => mosaic.assets_for_point(*lon, *lat, *crs).await?,
            Query::Bbox { bbox, crs } => mosaic.assets_for_bbox(*bbox, *crs).await?,
        };
        mosaic.close()?;
        Ok::<_, CliError>(assets)
    })?;

    print_json(&assets)
}
