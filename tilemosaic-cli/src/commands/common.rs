//! Common types and utilities shared across CLI commands.

use std::io::Read;

use clap::{Args, ValueEnum};
use serde::Serialize;
use serde_json::{Map, Value};
use tilemosaic::builder::{parse_footprints, Accessor, BuildOptions, Footprint};
use tilemosaic::coord::TileMatrixSet;

use crate::error::CliError;

/// Tile matrix set selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Default)]
pub enum TmsArg {
    /// Web Mercator quadtree (EPSG:3857)
    #[default]
    WebMercatorQuad,
    /// Geographic quadtree with a 2x1 root (EPSG:4326)
    WorldCrs84Quad,
}

impl From<TmsArg> for TileMatrixSet {
    fn from(arg: TmsArg) -> Self {
        match arg {
            TmsArg::WebMercatorQuad => TileMatrixSet::WebMercatorQuad,
            TmsArg::WorldCrs84Quad => TileMatrixSet::WorldCrs84Quad,
        }
    }
}

/// Builder flags shared by `create` and `update`.
#[derive(Debug, Clone, Args)]
pub struct FilterArgs {
    /// Where to read the asset identifier: `path`, `id` or `property:<name>`
    #[arg(long, default_value = "path")]
    pub accessor: String,

    /// Drop assets covering no more than this fraction of a tile (0-1)
    #[arg(long)]
    pub min_tile_cover: Option<f64>,

    /// Order assets within a tile by descending coverage
    #[arg(long)]
    pub tile_cover_sort: bool,

    /// Keep at most this many assets per quadkey (0 for unlimited)
    #[arg(long)]
    pub max_items: Option<usize>,
}

impl FilterArgs {
    /// Overlay the flags onto options seeded from the config file.
    pub fn apply(&self, mut options: BuildOptions) -> Result<BuildOptions, CliError> {
        options.accessor = parse_accessor(&self.accessor)?;
        if let Some(cover) = self.min_tile_cover {
            options.filter = options.filter.with_minimum_tile_cover(cover);
        }
        if self.tile_cover_sort {
            options.filter = options.filter.with_tile_cover_sort(true);
        }
        if let Some(max) = self.max_items {
            options.filter = options.filter.with_maximum_items_per_tile(max);
        }
        options
            .filter
            .validate()
            .map_err(|e| CliError::InvalidArgument(e.to_string()))?;
        Ok(options)
    }
}

/// Parse an accessor flag value.
pub fn parse_accessor(value: &str) -> Result<Accessor, CliError> {
    match value {
        "path" => Ok(Accessor::Path),
        "id" => Ok(Accessor::Id),
        other => match other.strip_prefix("property:") {
            Some(name) if !name.is_empty() => Ok(Accessor::Property(name.to_string())),
            _ => Err(CliError::InvalidArgument(format!(
                "unknown accessor '{}', expected path, id or property:<name>",
                value
            ))),
        },
    }
}

/// Read a file, or stdin when `path` is `-`.
pub fn read_input(path: &str) -> Result<Vec<u8>, CliError> {
    let failed = |error| CliError::FileRead {
        path: path.to_string(),
        error,
    };

    if path == "-" {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf).map_err(failed)?;
        Ok(buf)
    } else {
        std::fs::read(path).map_err(failed)
    }
}

/// Read GeoJSON footprints from a file or stdin.
pub fn read_footprints(path: &str) -> Result<Vec<Footprint>, CliError> {
    Ok(parse_footprints(&read_input(path)?)?)
}

/// Read a newline-separated asset list, skipping blanks and `#` comments.
pub fn read_asset_list(path: &str) -> Result<Vec<String>, CliError> {
    let bytes = read_input(path)?;
    Ok(parse_asset_list(&String::from_utf8_lossy(&bytes)))
}

fn parse_asset_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Parse the `--stac-query` JSON object.
pub fn parse_stac_query(query: Option<&str>) -> Result<Map<String, Value>, CliError> {
    match query {
        None => Ok(Map::new()),
        Some(text) => match serde_json::from_str(text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(CliError::InvalidArgument(
                "--stac-query must be a JSON object".to_string(),
            )),
            Err(e) => Err(CliError::InvalidArgument(format!("--stac-query: {}", e))),
        },
    }
}

/// Pretty-print a value as JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
