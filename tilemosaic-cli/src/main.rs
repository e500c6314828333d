//! tilemosaic CLI - Command-line interface
//!
//! Builds mosaic documents, stores them in any supported backend and answers
//! tile / point / bbox lookups against them.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};
use tilemosaic::coord::{BBox, Crs};

use commands::common::{FilterArgs, TmsArg};
use commands::config::ConfigCommands;
use commands::create::{CreateArgs, CreateSource};
use commands::footprint::FootprintArgs;
use commands::info::InfoArgs;
use commands::query::{Query, QueryArgs};
use commands::update::{MergeOrderArg, UpdateArgs};
use error::CliError;

#[derive(Parser)]
#[command(name = "tilemosaic")]
#[command(version = tilemosaic::VERSION)]
#[command(about = "Build and query mosaic documents", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a mosaic and store it at OUTPUT (path, s3://, dynamodb://, sqlite:///)
    Create {
        /// Destination URI
        output: String,

        /// GeoJSON footprints (`-` for stdin)
        #[arg(long, conflicts_with = "assets", required_unless_present = "assets")]
        footprints: Option<String>,

        /// Newline-separated asset list; bounds are read from --tiler
        #[arg(long, requires = "tiler")]
        assets: Option<String>,

        /// Tiler info endpoint, e.g. http://localhost:8000/cog/info
        #[arg(long)]
        tiler: Option<String>,

        /// Minimum zoom (inferred from footprints when omitted)
        #[arg(long)]
        minzoom: Option<u8>,

        /// Maximum zoom (inferred from footprints when omitted)
        #[arg(long)]
        maxzoom: Option<u8>,

        /// Index zoom (defaults to minzoom)
        #[arg(long)]
        quadkey_zoom: Option<u8>,

        /// Tiling scheme
        #[arg(long, value_enum, default_value = "web-mercator-quad")]
        tms: TmsArg,

        #[command(flatten)]
        filter: FilterArgs,

        /// Mosaic name
        #[arg(long)]
        name: Option<String>,

        /// Mosaic description
        #[arg(long)]
        description: Option<String>,

        /// Attribution text
        #[arg(long)]
        attribution: Option<String>,

        /// Prefix prepended to every asset on read
        #[arg(long)]
        asset_prefix: Option<String>,

        /// Replace an existing mosaic
        #[arg(long)]
        overwrite: bool,
    },

    /// Read asset bounds from a tiler and print GeoJSON footprints
    Footprint {
        /// Newline-separated asset list (`-` for stdin)
        input: String,

        /// Tiler info endpoint, e.g. http://localhost:8000/cog/info
        #[arg(long)]
        tiler: String,

        /// Concurrent metadata requests (default: builder.max_threads)
        #[arg(long)]
        max_threads: Option<usize>,
    },

    /// Print mosaic metadata as JSON
    Info {
        /// Mosaic URI
        uri: String,

        /// Include the list of indexed quadkeys
        #[arg(long)]
        quadkeys: bool,

        /// Search body (JSON object) for stac+ URIs
        #[arg(long)]
        stac_query: Option<String>,
    },

    /// Merge new footprints into an existing mosaic
    Update {
        /// Mosaic URI
        uri: String,

        /// GeoJSON footprints (`-` for stdin)
        footprints: String,

        /// Where new assets go relative to existing ones
        #[arg(long, value_enum, default_value = "prepend")]
        order: MergeOrderArg,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// List assets covering a tile
    Tile {
        /// Mosaic URI
        uri: String,
        z: u8,
        x: u32,
        y: u32,

        /// Search body (JSON object) for stac+ URIs
        #[arg(long)]
        stac_query: Option<String>,
    },

    /// List assets covering a point
    #[command(allow_negative_numbers = true)]
    Point {
        /// Mosaic URI
        uri: String,
        lon: f64,
        lat: f64,

        /// CRS of the coordinates
        #[arg(long, default_value = "EPSG:4326")]
        crs: Crs,

        /// Search body (JSON object) for stac+ URIs
        #[arg(long)]
        stac_query: Option<String>,
    },

    /// List assets intersecting a bounding box
    #[command(allow_negative_numbers = true)]
    Bbox {
        /// Mosaic URI
        uri: String,
        xmin: f64,
        ymin: f64,
        xmax: f64,
        ymax: f64,

        /// CRS of the coordinates
        #[arg(long, default_value = "EPSG:4326")]
        crs: Crs,

        /// Search body (JSON object) for stac+ URIs
        #[arg(long)]
        stac_query: Option<String>,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = dispatch(cli.command, cli.debug) {
        e.exit();
    }
}

fn dispatch(command: Commands, debug: bool) -> Result<(), CliError> {
    match command {
        Commands::Create {
            output,
            footprints,
            assets,
            tiler,
            minzoom,
            maxzoom,
            quadkey_zoom,
            tms,
            filter,
            name,
            description,
            attribution,
            asset_prefix,
            overwrite,
        } => {
            let source = match (footprints, assets, tiler) {
                (Some(path), _, _) => CreateSource::Footprints(path),
                (None, Some(list), Some(tiler)) => CreateSource::Assets { list, tiler },
                _ => {
                    return Err(CliError::InvalidArgument(
                        "either --footprints or --assets with --tiler is required".to_string(),
                    ))
                }
            };
            commands::create::run(CreateArgs {
                output,
                source,
                minzoom,
                maxzoom,
                quadkey_zoom,
                tms,
                filter,
                name,
                description,
                attribution,
                asset_prefix,
                overwrite,
                debug,
            })
        }

        Commands::Footprint {
            input,
            tiler,
            max_threads,
        } => commands::footprint::run(FootprintArgs {
            input,
            tiler,
            max_threads,
            debug,
        }),

        Commands::Info {
            uri,
            quadkeys,
            stac_query,
        } => commands::info::run(InfoArgs {
            uri,
            quadkeys,
            stac_query,
            debug,
        }),

        Commands::Update {
            uri,
            footprints,
            order,
            filter,
        } => commands::update::run(UpdateArgs {
            uri,
            footprints,
            order,
            filter,
            debug,
        }),

        Commands::Tile {
            uri,
            z,
            x,
            y,
            stac_query,
        } => commands::query::run(QueryArgs {
            uri,
            query: Query::Tile { x, y, z },
            stac_query,
            debug,
        }),

        Commands::Point {
            uri,
            lon,
            lat,
            crs,
            stac_query,
        } => commands::query::run(QueryArgs {
            uri,
            query: Query::Point { lon, lat, crs },
            stac_query,
            debug,
        }),

        Commands::Bbox {
            uri,
            xmin,
            ymin,
            xmax,
            ymax,
            crs,
            stac_query,
        } => commands::query::run(QueryArgs {
            uri,
            query: Query::Bbox {
                bbox: BBox::new(xmin, ymin, xmax, ymax),
                crs,
            },
            stac_query,
            debug,
        }),

        Commands::Config { command } => commands::config::run(command),
    }
}
