//! tilemosaic - spatial tile index for collections of raster assets
//!
//! A mosaic document maps quadkeys at one index zoom level to ordered lists
//! of asset identifiers. This crate builds such documents from asset
//! footprints, stores them in a range of backends (local files, HTTP, S3,
//! DynamoDB, SQLite, memory, STAC search) and answers "which assets cover
//! this tile / point / box" queries against them.
//!
//! # Example
//!
//! ```no_run
//! use tilemosaic::backend::{create, BackendConfig};
//! use tilemosaic::builder::{build_from_footprints, BuildOptions, Footprint};
//! use tilemosaic::coord::BBox;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let footprints = vec![
//!     Footprint::from_bbox("s3://bucket/a.tif", BBox::new(0.0, 0.0, 1.0, 1.0)),
//!     Footprint::from_bbox("s3://bucket/b.tif", BBox::new(0.5, 0.0, 1.5, 1.0)),
//! ];
//! let doc = build_from_footprints(&footprints, &BuildOptions::new(7, 12))?;
//!
//! let mosaic = create("mosaic.json.gz", doc, false, &BackendConfig::default()).await?;
//! let assets = mosaic.point(0.75, 0.5).await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod builder;
pub mod cache;
pub mod config;
pub mod coord;
pub mod http;
pub mod logging;
pub mod mosaic;
pub mod search;

/// Version of the tilemosaic library and CLI.
///
/// Defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
