//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (get, set, list, path, init)
//! - [`create`] - Build a mosaic from footprints or assets and store it
//! - [`footprint`] - Read asset bounds and print GeoJSON footprints
//! - [`info`] - Mosaic metadata
//! - [`query`] - Asset lookup by tile, point or bounding box
//! - [`update`] - Merge footprints into an existing mosaic

pub mod common;
pub mod config;
pub mod create;
pub mod footprint;
pub mod info;
pub mod query;
pub mod update;
