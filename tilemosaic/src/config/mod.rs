//! Configuration file for the tilemosaic CLI and library defaults.
//!
//! Settings live in `~/.tilemosaic/config.ini`. The file is optional; every
//! key has a default. Loaded settings are turned into the explicit value
//! objects the library takes ([`CacheConfig`](crate::cache::CacheConfig),
//! [`FilterOptions`](crate::builder::FilterOptions),
//! [`AwsSettings`](crate::backend::AwsSettings),
//! [`SearchOptions`](crate::search::SearchOptions)); nothing is read from a
//! global.
//!
//! # Example
//!
//! ```
//! use tilemosaic::config::ConfigFile;
//!
//! let config = ConfigFile::default();
//! assert!(config.cache.enabled);
//! assert_eq!(config.builder.maximum_items_per_tile, 20);
//! ```

mod defaults;
mod file;
mod keys;
mod parser;
mod settings;
mod size;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use keys::{ConfigKey, ConfigKeyError};
pub use settings::{
    AwsSection, BuilderSettings, CacheSettings, ConfigFile, HttpSettings, LoggingSettings,
    StacSettings,
};
pub use size::{format_size, parse_size, SizeParseError};
