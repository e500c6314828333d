//! Default values for all configuration settings.

use super::file::config_directory;
use super::settings::*;
use crate::builder::{DEFAULT_MAX_ITEMS_PER_TILE, DEFAULT_MAX_THREADS};
use crate::cache::{DEFAULT_CACHE_MAX_SIZE, DEFAULT_CACHE_TTL};
use crate::http::DEFAULT_HTTP_TIMEOUT_SECS;
use crate::search::DEFAULT_STAC_LIMIT;

pub const DEFAULT_CACHE_ENABLED: bool = true;
pub const DEFAULT_CACHE_TTL_SECS: u64 = DEFAULT_CACHE_TTL.as_secs();
pub const DEFAULT_CACHE_MAX_SIZE_BYTES: usize = DEFAULT_CACHE_MAX_SIZE as usize;
pub const DEFAULT_TILE_COVER_SORT: bool = false;

/// Log file name inside the config directory.
pub const DEFAULT_LOG_FILE_NAME: &str = "tilemosaic.log";

/// Default log file path (~/.tilemosaic/tilemosaic.log).
pub fn default_log_file() -> std::path::PathBuf {
    config_directory().join(DEFAULT_LOG_FILE_NAME)
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            cache: CacheSettings {
                enabled: DEFAULT_CACHE_ENABLED,
                ttl: DEFAULT_CACHE_TTL_SECS,
                max_size: DEFAULT_CACHE_MAX_SIZE_BYTES,
            },
            http: HttpSettings {
                timeout: DEFAULT_HTTP_TIMEOUT_SECS,
            },
            builder: BuilderSettings {
                max_threads: DEFAULT_MAX_THREADS,
                maximum_items_per_tile: DEFAULT_MAX_ITEMS_PER_TILE,
                minimum_tile_cover: None,
                tile_cover_sort: DEFAULT_TILE_COVER_SORT,
            },
            aws: AwsSection::default(),
            stac: StacSettings {
                limit: DEFAULT_STAC_LIMIT,
                max_items: None,
            },
            logging: LoggingSettings {
                file: default_log_file(),
            },
        }
    }
}
