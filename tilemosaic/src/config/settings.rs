//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file. The
//! conversion helpers at the bottom build the library's value objects.

use std::path::PathBuf;
use std::time::Duration;

use crate::backend::AwsSettings;
use crate::builder::FilterOptions;
use crate::cache::CacheConfig;
use crate::search::SearchOptions;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub cache: CacheSettings,
    pub http: HttpSettings,
    pub builder: BuilderSettings,
    pub aws: AwsSection,
    pub stac: StacSettings,
    pub logging: LoggingSettings,
}

/// `[cache]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub enabled: bool,
    /// Entry time-to-live in seconds
    pub ttl: u64,
    /// Approximate byte budget
    pub max_size: usize,
}

/// `[http]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    /// Request timeout in seconds
    pub timeout: u64,
}

/// `[builder]`
#[derive(Debug, Clone, PartialEq)]
pub struct BuilderSettings {
    /// Width of the asset metadata pool
    pub max_threads: usize,
    /// 0 means unlimited
    pub maximum_items_per_tile: usize,
    pub minimum_tile_cover: Option<f64>,
    pub tile_cover_sort: bool,
}

/// `[aws]`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AwsSection {
    pub region: Option<String>,
    pub endpoint: Option<String>,
}

/// `[stac]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StacSettings {
    /// Page size
    pub limit: usize,
    pub max_items: Option<usize>,
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub file: PathBuf,
}

impl ConfigFile {
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            enabled: self.cache.enabled,
            ttl: Duration::from_secs(self.cache.ttl),
            max_size_bytes: self.cache.max_size as u64,
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout)
    }

    pub fn filter_options(&self) -> FilterOptions {
        FilterOptions {
            minimum_tile_cover: self.builder.minimum_tile_cover,
            tile_cover_sort: self.builder.tile_cover_sort,
            maximum_items_per_tile: self.builder.maximum_items_per_tile,
        }
    }

    /// AWS overrides; the HTTP timeout doubles as the SDK operation timeout.
    pub fn aws_settings(&self) -> AwsSettings {
        AwsSettings {
            region: self.aws.region.clone(),
            endpoint: self.aws.endpoint.clone(),
            timeout: Some(self.http_timeout()),
        }
    }

    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            limit: self.stac.limit,
            max_items: self.stac.max_items,
        }
    }
}
