//! Configuration key access by dotted name (`cache.ttl`, `aws.region`, ...).
//!
//! Backs the CLI's `config get` / `config set` commands. Values are validated
//! with the same rules the INI parser applies.

use std::str::FromStr;
use thiserror::Error;

use super::file::ConfigFileError;
use super::parser::{expand_tilde, parse_bool};
use super::settings::ConfigFile;
use super::size::{format_size, parse_size};

/// Errors that can occur when getting or setting configuration values.
#[derive(Debug, Error)]
pub enum ConfigKeyError {
    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {reason}")]
    ValidationFailed { key: String, reason: String },
}

/// Supported configuration keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    CacheEnabled,
    CacheTtl,
    CacheMaxSize,
    HttpTimeout,
    BuilderMaxThreads,
    BuilderMaximumItemsPerTile,
    BuilderMinimumTileCover,
    BuilderTileCoverSort,
    AwsRegion,
    AwsEndpoint,
    StacLimit,
    StacMaxItems,
    LoggingFile,
}

const ALL_KEYS: &[ConfigKey] = &[
    ConfigKey::CacheEnabled,
    ConfigKey::CacheTtl,
    ConfigKey::CacheMaxSize,
    ConfigKey::HttpTimeout,
    ConfigKey::BuilderMaxThreads,
    ConfigKey::BuilderMaximumItemsPerTile,
    ConfigKey::BuilderMinimumTileCover,
    ConfigKey::BuilderTileCoverSort,
    ConfigKey::AwsRegion,
    ConfigKey::AwsEndpoint,
    ConfigKey::StacLimit,
    ConfigKey::StacMaxItems,
    ConfigKey::LoggingFile,
];

impl FromStr for ConfigKey {
    type Err = ConfigKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ALL_KEYS
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigKeyError::UnknownKey(s.to_string()))
    }
}

impl ConfigKey {
    /// Full dotted name, e.g. "cache.max_size".
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::CacheEnabled => "cache.enabled",
            ConfigKey::CacheTtl => "cache.ttl",
            ConfigKey::CacheMaxSize => "cache.max_size",
            ConfigKey::HttpTimeout => "http.timeout",
            ConfigKey::BuilderMaxThreads => "builder.max_threads",
            ConfigKey::BuilderMaximumItemsPerTile => "builder.maximum_items_per_tile",
            ConfigKey::BuilderMinimumTileCover => "builder.minimum_tile_cover",
            ConfigKey::BuilderTileCoverSort => "builder.tile_cover_sort",
            ConfigKey::AwsRegion => "aws.region",
            ConfigKey::AwsEndpoint => "aws.endpoint",
            ConfigKey::StacLimit => "stac.limit",
            ConfigKey::StacMaxItems => "stac.max_items",
            ConfigKey::LoggingFile => "logging.file",
        }
    }

    pub fn section(&self) -> &'static str {
        self.name().split('.').next().unwrap_or(self.name())
    }

    pub fn key_name(&self) -> &'static str {
        self.name().split('.').nth(1).unwrap_or(self.name())
    }

    pub fn all() -> &'static [ConfigKey] {
        ALL_KEYS
    }

    /// Current value rendered the way it is written to the INI file.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::CacheEnabled => config.cache.enabled.to_string(),
            ConfigKey::CacheTtl => config.cache.ttl.to_string(),
            ConfigKey::CacheMaxSize => format_size(config.cache.max_size),
            ConfigKey::HttpTimeout => config.http.timeout.to_string(),
            ConfigKey::BuilderMaxThreads => config.builder.max_threads.to_string(),
            ConfigKey::BuilderMaximumItemsPerTile => {
                config.builder.maximum_items_per_tile.to_string()
            }
            ConfigKey::BuilderMinimumTileCover => config
                .builder
                .minimum_tile_cover
                .map(|c| c.to_string())
                .unwrap_or_default(),
            ConfigKey::BuilderTileCoverSort => config.builder.tile_cover_sort.to_string(),
            ConfigKey::AwsRegion => config.aws.region.clone().unwrap_or_default(),
            ConfigKey::AwsEndpoint => config.aws.endpoint.clone().unwrap_or_default(),
            ConfigKey::StacLimit => config.stac.limit.to_string(),
            ConfigKey::StacMaxItems => config
                .stac
                .max_items
                .map(|n| n.to_string())
                .unwrap_or_default(),
            ConfigKey::LoggingFile => config.logging.file.display().to_string(),
        }
    }

    /// Validates `value` and stores it. An empty value clears optional keys.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigKeyError> {
        let value = value.trim();
        match self {
            ConfigKey::CacheEnabled => config.cache.enabled = self.boolean(value)?,
            ConfigKey::CacheTtl => config.cache.ttl = self.number(value)?,
            ConfigKey::CacheMaxSize => {
                config.cache.max_size = parse_size(value).map_err(|e| self.failed(e))?
            }
            ConfigKey::HttpTimeout => config.http.timeout = self.positive(value)?,
            ConfigKey::BuilderMaxThreads => config.builder.max_threads = self.positive(value)?,
            ConfigKey::BuilderMaximumItemsPerTile => {
                config.builder.maximum_items_per_tile = self.number(value)?
            }
            ConfigKey::BuilderMinimumTileCover => {
                config.builder.minimum_tile_cover = match value {
                    "" => None,
                    v => {
                        let cover: f64 = self.number(v)?;
                        if !(0.0..=1.0).contains(&cover) {
                            return Err(self.failed("must be between 0 and 1"));
                        }
                        Some(cover)
                    }
                }
            }
            ConfigKey::BuilderTileCoverSort => config.builder.tile_cover_sort = self.boolean(value)?,
            ConfigKey::AwsRegion => config.aws.region = optional_string(value),
            ConfigKey::AwsEndpoint => config.aws.endpoint = optional_string(value),
            ConfigKey::StacLimit => config.stac.limit = self.positive(value)?,
            ConfigKey::StacMaxItems => {
                config.stac.max_items = match value {
                    "" => None,
                    v => Some(self.positive(v)?),
                }
            }
            ConfigKey::LoggingFile => {
                if value.is_empty() {
                    return Err(self.failed("path cannot be empty"));
                }
                config.logging.file = expand_tilde(value);
            }
        }
        Ok(())
    }

    fn failed(&self, reason: impl ToString) -> ConfigKeyError {
        ConfigKeyError::ValidationFailed {
            key: self.name().to_string(),
            reason: reason.to_string(),
        }
    }

    fn number<T: FromStr>(&self, value: &str) -> Result<T, ConfigKeyError> {
        value
            .parse()
            .map_err(|_| self.failed(format!("'{}' is not a valid number", value)))
    }

    fn positive<T: FromStr + Default + PartialEq>(&self, value: &str) -> Result<T, ConfigKeyError> {
        let n: T = self.number(value)?;
        if n == T::default() {
            return Err(self.failed("must be greater than zero"));
        }
        Ok(n)
    }

    fn boolean(&self, value: &str) -> Result<bool, ConfigKeyError> {
        parse_bool(self.section(), self.key_name(), value).map_err(|e| match e {
            ConfigFileError::InvalidValue { reason, .. } => self.failed(reason),
            other => self.failed(other),
        })
    }
}

fn optional_string(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_key_roundtrips_its_name() {
        for key in ConfigKey::all() {
            assert_eq!(key.name().parse::<ConfigKey>().unwrap(), *key);
        }
        assert!(matches!(
            "cache.color".parse::<ConfigKey>(),
            Err(ConfigKeyError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_key_name_parts() {
        assert_eq!(ConfigKey::CacheMaxSize.section(), "cache");
        assert_eq!(ConfigKey::CacheMaxSize.key_name(), "max_size");
    }

    #[test]
    fn test_set_and_get() {
        let mut config = ConfigFile::default();
        ConfigKey::CacheMaxSize.set(&mut config, "1GB").unwrap();
        ConfigKey::AwsRegion.set(&mut config, "eu-central-1").unwrap();
        ConfigKey::BuilderMinimumTileCover.set(&mut config, "0.1").unwrap();

        assert_eq!(ConfigKey::CacheMaxSize.get(&config), "1GB");
        assert_eq!(ConfigKey::AwsRegion.get(&config), "eu-central-1");
        assert_eq!(config.builder.minimum_tile_cover, Some(0.1));

        ConfigKey::AwsRegion.set(&mut config, "").unwrap();
        assert!(config.aws.region.is_none());
    }

    #[test]
    fn test_set_rejects_invalid_values() {
        let mut config = ConfigFile::default();
        assert!(ConfigKey::HttpTimeout.set(&mut config, "0").is_err());
        assert!(ConfigKey::CacheEnabled.set(&mut config, "perhaps").is_err());
        assert!(ConfigKey::BuilderMinimumTileCover.set(&mut config, "2").is_err());
        assert!(ConfigKey::CacheMaxSize.set(&mut config, "big").is_err());
        assert_eq!(config, ConfigFile::default());
    }
}
