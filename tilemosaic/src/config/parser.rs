//! INI parsing: `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use ini::{Ini, Properties};
use std::path::PathBuf;
use std::str::FromStr;

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use super::size::parse_size;

/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("enabled") {
            config.cache.enabled = parse_bool("cache", "enabled", v)?;
        }
        if let Some(v) = section.get("ttl") {
            config.cache.ttl = parse_number("cache", "ttl", v, "must be a non-negative integer (seconds)")?;
        }
        if let Some(v) = section.get("max_size") {
            config.cache.max_size = parse_size(v).map_err(|_| {
                invalid("cache", "max_size", v, "expected format like '512MB', '2GB', or '1024KB'")
            })?;
        }
    }

    if let Some(section) = ini.section(Some("http")) {
        if let Some(v) = section.get("timeout") {
            let timeout: u64 = parse_number("http", "timeout", v, "must be a positive integer (seconds)")?;
            if timeout == 0 {
                return Err(invalid("http", "timeout", v, "must be a positive integer (seconds)"));
            }
            config.http.timeout = timeout;
        }
    }

    if let Some(section) = ini.section(Some("builder")) {
        if let Some(v) = section.get("max_threads") {
            let threads: usize = parse_number("builder", "max_threads", v, "must be a positive integer")?;
            if threads == 0 {
                return Err(invalid("builder", "max_threads", v, "must be a positive integer"));
            }
            config.builder.max_threads = threads;
        }
        if let Some(v) = section.get("maximum_items_per_tile") {
            config.builder.maximum_items_per_tile = parse_number(
                "builder",
                "maximum_items_per_tile",
                v,
                "must be a non-negative integer (0 = unlimited)",
            )?;
        }
        if let Some(v) = optional(section, "minimum_tile_cover") {
            let cover: f64 = parse_number("builder", "minimum_tile_cover", v, "must be a number between 0 and 1")?;
            if !(0.0..=1.0).contains(&cover) {
                return Err(invalid(
                    "builder",
                    "minimum_tile_cover",
                    v,
                    "must be a number between 0 and 1",
                ));
            }
            config.builder.minimum_tile_cover = Some(cover);
        }
        if let Some(v) = section.get("tile_cover_sort") {
            config.builder.tile_cover_sort = parse_bool("builder", "tile_cover_sort", v)?;
        }
    }

    if let Some(section) = ini.section(Some("aws")) {
        config.aws.region = optional(section, "region").map(str::to_string);
        config.aws.endpoint = optional(section, "endpoint").map(str::to_string);
    }

    if let Some(section) = ini.section(Some("stac")) {
        if let Some(v) = section.get("limit") {
            let limit: usize = parse_number("stac", "limit", v, "must be a positive integer")?;
            if limit == 0 {
                return Err(invalid("stac", "limit", v, "must be a positive integer"));
            }
            config.stac.limit = limit;
        }
        if let Some(v) = optional(section, "max_items") {
            config.stac.max_items =
                Some(parse_number("stac", "max_items", v, "must be a positive integer")?);
        }
    }

    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = optional(section, "file") {
            config.logging.file = expand_tilde(v);
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Value of `key`, treating a blank value as absent.
fn optional<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section.get(key).map(str::trim).filter(|v| !v.is_empty())
}

fn parse_number<T: FromStr>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, reason))
}

pub(super) fn parse_bool(section: &str, key: &str, value: &str) -> Result<bool, ConfigFileError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(invalid(section, key, value, "must be true or false")),
    }
}

/// Expand a leading `~` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<ConfigFile, ConfigFileError> {
        parse_ini(&Ini::load_from_str(content).unwrap())
    }

    #[test]
    fn test_empty_ini_gives_defaults() {
        assert_eq!(parse("").unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_overlays_values() {
        let config = parse(
            "[cache]\nenabled = false\nttl = 60\nmax_size = 1GB\n\
             [builder]\nmaximum_items_per_tile = 0\nminimum_tile_cover = 0.25\ntile_cover_sort = true\n\
             [aws]\nregion = eu-west-1\nendpoint =\n\
             [stac]\nlimit = 100\nmax_items = 1000\n",
        )
        .unwrap();

        assert!(!config.cache.enabled);
        assert_eq!(config.cache.ttl, 60);
        assert_eq!(config.cache.max_size, 1024 * 1024 * 1024);
        assert_eq!(config.builder.maximum_items_per_tile, 0);
        assert_eq!(config.builder.minimum_tile_cover, Some(0.25));
        assert!(config.builder.tile_cover_sort);
        assert_eq!(config.aws.region.as_deref(), Some("eu-west-1"));
        assert!(config.aws.endpoint.is_none());
        assert_eq!(config.stac.limit, 100);
        assert_eq!(config.stac.max_items, Some(1000));
    }

    #[test]
    fn test_invalid_values_fail_fast() {
        let cases = [
            ("[cache]\nttl = soon\n", "ttl"),
            ("[cache]\nmax_size = huge\n", "max_size"),
            ("[http]\ntimeout = 0\n", "timeout"),
            ("[builder]\nminimum_tile_cover = 1.5\n", "minimum_tile_cover"),
            ("[builder]\ntile_cover_sort = maybe\n", "tile_cover_sort"),
            ("[stac]\nlimit = 0\n", "limit"),
        ];
        for (content, expected_key) in cases {
            match parse(content) {
                Err(ConfigFileError::InvalidValue { key, .. }) => assert_eq!(key, expected_key),
                other => panic!("expected invalid {expected_key}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/var/log/x.log"), PathBuf::from("/var/log/x.log"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/x.log"), home.join("x.log"));
        }
    }
}
