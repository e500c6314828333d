//! INI serialization: `ConfigFile` → commented INI string.

use super::settings::ConfigFile;
use super::size::format_size;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let minimum_tile_cover = config
        .builder
        .minimum_tile_cover
        .map(|c| c.to_string())
        .unwrap_or_default();
    let region = config.aws.region.as_deref().unwrap_or("");
    let endpoint = config.aws.endpoint.as_deref().unwrap_or("");
    let max_items = config
        .stac
        .max_items
        .map(|n| n.to_string())
        .unwrap_or_default();

    format!(
        r#"[cache]
; Cache documents and per-tile asset lookups in memory (default: true)
enabled = {}
; Seconds an entry stays valid (default: 300)
ttl = {}
; Approximate memory budget (default: 512MB)
; Supports: KB, MB, GB suffixes (e.g., 256MB, 1GB)
max_size = {}

[http]
; Request timeout in seconds for HTTP, STAC and AWS calls (default: 30)
timeout = {}

[builder]
; Concurrent asset metadata requests when building from asset lists (default: 20)
max_threads = {}
; Keep at most this many assets per quadkey, 0 for unlimited (default: 20)
maximum_items_per_tile = {}
; Drop assets covering no more than this fraction of a tile (0-1, empty to keep all)
minimum_tile_cover = {}
; Order assets within a tile by descending coverage (default: false)
tile_cover_sort = {}

[aws]
; Region override for S3 and DynamoDB (empty: AWS_REGION / profile)
region = {}
; Custom endpoint, e.g. http://localhost:4566 for LocalStack (empty: AWS default)
endpoint = {}

[stac]
; Items requested per search page (default: 500)
limit = {}
; Stop after this many items (empty: no cap)
max_items = {}

[logging]
; Log file location
file = {}
"#,
        config.cache.enabled,
        config.cache.ttl,
        format_size(config.cache.max_size),
        config.http.timeout,
        config.builder.max_threads,
        config.builder.maximum_items_per_tile,
        minimum_tile_cover,
        config.builder.tile_cover_sort,
        region,
        endpoint,
        config.stac.limit,
        max_items,
        config.logging.file.display(),
    )
}
