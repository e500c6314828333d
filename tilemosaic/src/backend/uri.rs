//! URI dispatch: picks and constructs the adapter for a location string.

use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use super::aws::AwsSettings;
use super::dynamodb::{parse_dynamodb_uri, DynamoDbAdapter};
use super::file::FileAdapter;
use super::http::HttpAdapter;
use super::memory::MemoryAdapter;
use super::s3::{parse_s3_uri, S3Adapter};
use super::sqlite::{parse_sqlite_uri, SqliteAdapter};
use super::stac::{StacAdapter, STAC_SCHEME_PREFIX};
use super::{Adapter, BackendError, MosaicBackend};
use crate::builder::BuildOptions;
use crate::cache::MosaicCache;
use crate::http::{AsyncReqwestClient, DEFAULT_HTTP_TIMEOUT_SECS};
use crate::mosaic::MosaicDocument;
use crate::search::SearchOptions;

/// Parsed storage location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    File(PathBuf),
    Http(String),
    S3 { bucket: String, key: String },
    DynamoDb { region: Option<String>, table: String },
    Sqlite { path: PathBuf, name: String },
    Memory,
    /// Search endpoint URL, without the `stac+` prefix
    Stac(String),
}

/// Everything adapters need besides the URI.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub cache: MosaicCache,
    pub http_timeout: Duration,
    pub aws: AwsSettings,
    pub search: SearchOptions,
    /// Search body for `stac+` URIs
    pub stac_query: Map<String, Value>,
    /// Builder options for search-built documents and updates
    pub build: BuildOptions,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            cache: MosaicCache::default(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            aws: AwsSettings::default(),
            search: SearchOptions::default(),
            stac_query: Map::new(),
            build: BuildOptions::default(),
        }
    }
}

/// Maps a URI or path onto a [`Locator`]. Unknown schemes are local paths.
pub fn parse_uri(uri: &str) -> Result<Locator, BackendError> {
    let invalid = |reason: &str| BackendError::InvalidUri {
        uri: uri.to_string(),
        reason: reason.to_string(),
    };

    if uri.starts_with("s3://") {
        let (bucket, key) = parse_s3_uri(uri).ok_or_else(|| invalid("expected s3://bucket/key"))?;
        return Ok(Locator::S3 { bucket, key });
    }
    if uri.starts_with("dynamodb://") {
        let (region, table) = parse_dynamodb_uri(uri)
            .ok_or_else(|| invalid("expected dynamodb://region/table"))?;
        return Ok(Locator::DynamoDb { region, table });
    }
    if let Some(url) = uri.strip_prefix(STAC_SCHEME_PREFIX) {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(Locator::Stac(url.to_string()));
        }
        return Err(invalid("expected stac+http(s)://"));
    }
    if ["http://", "https://", "ftp://"]
        .iter()
        .any(|scheme| uri.starts_with(scheme))
    {
        return Ok(Locator::Http(uri.to_string()));
    }
    if uri.starts_with("sqlite:") {
        let (path, name) = parse_sqlite_uri(uri)?;
        return Ok(Locator::Sqlite { path, name });
    }
    if uri == "memory://" || uri == "memory" {
        return Ok(Locator::Memory);
    }
    let path = uri.strip_prefix("file://").unwrap_or(uri);
    if path.is_empty() {
        return Err(invalid("empty path"));
    }
    Ok(Locator::File(PathBuf::from(path)))
}

async fn build_adapter(locator: Locator, config: &BackendConfig) -> Result<Adapter, BackendError> {
    let http_client = |url: &str| {
        AsyncReqwestClient::with_timeout(config.http_timeout.as_secs())
            .map_err(|e| BackendError::from_http("http", url, e))
    };

    Ok(match locator {
        Locator::File(path) => Adapter::File(FileAdapter::new(path)),
        Locator::Http(url) => Adapter::Http(HttpAdapter::new(http_client(&url)?, url)),
        Locator::S3 { bucket, key } => {
            Adapter::S3(S3Adapter::connect(bucket, key, &config.aws).await)
        }
        Locator::DynamoDb { region, table } => Adapter::DynamoDb(
            DynamoDbAdapter::connect(region.as_deref(), table, &config.aws).await,
        ),
        Locator::Sqlite { path, name } => Adapter::Sqlite(SqliteAdapter::open(path, name)?),
        Locator::Memory => Adapter::Memory(MemoryAdapter::new()),
        Locator::Stac(url) => Adapter::Stac(StacAdapter::new(
            http_client(&url)?,
            url,
            config.stac_query.clone(),
            config.search.clone(),
            config.build.clone(),
        )),
    })
}

/// Opens the mosaic stored at `uri`, reading it through the cache.
pub async fn open(uri: &str, config: &BackendConfig) -> Result<MosaicBackend, BackendError> {
    let locator = parse_uri(uri)?;
    debug!(uri, locator = ?locator, "Opening mosaic");
    let adapter = build_adapter(locator, config).await?;
    MosaicBackend::open_with(adapter, config.cache.clone(), config.build.clone()).await
}

/// Stores `doc` at `uri` and returns a handle to it.
pub async fn create(
    uri: &str,
    doc: MosaicDocument,
    overwrite: bool,
    config: &BackendConfig,
) -> Result<MosaicBackend, BackendError> {
    let adapter = build_adapter(parse_uri(uri)?, config).await?;
    let backend =
        MosaicBackend::from_document(adapter, doc, config.cache.clone(), config.build.clone());
    backend.write(overwrite).await?;
    Ok(backend)
}
