//! Read-only backend building its document from a STAC search.

use serde_json::{Map, Value};
use tracing::info;

use super::{BackendError, StorageAdapter};
use crate::builder::{build_from_footprints, Accessor, BuildOptions};
use crate::cache::{CacheKey, CacheOp};
use crate::http::AsyncHttpClient;
use crate::mosaic::MosaicDocument;
use crate::search::{search_footprints, SearchOptions};

const BACKEND: &str = "stac";

/// URI scheme prefix selecting this backend, e.g. `stac+https://host/search`.
pub const STAC_SCHEME_PREFIX: &str = "stac+";

/// Runs the search on every `read` and indexes the returned items by `id`.
pub struct StacAdapter<C: AsyncHttpClient> {
    client: C,
    url: String,
    uri: String,
    query: Map<String, Value>,
    search: SearchOptions,
    build: BuildOptions,
}

impl<C: AsyncHttpClient> StacAdapter<C> {
    /// `url` is the search endpoint itself (no `stac+` prefix).
    pub fn new(
        client: C,
        url: impl Into<String>,
        query: Map<String, Value>,
        search: SearchOptions,
        build: BuildOptions,
    ) -> Self {
        let url = url.into();
        let uri = format!("{}{}", STAC_SCHEME_PREFIX, url);
        Self {
            client,
            url,
            uri,
            query,
            search,
            build: build.with_accessor(Accessor::Id),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn query(&self) -> &Map<String, Value> {
        &self.query
    }
}

impl<C: AsyncHttpClient> StorageAdapter for StacAdapter<C> {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn uri(&self) -> &str {
        &self.uri
    }

    fn read_only(&self) -> bool {
        true
    }

    /// Different queries against one endpoint are different documents.
    fn cache_key(&self) -> CacheKey {
        CacheKey {
            uri: self.uri.clone(),
            op: CacheOp::Document,
            args: Value::Object(self.query.clone()).to_string(),
        }
    }

    async fn read(&self) -> Result<MosaicDocument, BackendError> {
        let footprints = search_footprints(&self.client, &self.url, self.query.clone(), &self.search)
            .await
            .map_err(|e| BackendError::from_search(BACKEND, &self.url, e))?;
        if footprints.is_empty() {
            return Err(BackendError::NoAssetsFound {
                query: self.cache_key().args,
            });
        }
        let doc = build_from_footprints(&footprints, &self.build)?;
        info!(
            url = %self.url,
            items = footprints.len(),
            quadkeys = doc.tiles().len(),
            "Mosaic built from search"
        );
        Ok(doc)
    }

    async fn write(&self, _doc: &MosaicDocument, _overwrite: bool) -> Result<(), BackendError> {
        Err(BackendError::unsupported(BACKEND, "write"))
    }

    async fn delete(&self) -> Result<(), BackendError> {
        Err(BackendError::unsupported(BACKEND, "delete"))
    }
}
