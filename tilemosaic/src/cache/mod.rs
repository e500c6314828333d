//! Bounded, time-expiring read cache.
//!
//! Backends route their expensive reads through a shared [`MosaicCache`]:
//! whole documents (file/object fetch + parse, search results) and per-tile
//! asset lookups (table row reads). Keys identify the backend URI, the
//! operation and its arguments. Concurrent requests for the same key share a
//! single load; failed loads are never cached.
//!
//! Mutations do not go through the cache. Instead the mutating handle calls
//! [`MosaicCache::invalidate_uri`] once its write has landed.

mod config;

pub use config::{CacheConfig, DEFAULT_CACHE_MAX_SIZE, DEFAULT_CACHE_TTL};

use moka::future::Cache;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::mosaic::MosaicDocument;

/// Operation a cached value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOp {
    /// Full document read
    Document,
    /// Asset list for a set of quadkeys
    Assets,
}

/// Cache key: backend URI, operation and serialised arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub uri: String,
    pub op: CacheOp,
    pub args: String,
}

impl CacheKey {
    pub fn document(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            op: CacheOp::Document,
            args: String::new(),
        }
    }

    /// Key for the assets stored under `quadkeys`.
    pub fn assets(uri: impl Into<String>, quadkeys: &[String]) -> Self {
        Self {
            uri: uri.into(),
            op: CacheOp::Assets,
            args: quadkeys.join(","),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{:?}({})", self.uri, self.op, self.args)
    }
}

/// Rough in-memory footprint of a document in bytes.
pub fn approximate_size(doc: &MosaicDocument) -> u64 {
    let tiles: usize = doc
        .tiles()
        .iter()
        .map(|(k, assets)| k.len() + assets.iter().map(|a| a.len() + 24).sum::<usize>() + 48)
        .sum();
    (tiles + 256) as u64
}

fn weight(bytes: u64) -> u32 {
    bytes.min(u32::MAX as u64) as u32
}

/// Shared read cache.
///
/// Cheap to clone; clones share storage.
#[derive(Clone)]
pub struct MosaicCache {
    config: CacheConfig,
    documents: Cache<CacheKey, Arc<MosaicDocument>>,
    assets: Cache<CacheKey, Arc<Vec<String>>>,
}

impl fmt::Debug for MosaicCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MosaicCache")
            .field("config", &self.config)
            .field("entry_count", &self.entry_count())
            .field("weighted_size", &self.weighted_size())
            .finish()
    }
}

impl Default for MosaicCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl MosaicCache {
    /// Creates a cache. Document and asset entries each get half of the
    /// configured byte budget.
    pub fn new(config: CacheConfig) -> Self {
        let half = (config.max_size_bytes / 2).max(1);
        let ttl = config.ttl.max(std::time::Duration::from_millis(1));

        let documents = Cache::builder()
            .weigher(|_key: &CacheKey, doc: &Arc<MosaicDocument>| -> u32 {
                weight(approximate_size(doc))
            })
            .max_capacity(half)
            .time_to_live(ttl)
            .support_invalidation_closures()
            .build();
        let assets = Cache::builder()
            .weigher(|key: &CacheKey, assets: &Arc<Vec<String>>| -> u32 {
                let bytes = key.args.len() + assets.iter().map(|a| a.len() + 24).sum::<usize>();
                weight(bytes as u64 + 32)
            })
            .max_capacity(half)
            .time_to_live(ttl)
            .support_invalidation_closures()
            .build();

        Self {
            config,
            documents,
            assets,
        }
    }

    /// A cache that never retains anything.
    pub fn disabled() -> Self {
        Self::new(CacheConfig::disabled())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns the cached document for `key`, loading it on a miss.
    pub async fn document<F, E>(&self, key: CacheKey, load: F) -> Result<Arc<MosaicDocument>, E>
    where
        F: Future<Output = Result<MosaicDocument, E>>,
        E: Clone + Send + Sync + 'static,
    {
        let load = async { load.await.map(Arc::new) };
        Self::get_or_load(&self.documents, self.config.is_active(), key, load).await
    }

    /// Returns the cached asset list for `key`, loading it on a miss.
    pub async fn assets<F, E>(&self, key: CacheKey, load: F) -> Result<Arc<Vec<String>>, E>
    where
        F: Future<Output = Result<Vec<String>, E>>,
        E: Clone + Send + Sync + 'static,
    {
        let load = async { load.await.map(Arc::new) };
        Self::get_or_load(&self.assets, self.config.is_active(), key, load).await
    }

    async fn get_or_load<V, F, E>(
        cache: &Cache<CacheKey, V>,
        active: bool,
        key: CacheKey,
        load: F,
    ) -> Result<V, E>
    where
        V: Clone + Send + Sync + 'static,
        F: Future<Output = Result<V, E>>,
        E: Clone + Send + Sync + 'static,
    {
        if !active {
            return load.await;
        }
        if let Some(value) = cache.get(&key).await {
            debug!(key = %key, "Cache hit");
            return Ok(value);
        }

        debug!(key = %key, "Cache miss");
        cache
            .try_get_with(key, load)
            .await
            .map_err(|e: Arc<E>| (*e).clone())
    }

    /// Drops every entry belonging to `uri`.
    pub fn invalidate_uri(&self, uri: &str) {
        if !self.config.is_active() {
            return;
        }
        let doc_uri = uri.to_string();
        let asset_uri = uri.to_string();
        let dropped = self
            .documents
            .invalidate_entries_if(move |k, _| k.uri == doc_uri)
            .and_then(|_| {
                self.assets
                    .invalidate_entries_if(move |k, _| k.uri == asset_uri)
            });
        match dropped {
            Ok(_) => debug!(uri, "Cache entries invalidated"),
            Err(e) => warn!(uri, error = %e, "Failed to invalidate cache entries"),
        }
    }

    /// Drops everything.
    pub fn clear(&self) {
        self.documents.invalidate_all();
        self.assets.invalidate_all();
    }

    /// Number of live entries (approximate until pending tasks run).
    pub fn entry_count(&self) -> u64 {
        self.documents.entry_count() + self.assets.entry_count()
    }

    /// Total weight of live entries in bytes (approximate).
    pub fn weighted_size(&self) -> u64 {
        self.documents.weighted_size() + self.assets.weighted_size()
    }

    /// Runs moka's deferred maintenance so counters are current.
    pub async fn run_pending_tasks(&self) {
        self.documents.run_pending_tasks().await;
        self.assets.run_pending_tasks().await;
    }
}
