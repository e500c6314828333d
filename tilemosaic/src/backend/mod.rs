//! Storage backends and the tile/point/bbox resolution API
//!
//! A [`StorageAdapter`] knows how to read, write, update and delete a mosaic
//! document in one kind of store. [`Adapter`] is the closed set of adapters
//! selected from a URI by [`open`]/[`create`]; [`MosaicBackend`] wraps one
//! adapter with the loaded document and the shared read cache and answers
//! asset queries against it.
//!
//! | Scheme | Adapter | Writes |
//! |---|---|---|
//! | `file://`, bare path | [`FileAdapter`] | whole file |
//! | `http(s)://`, `ftp://` | [`HttpAdapter`] | read-only |
//! | `s3://bucket/key` | [`S3Adapter`] | whole object |
//! | `dynamodb://region/table` | [`DynamoDbAdapter`] | per-quadkey rows |
//! | `sqlite:///path:name` | [`SqliteAdapter`] | per-quadkey rows |
//! | `memory://` | [`MemoryAdapter`] | held reference |
//! | `stac+https://...` | [`StacAdapter`] | read-only |

mod aws;
mod dynamodb;
mod error;
mod file;
mod http;
mod memory;
mod s3;
mod sqlite;
mod stac;
mod uri;

pub use aws::AwsSettings;
pub use dynamodb::{parse_dynamodb_uri, DynamoDbAdapter, BATCH_GET_SIZE, BATCH_SIZE, METADATA_KEY};
pub use error::BackendError;
pub use file::FileAdapter;
pub use http::HttpAdapter;
pub use memory::MemoryAdapter;
pub use s3::{parse_s3_uri, S3Adapter};
pub use sqlite::{parse_sqlite_uri, SqliteAdapter, METADATA_TABLE, SCHEMA_VERSION};
pub use stac::{StacAdapter, STAC_SCHEME_PREFIX};
pub use uri::{create, open, parse_uri, BackendConfig, Locator};

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

use crate::builder::{build_from_footprints, BuildOptions, Footprint};
use crate::cache::{CacheKey, MosaicCache};
use crate::coord::{
    find_quadkeys, tiles_in_bbox, BBox, CoordTransformer, Crs, TileCoord, TileMatrixSet,
};
use crate::http::AsyncReqwestClient;
use crate::mosaic::{dedup_preserving_order, Center, MergeOrder, MosaicDocument};

/// One kind of mosaic store.
///
/// Whole-document stores (file, object, HTTP) only implement the required
/// methods; row-oriented stores (DynamoDB, SQLite) also override
/// [`apply_update`](Self::apply_update), [`get_assets`](Self::get_assets) and
/// [`list_quadkeys`](Self::list_quadkeys) because their `read` returns
/// document metadata without tiles.
pub trait StorageAdapter: Send + Sync {
    /// Short backend name used in errors and logs.
    fn name(&self) -> &'static str;

    /// Canonical URI of the stored document.
    fn uri(&self) -> &str;

    /// True when tiles live in per-quadkey rows rather than in the document.
    fn stores_rows(&self) -> bool {
        false
    }

    fn read_only(&self) -> bool {
        false
    }

    /// False for adapters whose `read` should bypass the shared cache.
    fn cacheable(&self) -> bool {
        true
    }

    /// Key the document read is cached under.
    fn cache_key(&self) -> CacheKey {
        CacheKey::document(self.uri())
    }

    fn read(&self) -> impl Future<Output = Result<MosaicDocument, BackendError>> + Send;

    /// Persists the whole document, failing with `AlreadyExists` when the
    /// target holds content and `overwrite` is false.
    fn write(
        &self,
        doc: &MosaicDocument,
        overwrite: bool,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Merges `delta` into the stored document and persists the result.
    ///
    /// Returns the merged document and the number of touched quadkeys.
    /// Whole-document stores merge into `current` and rewrite it; row stores
    /// merge against what is stored now.
    fn apply_update(
        &self,
        current: &MosaicDocument,
        delta: &MosaicDocument,
        order: MergeOrder,
    ) -> impl Future<Output = Result<(MosaicDocument, usize), BackendError>> + Send {
        async move {
            let mut merged = current.clone();
            let changed = merged.merge(delta, order)?;
            self.write(&merged, true).await?;
            Ok((merged, changed.len()))
        }
    }

    /// Concatenated asset lists of `quadkeys`, in the given order.
    fn get_assets(
        &self,
        doc: &MosaicDocument,
        quadkeys: &[String],
    ) -> impl Future<Output = Result<Vec<String>, BackendError>> + Send {
        let assets = assets_from_document(doc, quadkeys);
        async move { Ok(assets) }
    }

    /// Every quadkey holding assets, sorted.
    fn list_quadkeys(
        &self,
        doc: &MosaicDocument,
    ) -> impl Future<Output = Result<Vec<String>, BackendError>> + Send {
        let quadkeys: Vec<String> = doc.quadkeys().map(str::to_string).collect();
        async move { Ok(quadkeys) }
    }

    fn delete(&self) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Releases held connections. Later calls fail.
    fn close(&mut self) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Asset lists of `quadkeys` read from an in-memory document.
pub fn assets_from_document(doc: &MosaicDocument, quadkeys: &[String]) -> Vec<String> {
    quadkeys
        .iter()
        .filter_map(|qk| doc.assets_at(qk))
        .flatten()
        .cloned()
        .collect()
}

/// Every adapter a URI can resolve to.
pub enum Adapter {
    File(FileAdapter),
    Http(HttpAdapter<AsyncReqwestClient>),
    S3(S3Adapter),
    DynamoDb(DynamoDbAdapter),
    Sqlite(SqliteAdapter),
    Memory(MemoryAdapter),
    Stac(StacAdapter<AsyncReqwestClient>),
}

macro_rules! dispatch {
    ($adapter:expr, $inner:ident => $body:expr) => {
        match $adapter {
            Adapter::File($inner) => $body,
            Adapter::Http($inner) => $body,
            Adapter::S3($inner) => $body,
            Adapter::DynamoDb($inner) => $body,
            Adapter::Sqlite($inner) => $body,
            Adapter::Memory($inner) => $body,
            Adapter::Stac($inner) => $body,
        }
    };
}

impl StorageAdapter for Adapter {
    fn name(&self) -> &'static str {
        dispatch!(self, a => a.name())
    }

    fn uri(&self) -> &str {
        dispatch!(self, a => a.uri())
    }

    fn stores_rows(&self) -> bool {
        dispatch!(self, a => a.stores_rows())
    }

    fn read_only(&self) -> bool {
        dispatch!(self, a => a.read_only())
    }

    fn cacheable(&self) -> bool {
        dispatch!(self, a => a.cacheable())
    }

    fn cache_key(&self) -> CacheKey {
        dispatch!(self, a => a.cache_key())
    }

    async fn read(&self) -> Result<MosaicDocument, BackendError> {
        dispatch!(self, a => a.read().await)
    }

    async fn write(&self, doc: &MosaicDocument, overwrite: bool) -> Result<(), BackendError> {
        dispatch!(self, a => a.write(doc, overwrite).await)
    }

    async fn apply_update(
        &self,
        current: &MosaicDocument,
        delta: &MosaicDocument,
        order: MergeOrder,
    ) -> Result<(MosaicDocument, usize), BackendError> {
        dispatch!(self, a => a.apply_update(current, delta, order).await)
    }

    async fn get_assets(
        &self,
        doc: &MosaicDocument,
        quadkeys: &[String],
    ) -> Result<Vec<String>, BackendError> {
        dispatch!(self, a => a.get_assets(doc, quadkeys).await)
    }

    async fn list_quadkeys(&self, doc: &MosaicDocument) -> Result<Vec<String>, BackendError> {
        dispatch!(self, a => a.list_quadkeys(doc).await)
    }

    async fn delete(&self) -> Result<(), BackendError> {
        dispatch!(self, a => a.delete().await)
    }

    fn close(&mut self) -> Result<(), BackendError> {
        dispatch!(self, a => a.close())
    }
}

/// Summary returned by [`MosaicBackend::info`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MosaicInfo {
    pub backend: &'static str,
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub version: String,
    pub bounds: BBox,
    pub center: Center,
    pub minzoom: u8,
    pub maxzoom: u8,
    pub quadkey_zoom: u8,
    pub tilematrixset: TileMatrixSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quadkeys: Option<Vec<String>>,
}

/// An open mosaic: adapter, current document and shared cache.
pub struct MosaicBackend<A: StorageAdapter = Adapter> {
    adapter: A,
    doc: Arc<MosaicDocument>,
    cache: MosaicCache,
    build: BuildOptions,
}

impl<A: StorageAdapter> MosaicBackend<A> {
    /// Reads the document through the cache.
    pub async fn open_with(
        adapter: A,
        cache: MosaicCache,
        build: BuildOptions,
    ) -> Result<Self, BackendError> {
        let doc = if adapter.cacheable() {
            cache.document(adapter.cache_key(), adapter.read()).await?
        } else {
            Arc::new(adapter.read().await?)
        };
        debug!(uri = %adapter.uri(), backend = adapter.name(), "Mosaic opened");
        Ok(Self {
            adapter,
            doc,
            cache,
            build,
        })
    }

    /// Wraps a document that has not been stored yet.
    pub fn from_document(
        adapter: A,
        doc: MosaicDocument,
        cache: MosaicCache,
        build: BuildOptions,
    ) -> Self {
        Self {
            adapter,
            doc: Arc::new(doc),
            cache,
            build,
        }
    }

    /// Current document. For row-oriented backends opened from the store
    /// this carries metadata only; tiles are read per query.
    pub fn document(&self) -> &MosaicDocument {
        &self.doc
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn uri(&self) -> &str {
        self.adapter.uri()
    }

    pub fn backend_name(&self) -> &'static str {
        self.adapter.name()
    }

    /// Assets for tile `x/y/z` in the document's tile matrix set.
    pub async fn tile(&self, x: u32, y: u32, z: u8) -> Result<Vec<String>, BackendError> {
        self.assets_for_tile(x, y, z, self.doc.tile_matrix_set())
            .await
    }

    /// Assets for tile `x/y/z` of `tms`.
    ///
    /// A tile from another tile matrix set is resolved through its
    /// geographic bounds.
    pub async fn assets_for_tile(
        &self,
        x: u32,
        y: u32,
        z: u8,
        tms: TileMatrixSet,
    ) -> Result<Vec<String>, BackendError> {
        let tile = TileCoord::from_xyz(x, y, z);
        if u64::from(x) >= tms.matrix_width(z) || u64::from(y) >= tms.matrix_height(z) {
            return Err(BackendError::NoAssetsFound {
                query: format!("tile {}", tile),
            });
        }

        let assets = if tms == self.doc.tile_matrix_set() {
            self.get_assets(&tile).await?
        } else {
            self.assets_for_bbox(tms.bounds(&tile), Crs::WGS84).await?
        };
        non_empty(assets, || format!("tile {}", tile))
    }

    /// Assets covering a WGS84 point.
    pub async fn point(&self, lon: f64, lat: f64) -> Result<Vec<String>, BackendError> {
        self.assets_for_point(lon, lat, Crs::WGS84).await
    }

    /// Assets covering a point given in `crs`.
    pub async fn assets_for_point(
        &self,
        x: f64,
        y: f64,
        crs: Crs,
    ) -> Result<Vec<String>, BackendError> {
        let (lon, lat) = CoordTransformer::new(crs, Crs::WGS84)?.transform(x, y)?;
        let tms = self.doc.tile_matrix_set();
        let tile = tms.tile_for(lon, lat, self.doc.quadkey_zoom());
        let assets = self.get_assets(&tile).await?;
        non_empty(assets, || format!("point ({}, {})", lon, lat))
    }

    /// Assets intersecting a WGS84 box. An empty result is not an error.
    pub async fn bbox(
        &self,
        xmin: f64,
        ymin: f64,
        xmax: f64,
        ymax: f64,
    ) -> Result<Vec<String>, BackendError> {
        self.assets_for_bbox(BBox::new(xmin, ymin, xmax, ymax), Crs::WGS84)
            .await
    }

    /// Assets intersecting a box given in `crs`, deduplicated in first-seen
    /// order across the tiles it covers.
    pub async fn assets_for_bbox(&self, bbox: BBox, crs: Crs) -> Result<Vec<String>, BackendError> {
        let bbox = CoordTransformer::new(crs, Crs::WGS84)?.transform_bbox(&bbox)?;

        let tms = self.doc.tile_matrix_set();
        let tiles = tiles_in_bbox(&bbox, self.doc.quadkey_zoom(), tms);
        debug!(uri = %self.uri(), tiles = tiles.len(), "Resolving bbox");

        let mut assets = Vec::new();
        for tile in &tiles {
            assets.extend(self.get_assets(tile).await?);
        }
        Ok(dedup_preserving_order(assets))
    }

    /// Resolves any tile to the index quadkeys and returns their assets,
    /// deduplicated and with the asset prefix applied.
    pub async fn get_assets(&self, tile: &TileCoord) -> Result<Vec<String>, BackendError> {
        let quadkeys = find_quadkeys(tile, self.doc.quadkey_zoom(), self.doc.tile_matrix_set());
        if quadkeys.is_empty() {
            return Ok(Vec::new());
        }

        let assets = if self.adapter.stores_rows() {
            let key = CacheKey::assets(self.adapter.uri(), &quadkeys);
            let cached = self
                .cache
                .assets(key, self.adapter.get_assets(&self.doc, &quadkeys))
                .await?;
            cached.as_ref().clone()
        } else {
            self.adapter.get_assets(&self.doc, &quadkeys).await?
        };

        let assets = dedup_preserving_order(assets);
        Ok(match self.doc.asset_prefix() {
            Some(prefix) => assets
                .into_iter()
                .map(|asset| format!("{}{}", prefix, asset))
                .collect(),
            None => assets,
        })
    }

    /// Document summary, optionally with the full quadkey list.
    pub async fn info(&self, include_quadkeys: bool) -> Result<MosaicInfo, BackendError> {
        let quadkeys = if include_quadkeys {
            Some(self.adapter.list_quadkeys(&self.doc).await?)
        } else {
            None
        };
        let doc = &self.doc;
        Ok(MosaicInfo {
            backend: self.adapter.name(),
            uri: self.adapter.uri().to_string(),
            name: doc.name().map(str::to_string),
            version: doc.version().to_string(),
            bounds: doc.bounds(),
            center: doc.center(),
            minzoom: doc.minzoom(),
            maxzoom: doc.maxzoom(),
            quadkey_zoom: doc.quadkey_zoom(),
            tilematrixset: doc.tile_matrix_set(),
            asset_prefix: doc.asset_prefix().map(str::to_string),
            quadkeys,
        })
    }

    /// Persists the held document.
    ///
    /// Meant for handles built with [`from_document`](Self::from_document);
    /// row-oriented handles opened from the store hold no tiles.
    pub async fn write(&self, overwrite: bool) -> Result<(), BackendError> {
        if self.adapter.read_only() {
            return Err(BackendError::unsupported(self.adapter.name(), "write"));
        }
        self.adapter.write(&self.doc, overwrite).await?;
        self.cache.invalidate_uri(self.adapter.uri());
        Ok(())
    }

    /// Indexes `footprints` at the document's zoom levels and merges them in.
    ///
    /// Quadkeys the new footprints do not touch keep their lists unchanged.
    pub async fn update(
        &mut self,
        footprints: &[Footprint],
        order: MergeOrder,
    ) -> Result<(), BackendError> {
        if self.adapter.read_only() {
            return Err(BackendError::unsupported(self.adapter.name(), "update"));
        }

        let options = BuildOptions {
            minzoom: Some(self.doc.minzoom()),
            maxzoom: Some(self.doc.maxzoom()),
            quadkey_zoom: Some(self.doc.quadkey_zoom()),
            tile_matrix_set: self.doc.tile_matrix_set(),
            ..self.build.clone()
        };
        let delta = build_from_footprints(footprints, &options)?;

        let (merged, changed) = self.adapter.apply_update(&self.doc, &delta, order).await?;
        self.cache.invalidate_uri(self.adapter.uri());

        info!(
            uri = %self.adapter.uri(),
            quadkeys = changed,
            version = %merged.version(),
            "Mosaic updated"
        );
        self.doc = if self.adapter.stores_rows() {
            Arc::new(MosaicDocument::try_from(merged.metadata())?)
        } else {
            Arc::new(merged)
        };
        Ok(())
    }

    /// Removes the stored document.
    pub async fn delete(self) -> Result<(), BackendError> {
        self.adapter.delete().await?;
        self.cache.invalidate_uri(self.adapter.uri());
        Ok(())
    }

    /// Releases held connections.
    pub fn close(mut self) -> Result<(), BackendError> {
        self.adapter.close()
    }
}

fn non_empty(assets: Vec<String>, query: impl FnOnce() -> String) -> Result<Vec<String>, BackendError> {
    if assets.is_empty() {
        return Err(BackendError::NoAssetsFound { query: query() });
    }
    Ok(assets)
}
