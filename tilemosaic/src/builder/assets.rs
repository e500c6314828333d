//! Asset metadata collection.
//!
//! Before an index can be built from bare asset identifiers, each asset's
//! bounds and zoom hints must be read. That is the one parallel step in the
//! pipeline: a bounded pool of in-flight requests, where a failed asset is
//! logged and left out rather than failing the whole batch.

use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::future::Future;
use tracing::{debug, info, warn};

use super::zoom::{DATATYPE_PROPERTY, MAXZOOM_PROPERTY, MINZOOM_PROPERTY};
use super::{BuildError, Footprint};
use crate::coord::BBox;
use crate::http::AsyncHttpClient;

/// Default number of concurrent metadata requests.
pub const DEFAULT_MAX_THREADS: usize = 20;

/// Spatial metadata of one asset.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssetInfo {
    pub bounds: BBox,
    #[serde(default)]
    pub minzoom: Option<u8>,
    #[serde(default)]
    pub maxzoom: Option<u8>,
    #[serde(default, alias = "dtype")]
    pub datatype: Option<String>,
}

impl AssetInfo {
    /// Footprint covering the asset bounds, carrying the asset path and
    /// metadata as properties.
    pub fn into_footprint(self, asset: &str) -> Footprint {
        let mut fp = Footprint::from_bbox(asset, self.bounds);
        if let Some(z) = self.minzoom {
            fp = fp.with_property(MINZOOM_PROPERTY, z);
        }
        if let Some(z) = self.maxzoom {
            fp = fp.with_property(MAXZOOM_PROPERTY, z);
        }
        if let Some(dt) = self.datatype {
            fp = fp.with_property(DATATYPE_PROPERTY, dt);
        }
        fp
    }
}

/// Reads spatial metadata for an asset identifier.
pub trait AssetInfoReader: Send + Sync {
    fn info(&self, asset: &str) -> impl Future<Output = Result<AssetInfo, BuildError>> + Send;
}

/// Reads metadata from a tile server's `/info?url=<asset>` endpoint.
pub struct TilerInfoReader<C: AsyncHttpClient> {
    client: C,
    endpoint: String,
}

impl<C: AsyncHttpClient> TilerInfoReader<C> {
    /// `endpoint` is the full info URL, e.g. `http://localhost:8000/cog/info`.
    pub fn new(client: C, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

impl<C: AsyncHttpClient> AssetInfoReader for TilerInfoReader<C> {
    async fn info(&self, asset: &str) -> Result<AssetInfo, BuildError> {
        let failed = |reason: String| BuildError::AssetInfo {
            asset: asset.to_string(),
            reason,
        };

        let url = reqwest::Url::parse_with_params(&self.endpoint, &[("url", asset)])
            .map_err(|e| failed(e.to_string()))?;
        let body = self
            .client
            .get(url.as_str())
            .await
            .map_err(|e| failed(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| failed(e.to_string()))
    }
}

/// Fetches metadata for every asset with at most `max_threads` requests in
/// flight, preserving input order.
///
/// Assets whose metadata cannot be read are skipped with a warning.
pub async fn footprints_from_assets<R: AssetInfoReader>(
    reader: &R,
    assets: &[String],
    max_threads: usize,
) -> Vec<Footprint> {
    let width = max_threads.max(1);
    debug!(assets = assets.len(), width, "Collecting asset metadata");

    let results: Vec<Option<Footprint>> = stream::iter(assets)
        .map(|asset| async move {
            match reader.info(asset).await {
                Ok(info) => Some(info.into_footprint(asset)),
                Err(e) => {
                    warn!(asset = %asset, error = %e, "Skipping asset: metadata unavailable");
                    None
                }
            }
        })
        .buffered(width)
        .collect()
        .await;

    let footprints: Vec<Footprint> = results.into_iter().flatten().collect();
    info!(
        requested = assets.len(),
        collected = footprints.len(),
        "Asset metadata collected"
    );
    footprints
}
