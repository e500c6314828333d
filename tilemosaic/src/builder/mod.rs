//! Spatial index builder
//!
//! Turns a set of asset footprints into a [`MosaicDocument`]:
//!
//! 1. union the footprint bounds
//! 2. burn footprints onto the tile grid at the index zoom
//! 3. for each burned tile, find intersecting footprints through an R-tree
//! 4. filter/sort/cap them and store the identifiers under the tile quadkey
//!
//! # Example
//!
//! ```
//! use tilemosaic::builder::{build_from_footprints, BuildOptions, Footprint};
//! use tilemosaic::coord::BBox;
//!
//! let footprints = vec![Footprint::from_bbox("a.tif", BBox::new(0.0, 0.0, 1.0, 1.0))];
//! let doc = build_from_footprints(&footprints, &BuildOptions::new(7, 12)).unwrap();
//! assert_eq!(doc.quadkey_zoom(), 7);
//! ```

mod assets;
mod burn;
mod filter;
mod footprint;
mod index;
mod zoom;

pub use assets::{
    footprints_from_assets, AssetInfo, AssetInfoReader, TilerInfoReader, DEFAULT_MAX_THREADS,
};
pub use burn::burn_tiles;
pub use filter::{
    coverage_fraction, AssetFilter, Candidate, CoverageFilter, FilterOptions,
    DEFAULT_MAX_ITEMS_PER_TILE,
};
pub use footprint::{
    bbox_polygon, footprints_from_values, parse_footprints, to_feature_collection, Accessor,
    Footprint,
};
pub use index::FootprintIndex;
pub use zoom::{
    check_data_types, resolve_zoom_range, DATATYPE_PROPERTY, MAXZOOM_PROPERTY, MINZOOM_PROPERTY,
};

use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::coord::{BBox, TileMatrixSet};
use crate::mosaic::{dedup_preserving_order, DocumentError, MosaicDocument, MosaicDraft};

/// Errors raised while building an index.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    /// Nothing to index
    #[error("No footprints to index")]
    NoFootprints,

    /// The accessor found no identifier on a footprint
    #[error("Footprint {index} has no asset identifier")]
    MissingIdentifier { index: usize },

    /// Footprints declare different pixel data types
    #[error("Assets have multiple data types: {}", .0.join(", "))]
    MultipleDataType(Vec<String>),

    /// No explicit zoom and no footprint declares one
    #[error("Cannot determine {0}: not given and no footprint declares it")]
    MissingZoom(&'static str),

    /// Geometry could not be parsed or is unusable
    #[error("Invalid footprint geometry: {0}")]
    InvalidGeometry(String),

    /// Filter options out of range
    #[error("Invalid filter options: {0}")]
    InvalidFilter(String),

    /// Metadata for one asset could not be read
    #[error("Failed to read metadata for {asset}: {reason}")]
    AssetInfo { asset: String, reason: String },

    /// Built document failed validation
    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Builder configuration.
#[derive(Clone)]
pub struct BuildOptions {
    /// Minimum zoom; inferred from footprint hints when `None`
    pub minzoom: Option<u8>,
    /// Maximum zoom; inferred from footprint hints when `None`
    pub maxzoom: Option<u8>,
    /// Index zoom; defaults to `minzoom`
    pub quadkey_zoom: Option<u8>,
    pub tile_matrix_set: TileMatrixSet,
    pub accessor: Accessor,
    pub filter: FilterOptions,
    pub asset_filter: Arc<dyn AssetFilter>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            minzoom: None,
            maxzoom: None,
            quadkey_zoom: None,
            tile_matrix_set: TileMatrixSet::default(),
            accessor: Accessor::default(),
            filter: FilterOptions::default(),
            asset_filter: Arc::new(CoverageFilter),
        }
    }
}

impl std::fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildOptions")
            .field("minzoom", &self.minzoom)
            .field("maxzoom", &self.maxzoom)
            .field("quadkey_zoom", &self.quadkey_zoom)
            .field("tile_matrix_set", &self.tile_matrix_set)
            .field("accessor", &self.accessor)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

impl BuildOptions {
    /// Options with an explicit zoom range.
    pub fn new(minzoom: u8, maxzoom: u8) -> Self {
        Self {
            minzoom: Some(minzoom),
            maxzoom: Some(maxzoom),
            ..Self::default()
        }
    }

    /// Options that infer the zoom range from footprint hints.
    pub fn inferred() -> Self {
        Self::default()
    }

    pub fn with_quadkey_zoom(mut self, zoom: u8) -> Self {
        self.quadkey_zoom = Some(zoom);
        self
    }

    pub fn with_tile_matrix_set(mut self, tms: TileMatrixSet) -> Self {
        self.tile_matrix_set = tms;
        self
    }

    pub fn with_accessor(mut self, accessor: Accessor) -> Self {
        self.accessor = accessor;
        self
    }

    pub fn with_filter(mut self, filter: FilterOptions) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_asset_filter(mut self, asset_filter: Arc<dyn AssetFilter>) -> Self {
        self.asset_filter = asset_filter;
        self
    }
}

/// Builds a mosaic document from footprints.
pub fn build_from_footprints(
    footprints: &[Footprint],
    options: &BuildOptions,
) -> Result<MosaicDocument, BuildError> {
    if footprints.is_empty() {
        return Err(BuildError::NoFootprints);
    }
    options.filter.validate()?;

    let (minzoom, maxzoom) = resolve_zoom_range(footprints, options.minzoom, options.maxzoom)?;
    let quadkey_zoom = options.quadkey_zoom.unwrap_or(minzoom);
    let tms = options.tile_matrix_set;

    // Footprints are clamped to the matrix extent one by one so the bounds
    // contain every indexed footprint; those left empty are not indexed.
    let extent = tms.extent();
    let mut kept = Vec::with_capacity(footprints.len());
    let mut ids = Vec::with_capacity(footprints.len());
    let mut bounds: Option<BBox> = None;
    for (index, fp) in footprints.iter().enumerate() {
        let id = options
            .accessor
            .extract(fp)
            .ok_or(BuildError::MissingIdentifier { index })?;
        if let Some(fp_bounds) = fp.bounds() {
            let Some(clamped) = clamp_to_extent(fp_bounds, &extent) else {
                warn!(index, id = %id, tms = %tms, "Footprint outside the tile matrix extent, skipping");
                continue;
            };
            bounds = Some(bounds.map_or(clamped, |b| b.union(&clamped)));
        }
        kept.push(fp.clone());
        ids.push(id);
    }
    let footprints = kept.as_slice();
    let bounds = bounds.ok_or_else(|| {
        BuildError::InvalidGeometry("no footprint lies inside the tile matrix extent".to_string())
    })?;

    let burned = burn_tiles(footprints, quadkey_zoom, tms);
    let index = FootprintIndex::new(footprints);
    debug!(
        footprints = footprints.len(),
        candidate_tiles = burned.len(),
        quadkey_zoom,
        "Burned footprints"
    );

    let mut tiles = BTreeMap::new();
    for (quadkey, tile) in burned {
        let tile_bounds = tms.bounds(&tile);
        let hits = index.intersecting(&tile_bounds, &bbox_polygon(&tile_bounds));
        if hits.is_empty() {
            continue;
        }

        let candidates = hits
            .into_iter()
            .map(|index| Candidate {
                index,
                footprint: &footprints[index],
            })
            .collect();
        let selected = options
            .asset_filter
            .filter(&tile, tms, candidates, &options.filter);
        let assets = dedup_preserving_order(selected.iter().map(|c| ids[c.index].clone()));
        if !assets.is_empty() {
            tiles.insert(quadkey, assets);
        }
    }

    info!(
        footprints = footprints.len(),
        quadkeys = tiles.len(),
        minzoom,
        maxzoom,
        quadkey_zoom,
        "Built mosaic index"
    );

    let draft = MosaicDraft {
        minzoom,
        maxzoom,
        quadkey_zoom: Some(quadkey_zoom),
        bounds,
        tiles,
        tilematrixset: (tms != TileMatrixSet::default()).then_some(tms),
        ..MosaicDraft::default()
    };
    Ok(MosaicDocument::try_from(draft)?)
}

/// Reads metadata for bare asset identifiers and builds from the result.
pub async fn build_from_assets<R: AssetInfoReader>(
    reader: &R,
    assets: &[String],
    max_threads: usize,
    options: &BuildOptions,
) -> Result<MosaicDocument, BuildError> {
    let footprints = footprints_from_assets(reader, assets, max_threads).await;
    build_from_footprints(&footprints, options)
}

/// Intersection of `bounds` with `extent`, or `None` when they are disjoint.
fn clamp_to_extent(bounds: BBox, extent: &BBox) -> Option<BBox> {
    let clamped = BBox::new(
        bounds.west.max(extent.west),
        bounds.south.max(extent.south),
        bounds.east.min(extent.east),
        bounds.north.min(extent.north),
    );
    (clamped.west <= clamped.east && clamped.south <= clamped.north).then_some(clamped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::{find_quadkeys, tile_to_quadkey, TileCoord};

    #[test]
    fn test_empty_input() {
        assert_eq!(
            build_from_footprints(&[], &BuildOptions::new(5, 8)).unwrap_err(),
            BuildError::NoFootprints
        );
    }

    #[test]
    fn test_missing_identifier() {
        let fp = Footprint::from_bbox("a", BBox::new(0.0, 0.0, 1.0, 1.0));
        let options = BuildOptions::new(5, 8).with_accessor(Accessor::Id);
        assert_eq!(
            build_from_footprints(&[fp], &options).unwrap_err(),
            BuildError::MissingIdentifier { index: 0 }
        );
    }

    #[test]
    fn test_bounds_and_quadkey_zoom() {
        let fps = vec![
            Footprint::from_bbox("a", BBox::new(0.0, 0.0, 1.0, 1.0)),
            Footprint::from_bbox("b", BBox::new(2.0, -1.0, 3.0, 0.5)),
        ];
        let doc = build_from_footprints(&fps, &BuildOptions::new(5, 10).with_quadkey_zoom(7))
            .unwrap();
        assert_eq!(doc.bounds().to_array(), [0.0, -1.0, 3.0, 1.0]);
        assert_eq!(doc.quadkey_zoom(), 7);
        assert!(doc.quadkeys().all(|k| k.len() == 7));
    }

    #[test]
    fn test_polar_footprint_is_skipped() {
        let fps = vec![
            Footprint::from_bbox("arctic", BBox::new(10.0, 86.0, 20.0, 89.0)),
            Footprint::from_bbox("a", BBox::new(0.0, 0.0, 1.0, 1.0)),
        ];
        let doc = build_from_footprints(&fps, &BuildOptions::new(5, 8)).unwrap();
        assert_eq!(doc.bounds().to_array(), [0.0, 0.0, 1.0, 1.0]);
        assert!(doc.tiles().values().flatten().all(|id| id == "a"));

        let only_polar = &fps[..1];
        assert!(matches!(
            build_from_footprints(only_polar, &BuildOptions::new(5, 8)),
            Err(BuildError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_bounds_contain_clamped_footprints() {
        let fps = vec![
            Footprint::from_bbox("north", BBox::new(10.0, 80.0, 20.0, 89.0)),
            Footprint::from_bbox("south", BBox::new(10.0, -10.0, 20.0, -5.0)),
        ];
        let doc = build_from_footprints(&fps, &BuildOptions::new(3, 6)).unwrap();
        let bounds = doc.bounds();
        assert_eq!(bounds.south, -10.0);
        assert!(bounds.north <= 85.06 && bounds.north > 85.0);
        assert!(bounds.south < bounds.north);
    }

    #[test]
    fn test_every_quadkey_resolves_to_its_footprint() {
        let fps = vec![Footprint::from_bbox("a", BBox::new(10.0, 10.0, 12.0, 11.0))];
        let doc = build_from_footprints(&fps, &BuildOptions::new(6, 10)).unwrap();

        let tile = TileMatrixSet::WebMercatorQuad.tile_for(11.0, 10.5, 12);
        let keys = find_quadkeys(&tile, 6, TileMatrixSet::WebMercatorQuad);
        assert_eq!(doc.assets_at(&keys[0]).unwrap(), ["a"]);
    }

    #[test]
    fn test_crs84_index() {
        let fps = vec![Footprint::from_bbox("a", BBox::new(100.0, 10.0, 101.0, 11.0))];
        let options = BuildOptions::new(3, 6).with_tile_matrix_set(TileMatrixSet::WorldCrs84Quad);
        let doc = build_from_footprints(&fps, &options).unwrap();
        assert_eq!(doc.tile_matrix_set(), TileMatrixSet::WorldCrs84Quad);
        assert!(doc.quadkeys().all(|k| k.len() == 4 && k.starts_with('1')));
    }

    #[test]
    fn test_inferred_zoom_from_hints() {
        let fps = vec![Footprint::from_bbox("a", BBox::new(0.0, 0.0, 1.0, 1.0))
            .with_property(MINZOOM_PROPERTY, 7)
            .with_property(MAXZOOM_PROPERTY, 13)];
        let doc = build_from_footprints(&fps, &BuildOptions::inferred()).unwrap();
        assert_eq!((doc.minzoom(), doc.maxzoom()), (7, 13));
        assert_eq!(
            doc.quadkeys().next().map(str::len),
            Some(tile_to_quadkey(&TileCoord::from_xyz(0, 0, 7)).len())
        );
    }
}
