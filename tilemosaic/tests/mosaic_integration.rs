//! End-to-end tests: build a mosaic, store it, reopen it and query it.
//!
//! These cover the File and SQLite backends on a temporary directory and the
//! STAC search backend against a scripted HTTP client.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{json, Map, Value};
use tempfile::TempDir;
use tilemosaic::backend::{
    create, open, BackendConfig, BackendError, MosaicBackend, StacAdapter,
};
use tilemosaic::builder::{build_from_footprints, BuildOptions, FilterOptions, Footprint};
use tilemosaic::cache::MosaicCache;
use tilemosaic::coord::{quadkey_of, BBox, TileCoord, TileMatrixSet};
use tilemosaic::http::{AsyncHttpClient, HttpError};
use tilemosaic::mosaic::{decode_document, encode_document, MergeOrder, MosaicDocument};
use tilemosaic::search::SearchOptions;

// =============================================================================
// Test Helpers
// =============================================================================

const TMS: TileMatrixSet = TileMatrixSet::WebMercatorQuad;

/// Two footprints overlapping on lon 0.6..1.1, away from any z9 tile edge.
fn overlapping_footprints() -> Vec<Footprint> {
    vec![
        Footprint::from_bbox("a.tif", BBox::new(0.1, 0.1, 1.1, 1.1)),
        Footprint::from_bbox("b.tif", BBox::new(0.6, 0.1, 1.6, 1.1)),
    ]
}

fn z9_document() -> MosaicDocument {
    build_from_footprints(&overlapping_footprints(), &BuildOptions::new(9, 12)).unwrap()
}

fn quadkey(col: u32, row: u32) -> String {
    quadkey_of(&TileCoord { row, col, zoom: 9 }, TMS)
}

fn path_uri(dir: &TempDir, name: &str) -> String {
    dir.path().join(name).display().to_string()
}

/// Serves scripted STAC pages and counts requests.
struct ScriptedSearch {
    pages: Vec<Value>,
    calls: AtomicUsize,
}

impl ScriptedSearch {
    fn new(pages: Vec<Value>) -> Self {
        Self {
            pages,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.pages
            .get(n)
            .map(|page| page.to_string().into_bytes())
            .ok_or_else(|| HttpError::Status {
                status: 500,
                url: url.to_string(),
            })
    }
}

impl AsyncHttpClient for &ScriptedSearch {
    async fn get(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        self.next(url)
    }

    async fn post_json(&self, url: &str, _json_body: &str) -> Result<Vec<u8>, HttpError> {
        self.next(url)
    }
}

fn stac_item(id: &str, west: f64) -> Value {
    json!({
        "type": "Feature",
        "id": id,
        "geometry": {
            "type": "Polygon",
            "coordinates": [[
                [west, 0.1], [west + 1.0, 0.1], [west + 1.0, 1.1], [west, 1.1], [west, 0.1]
            ]]
        },
        "properties": { "datetime": "2024-06-01T00:00:00Z" }
    })
}

// =============================================================================
// Building
// =============================================================================

#[tokio::test]
async fn test_overlap_tiles_hold_both_assets_in_input_order() {
    let doc = z9_document();
    let dir = TempDir::new().unwrap();
    let mosaic = create(&path_uri(&dir, "m.json"), doc, false, &BackendConfig::default())
        .await
        .unwrap();

    // a covers columns 256-257, b covers 256-258; both cover rows 254-255
    let mut both: Vec<String> = mosaic
        .document()
        .tiles()
        .iter()
        .filter(|(_, assets)| assets.len() == 2)
        .map(|(key, _)| key.clone())
        .collect();
    both.sort();
    let mut expected = vec![
        quadkey(256, 254),
        quadkey(256, 255),
        quadkey(257, 254),
        quadkey(257, 255),
    ];
    expected.sort();
    assert_eq!(both, expected);
    assert_eq!(mosaic.document().tiles().len(), 6);

    assert_eq!(mosaic.tile(257, 255, 9).await.unwrap(), vec!["a.tif", "b.tif"]);
    assert_eq!(mosaic.tile(258, 255, 9).await.unwrap(), vec!["b.tif"]);
    assert!(matches!(
        mosaic.tile(300, 255, 9).await,
        Err(BackendError::NoAssetsFound { .. })
    ));
}

#[test]
fn test_minimum_tile_cover_drops_sliver() {
    let tile = TileCoord {
        row: 255,
        col: 256,
        zoom: 9,
    };
    let bounds = TMS.bounds(&tile);
    let sliver_east = bounds.west + (bounds.east - bounds.west) * 0.1;
    let footprints = vec![
        Footprint::from_bbox("full.tif", bounds),
        Footprint::from_bbox(
            "sliver.tif",
            BBox::new(bounds.west, bounds.south, sliver_east, bounds.north),
        ),
    ];

    let options = BuildOptions::new(9, 9)
        .with_filter(FilterOptions::default().with_minimum_tile_cover(0.5));
    let doc = build_from_footprints(&footprints, &options).unwrap();

    assert_eq!(
        doc.assets_at(&quadkey(256, 255)),
        Some(&["full.tif".to_string()][..])
    );
}

#[test]
fn test_serialization_roundtrip() {
    let doc = z9_document();
    for gzip in [false, true] {
        let bytes = encode_document(&doc, gzip).unwrap();
        let parsed = decode_document(&bytes, gzip).unwrap();
        assert_eq!(parsed.tiles(), doc.tiles());
        let (a, b) = (parsed.bounds(), doc.bounds());
        assert!((a.west - b.west).abs() < 1e-9);
        assert!((a.south - b.south).abs() < 1e-9);
        assert!((a.east - b.east).abs() < 1e-9);
        assert!((a.north - b.north).abs() < 1e-9);
    }
}

#[test]
fn test_bump_version_twice() {
    let mut doc = z9_document();
    assert_eq!(doc.version(), "1.0.0");
    doc.bump_version().unwrap();
    doc.bump_version().unwrap();
    assert_eq!(doc.version(), "1.0.2");
}

// =============================================================================
// File backend
// =============================================================================

#[tokio::test]
async fn test_gzip_and_plain_files_open_identically() {
    let dir = TempDir::new().unwrap();
    let config = BackendConfig::default();
    let plain = path_uri(&dir, "m.json");
    let gzipped = path_uri(&dir, "m.json.gz");

    create(&plain, z9_document(), false, &config).await.unwrap();
    create(&gzipped, z9_document(), false, &config).await.unwrap();
    assert_ne!(
        std::fs::read(&plain).unwrap(),
        std::fs::read(&gzipped).unwrap()
    );

    let a = open(&plain, &config).await.unwrap();
    let b = open(&gzipped, &config).await.unwrap();
    assert_eq!(a.document(), b.document());
}

#[tokio::test]
async fn test_write_without_overwrite_keeps_existing_file() {
    let dir = TempDir::new().unwrap();
    let uri = path_uri(&dir, "m.json");
    let config = BackendConfig::default();
    create(&uri, z9_document(), false, &config).await.unwrap();
    let before = std::fs::read(&uri).unwrap();

    let other = build_from_footprints(
        &[Footprint::from_bbox("c.tif", BBox::new(10.1, 10.1, 11.0, 11.0))],
        &BuildOptions::new(9, 12),
    )
    .unwrap();
    let result = create(&uri, other.clone(), false, &config).await;

    assert!(matches!(result, Err(BackendError::AlreadyExists { .. })));
    assert_eq!(std::fs::read(&uri).unwrap(), before);

    create(&uri, other, true, &config).await.unwrap();
    assert_ne!(std::fs::read(&uri).unwrap(), before);
}

#[tokio::test]
async fn test_update_is_not_destructive() {
    let dir = TempDir::new().unwrap();
    let uri = path_uri(&dir, "m.json");
    let config = BackendConfig::default();
    let original = z9_document();
    create(&uri, original.clone(), false, &config).await.unwrap();

    let mut mosaic = open(&uri, &config).await.unwrap();
    let far = Footprint::from_bbox("far.tif", BBox::new(20.1, 20.1, 20.5, 20.5));
    let near = Footprint::from_bbox("near.tif", BBox::new(1.2, 0.1, 1.6, 1.1));
    mosaic
        .update(&[far, near], MergeOrder::Append)
        .await
        .unwrap();

    let reopened = open(&uri, &config).await.unwrap();
    let doc = reopened.document();
    assert_eq!(doc.version(), "1.0.1");
    assert!(doc.bounds().east >= 20.5);

    for (key, assets) in original.tiles() {
        let now = doc.assets_at(key).unwrap();
        assert_eq!(&now[..assets.len()], &assets[..], "quadkey {}", key);
    }
    // column 258 held only b; the appended asset goes after it
    assert_eq!(
        reopened.tile(258, 255, 9).await.unwrap(),
        vec!["b.tif", "near.tif"]
    );
}

// =============================================================================
// SQLite backend
// =============================================================================

#[tokio::test]
async fn test_sqlite_create_query_and_reject_duplicate() {
    let dir = TempDir::new().unwrap();
    let uri = format!("sqlite:///{}:landsat", dir.path().join("mosaics.db").display());
    let config = BackendConfig::default();

    create(&uri, z9_document(), false, &config).await.unwrap();
    let result = create(&uri, z9_document(), false, &config).await;
    assert!(matches!(result, Err(BackendError::AlreadyExists { .. })));

    let mosaic = open(&uri, &config).await.unwrap();
    assert_eq!(mosaic.backend_name(), "sqlite");
    assert_eq!(mosaic.tile(257, 255, 9).await.unwrap(), vec!["a.tif", "b.tif"]);

    let info = mosaic.info(true).await.unwrap();
    assert_eq!(info.quadkeys.map(|q| q.len()), Some(6));
    mosaic.close().unwrap();
}

// =============================================================================
// STAC backend
// =============================================================================

#[tokio::test]
async fn test_search_stops_after_second_page() {
    let search = ScriptedSearch::new(vec![
        json!({
            "type": "FeatureCollection",
            "features": [stac_item("S2A_1", 0.1)],
            "context": { "page": 1, "limit": 1, "matched": 2, "returned": 1 }
        }),
        json!({
            "type": "FeatureCollection",
            "features": [stac_item("S2A_2", 0.6)],
            "context": { "page": 2, "limit": 1, "matched": 2, "returned": 1 }
        }),
    ]);

    let mut query = Map::new();
    query.insert("collections".to_string(), json!(["sentinel-2-l2a"]));
    let adapter = StacAdapter::new(
        &search,
        "https://stac.example.com/search",
        query,
        SearchOptions::default().with_limit(1),
        BuildOptions::new(9, 12),
    );
    let mosaic = MosaicBackend::open_with(adapter, MosaicCache::disabled(), BuildOptions::default())
        .await
        .unwrap();

    assert_eq!(search.calls(), 2);
    assert_eq!(mosaic.tile(257, 255, 9).await.unwrap(), vec!["S2A_1", "S2A_2"]);
    assert!(matches!(
        mosaic.write(true).await,
        Err(BackendError::Unsupported { .. })
    ));
}
