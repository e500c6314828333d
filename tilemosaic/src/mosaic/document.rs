//! The mosaic document: a validated quadkey -> asset list index.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

use super::error::DocumentError;
use super::MergeOrder;
use crate::coord::{is_valid_quadkey, BBox, TileMatrixSet, MAX_ZOOM};

/// Schema generation written into new documents.
pub const MOSAICJSON_VERSION: &str = "0.0.3";

/// Version assigned to freshly built documents.
pub const INITIAL_DOCUMENT_VERSION: &str = "1.0.0";

/// Map center as `[lon, lat, zoom]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Center {
    pub lon: f64,
    pub lat: f64,
    pub zoom: u8,
}

impl Serialize for Center {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.lon, self.lat, self.zoom).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Center {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (lon, lat, zoom) = <(f64, f64, f64)>::deserialize(deserializer)?;
        Ok(Center {
            lon,
            lat,
            zoom: zoom.round().clamp(0.0, MAX_ZOOM as f64) as u8,
        })
    }
}

/// Unvalidated document fields.
///
/// This is the wire shape of a document and the input to
/// [`MosaicDocument::try_from`], which performs every invariant check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MosaicDraft {
    #[serde(default = "default_spec_version")]
    pub mosaicjson: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_document_version")]
    pub version: String,
    #[serde(default)]
    pub attribution: Option<String>,
    #[serde(default)]
    pub minzoom: u8,
    #[serde(default = "default_maxzoom")]
    pub maxzoom: u8,
    #[serde(default)]
    pub quadkey_zoom: Option<u8>,
    #[serde(default = "default_bounds")]
    pub bounds: BBox,
    #[serde(default)]
    pub center: Option<Center>,
    #[serde(default)]
    pub tiles: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub tilematrixset: Option<TileMatrixSet>,
    #[serde(default)]
    pub asset_prefix: Option<String>,
}

fn default_spec_version() -> String {
    MOSAICJSON_VERSION.to_string()
}

fn default_document_version() -> String {
    INITIAL_DOCUMENT_VERSION.to_string()
}

fn default_maxzoom() -> u8 {
    MAX_ZOOM
}

fn default_bounds() -> BBox {
    BBox::new(-180.0, -90.0, 180.0, 90.0)
}

impl Default for MosaicDraft {
    fn default() -> Self {
        Self {
            mosaicjson: default_spec_version(),
            name: None,
            description: None,
            version: default_document_version(),
            attribution: None,
            minzoom: 0,
            maxzoom: default_maxzoom(),
            quadkey_zoom: None,
            bounds: default_bounds(),
            center: None,
            tiles: BTreeMap::new(),
            tilematrixset: None,
            asset_prefix: None,
        }
    }
}

/// A validated mosaic document.
///
/// `tiles` is only reachable read-only; the single mutation path is
/// [`MosaicDocument::merge`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MosaicDraft")]
pub struct MosaicDocument {
    mosaicjson: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    attribution: Option<String>,
    minzoom: u8,
    maxzoom: u8,
    quadkey_zoom: u8,
    bounds: BBox,
    center: Center,
    tiles: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tilematrixset: Option<TileMatrixSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    asset_prefix: Option<String>,
}

impl TryFrom<MosaicDraft> for MosaicDocument {
    type Error = DocumentError;

    fn try_from(draft: MosaicDraft) -> Result<Self, Self::Error> {
        for (field, value) in [("minzoom", draft.minzoom), ("maxzoom", draft.maxzoom)] {
            if value > MAX_ZOOM {
                return Err(DocumentError::InvalidZoom { field, value });
            }
        }
        if draft.minzoom > draft.maxzoom {
            return Err(DocumentError::ZoomOrder {
                minzoom: draft.minzoom,
                maxzoom: draft.maxzoom,
            });
        }

        let quadkey_zoom = draft.quadkey_zoom.unwrap_or(draft.minzoom);
        if quadkey_zoom > MAX_ZOOM {
            return Err(DocumentError::InvalidZoom {
                field: "quadkey_zoom",
                value: quadkey_zoom,
            });
        }

        let b = draft.bounds;
        if !b.is_ordered() {
            return Err(DocumentError::InvalidBounds {
                west: b.west,
                south: b.south,
                east: b.east,
                north: b.north,
            });
        }

        parse_version(&draft.version)?;

        let tms = draft.tilematrixset.unwrap_or_default();
        if let Some(key) = draft
            .tiles
            .keys()
            .find(|k| !is_valid_quadkey(k, quadkey_zoom, tms))
        {
            return Err(DocumentError::InvalidQuadkey {
                key: key.clone(),
                expected_len: tms.quadkey_len(quadkey_zoom),
            });
        }

        let center = draft
            .center
            .unwrap_or_else(|| center_of(&draft.bounds, draft.minzoom));

        Ok(MosaicDocument {
            mosaicjson: draft.mosaicjson,
            name: draft.name,
            description: draft.description,
            version: draft.version,
            attribution: draft.attribution,
            minzoom: draft.minzoom,
            maxzoom: draft.maxzoom,
            quadkey_zoom,
            bounds: draft.bounds,
            center,
            tiles: draft.tiles,
            tilematrixset: draft.tilematrixset,
            asset_prefix: draft.asset_prefix,
        })
    }
}

impl From<MosaicDocument> for MosaicDraft {
    fn from(doc: MosaicDocument) -> Self {
        MosaicDraft {
            mosaicjson: doc.mosaicjson,
            name: doc.name,
            description: doc.description,
            version: doc.version,
            attribution: doc.attribution,
            minzoom: doc.minzoom,
            maxzoom: doc.maxzoom,
            quadkey_zoom: Some(doc.quadkey_zoom),
            bounds: doc.bounds,
            center: Some(doc.center),
            tiles: doc.tiles,
            tilematrixset: doc.tilematrixset,
            asset_prefix: doc.asset_prefix,
        }
    }
}

fn center_of(bounds: &BBox, minzoom: u8) -> Center {
    let (lon, lat) = bounds.center();
    Center {
        lon,
        lat,
        zoom: minzoom,
    }
}

fn next_version(version: &str) -> Result<String, DocumentError> {
    let mut parts = parse_version(version)?;
    if let Some(last) = parts.last_mut() {
        *last = last
            .checked_add(1)
            .ok_or_else(|| DocumentError::VersionOverflow(version.to_string()))?;
    }
    Ok(parts
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join("."))
}

fn parse_version(version: &str) -> Result<Vec<u64>, DocumentError> {
    version
        .split('.')
        .map(|part| part.parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| DocumentError::InvalidVersion(version.to_string()))
}

impl MosaicDocument {
    /// Schema generation marker (`mosaicjson` field).
    pub fn spec_version(&self) -> &str {
        &self.mosaicjson
    }

    /// Dotted document version, bumped on every mutation.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn minzoom(&self) -> u8 {
        self.minzoom
    }

    pub fn maxzoom(&self) -> u8 {
        self.maxzoom
    }

    pub fn quadkey_zoom(&self) -> u8 {
        self.quadkey_zoom
    }

    pub fn bounds(&self) -> BBox {
        self.bounds
    }

    pub fn center(&self) -> Center {
        self.center
    }

    pub fn tiles(&self) -> &BTreeMap<String, Vec<String>> {
        &self.tiles
    }

    /// Raw asset list stored under one quadkey, without the asset prefix.
    pub fn assets_at(&self, quadkey: &str) -> Option<&[String]> {
        self.tiles.get(quadkey).map(Vec::as_slice)
    }

    pub fn quadkeys(&self) -> impl Iterator<Item = &str> {
        self.tiles.keys().map(String::as_str)
    }

    /// Tiling scheme of the index, defaulting to Web Mercator.
    pub fn tile_matrix_set(&self) -> TileMatrixSet {
        self.tilematrixset.unwrap_or_default()
    }

    pub fn asset_prefix(&self) -> Option<&str> {
        self.asset_prefix.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn attribution(&self) -> Option<&str> {
        self.attribution.as_deref()
    }

    /// Document-level fields with an empty `tiles` map.
    ///
    /// Table backends store these separately from the per-quadkey rows.
    pub fn metadata(&self) -> MosaicDraft {
        MosaicDraft {
            mosaicjson: self.mosaicjson.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            version: self.version.clone(),
            attribution: self.attribution.clone(),
            minzoom: self.minzoom,
            maxzoom: self.maxzoom,
            quadkey_zoom: Some(self.quadkey_zoom),
            bounds: self.bounds,
            center: Some(self.center),
            tiles: BTreeMap::new(),
            tilematrixset: self.tilematrixset,
            asset_prefix: self.asset_prefix.clone(),
        }
    }

    /// Replaces the name, returning the updated document.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_attribution(mut self, attribution: impl Into<String>) -> Self {
        self.attribution = Some(attribution.into());
        self
    }

    pub fn with_asset_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.asset_prefix = Some(prefix.into());
        self
    }

    /// Sets `center` to the bounds midpoint at `minzoom`.
    pub fn recompute_center(&mut self) {
        self.center = center_of(&self.bounds, self.minzoom);
    }

    /// Increments the trailing numeric component of the version.
    pub fn bump_version(&mut self) -> Result<(), DocumentError> {
        self.version = next_version(&self.version)?;
        Ok(())
    }

    /// Folds a delta document into this one.
    ///
    /// For every quadkey of `delta` the new assets are merged into the
    /// existing list per `order`, keeping first occurrences. Bounds become the
    /// union of both documents, the center is recomputed and the version
    /// bumped. Returns the merged lists of every touched quadkey so
    /// row-oriented backends can persist only what changed. A version that
    /// cannot be bumped leaves the document untouched.
    pub fn merge(
        &mut self,
        delta: &MosaicDocument,
        order: MergeOrder,
    ) -> Result<BTreeMap<String, Vec<String>>, DocumentError> {
        let version = next_version(&self.version)?;
        let mut changed = BTreeMap::new();

        for (quadkey, new_assets) in &delta.tiles {
            let new_assets: Vec<String> = new_assets
                .iter()
                .map(|a| self.strip_prefix(a).to_string())
                .collect();
            let existing = self.tiles.get(quadkey).map(Vec::as_slice).unwrap_or(&[]);
            let merged = merge_asset_lists(existing, &new_assets, order);
            self.tiles.insert(quadkey.clone(), merged.clone());
            changed.insert(quadkey.clone(), merged);
        }

        self.bounds = self.bounds.union(&delta.bounds);
        self.recompute_center();
        self.version = version;
        Ok(changed)
    }

    fn strip_prefix<'a>(&self, asset: &'a str) -> &'a str {
        match &self.asset_prefix {
            Some(prefix) => asset.strip_prefix(prefix.as_str()).unwrap_or(asset),
            None => asset,
        }
    }
}

/// Merges two asset lists, removing duplicates while keeping the first
/// occurrence of each identifier.
pub fn merge_asset_lists(existing: &[String], new: &[String], order: MergeOrder) -> Vec<String> {
    let (first, second) = match order {
        MergeOrder::Prepend => (new, existing),
        MergeOrder::Append => (existing, new),
    };
    dedup_preserving_order(first.iter().chain(second.iter()).cloned())
}

/// Removes repeated identifiers, keeping first-seen order.
pub fn dedup_preserving_order<I>(assets: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = std::collections::HashSet::new();
    assets
        .into_iter()
        .filter(|a| seen.insert(a.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> MosaicDraft {
        let mut tiles = BTreeMap::new();
        tiles.insert("0123".to_string(), vec!["a.tif".to_string()]);
        MosaicDraft {
            minzoom: 4,
            maxzoom: 9,
            bounds: BBox::new(-10.0, -5.0, 10.0, 5.0),
            tiles,
            ..MosaicDraft::default()
        }
    }

    #[test]
    fn test_defaults_quadkey_zoom_and_center() {
        let doc = MosaicDocument::try_from(draft()).unwrap();
        assert_eq!(doc.quadkey_zoom(), 4);
        assert_eq!(
            doc.center(),
            Center {
                lon: 0.0,
                lat: 0.0,
                zoom: 4
            }
        );
        assert_eq!(doc.version(), INITIAL_DOCUMENT_VERSION);
    }

    #[test]
    fn test_rejects_zoom_order() {
        let d = MosaicDraft {
            minzoom: 10,
            maxzoom: 4,
            ..draft()
        };
        assert_eq!(
            MosaicDocument::try_from(d).unwrap_err(),
            DocumentError::ZoomOrder {
                minzoom: 10,
                maxzoom: 4
            }
        );
    }

    #[test]
    fn test_rejects_zoom_out_of_range() {
        let d = MosaicDraft {
            maxzoom: 31,
            ..draft()
        };
        assert!(matches!(
            MosaicDocument::try_from(d),
            Err(DocumentError::InvalidZoom {
                field: "maxzoom",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_unordered_bounds() {
        let d = MosaicDraft {
            bounds: BBox::new(10.0, -5.0, -10.0, 5.0),
            ..draft()
        };
        assert!(matches!(
            MosaicDocument::try_from(d),
            Err(DocumentError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn test_rejects_wrong_key_length() {
        let mut d = draft();
        d.tiles.insert("012".to_string(), vec![]);
        assert_eq!(
            MosaicDocument::try_from(d).unwrap_err(),
            DocumentError::InvalidQuadkey {
                key: "012".to_string(),
                expected_len: 4
            }
        );
    }

    #[test]
    fn test_rejects_bad_key_digit() {
        let mut d = draft();
        d.tiles.insert("0124".to_string(), vec![]);
        assert!(matches!(
            MosaicDocument::try_from(d),
            Err(DocumentError::InvalidQuadkey { .. })
        ));
    }

    #[test]
    fn test_rejects_non_numeric_version() {
        let d = MosaicDraft {
            version: "1.0.beta".to_string(),
            ..draft()
        };
        assert!(matches!(
            MosaicDocument::try_from(d),
            Err(DocumentError::InvalidVersion(_))
        ));
    }

    #[test]
    fn test_bump_version_twice() {
        let mut doc = MosaicDocument::try_from(draft()).unwrap();
        doc.bump_version().unwrap();
        doc.bump_version().unwrap();
        assert_eq!(doc.version(), "1.0.2");

        let mut doc = MosaicDocument::try_from(MosaicDraft {
            version: "7".to_string(),
            ..draft()
        })
        .unwrap();
        doc.bump_version().unwrap();
        assert_eq!(doc.version(), "8");
    }

    #[test]
    fn test_bump_version_overflow() {
        let version = format!("1.{}", u64::MAX);
        let mut doc = MosaicDocument::try_from(MosaicDraft {
            version: version.clone(),
            ..draft()
        })
        .unwrap();
        assert_eq!(
            doc.bump_version(),
            Err(DocumentError::VersionOverflow(version.clone()))
        );
        assert_eq!(doc.version(), version);

        let delta = MosaicDocument::try_from(draft()).unwrap();
        assert!(doc.merge(&delta, MergeOrder::Append).is_err());
        assert_eq!(doc.version(), version);
    }

    #[test]
    fn test_merge_prepend_and_append() {
        let existing = vec!["a".to_string(), "b".to_string()];
        let new = vec!["c".to_string(), "a".to_string()];
        assert_eq!(
            merge_asset_lists(&existing, &new, MergeOrder::Prepend),
            vec!["c", "a", "b"]
        );
        assert_eq!(
            merge_asset_lists(&existing, &new, MergeOrder::Append),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn test_merge_updates_bounds_center_version() {
        let mut doc = MosaicDocument::try_from(draft()).unwrap();
        let mut delta_tiles = BTreeMap::new();
        delta_tiles.insert("0123".to_string(), vec!["b.tif".to_string()]);
        delta_tiles.insert("0000".to_string(), vec!["c.tif".to_string()]);
        let delta = MosaicDocument::try_from(MosaicDraft {
            bounds: BBox::new(0.0, 0.0, 30.0, 15.0),
            tiles: delta_tiles,
            ..draft()
        })
        .unwrap();

        let changed = doc.merge(&delta, MergeOrder::Prepend).unwrap();

        assert_eq!(changed.len(), 2);
        assert_eq!(doc.assets_at("0123").unwrap(), ["b.tif", "a.tif"]);
        assert_eq!(doc.assets_at("0000").unwrap(), ["c.tif"]);
        assert_eq!(doc.bounds().to_array(), [-10.0, -5.0, 30.0, 15.0]);
        assert_eq!(doc.center().lon, 10.0);
        assert_eq!(doc.version(), "1.0.1");
    }

    #[test]
    fn test_merge_strips_asset_prefix() {
        let mut doc = MosaicDocument::try_from(draft())
            .unwrap()
            .with_asset_prefix("s3://bucket/");
        let mut delta_tiles = BTreeMap::new();
        delta_tiles.insert("0123".to_string(), vec!["s3://bucket/b.tif".to_string()]);
        let delta = MosaicDocument::try_from(MosaicDraft {
            tiles: delta_tiles,
            ..draft()
        })
        .unwrap();

        doc.merge(&delta, MergeOrder::Append).unwrap();
        assert_eq!(doc.assets_at("0123").unwrap(), ["a.tif", "b.tif"]);
    }

    #[test]
    fn test_metadata_has_no_tiles() {
        let doc = MosaicDocument::try_from(draft()).unwrap().with_name("test");
        let meta = doc.metadata();
        assert!(meta.tiles.is_empty());
        assert_eq!(meta.name.as_deref(), Some("test"));
        assert_eq!(meta.quadkey_zoom, Some(4));
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let doc = MosaicDocument::try_from(draft()).unwrap();
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["mosaicjson"], MOSAICJSON_VERSION);
        assert_eq!(value["quadkey_zoom"], 4);
        assert_eq!(value["bounds"], serde_json::json!([-10.0, -5.0, 10.0, 5.0]));
        assert_eq!(value["center"], serde_json::json!([0.0, 0.0, 4]));
        assert!(value.get("name").is_none());

        let back: MosaicDocument = serde_json::from_value(value).unwrap();
        assert_eq!(back, doc);
    }
}
