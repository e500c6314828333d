//! Tile burning: the set of index tiles each footprint touches.

use geo::Intersects;
use std::collections::BTreeMap;

use super::footprint::{bbox_polygon, Footprint};
use crate::coord::{quadkey_of, tiles_in_bbox, TileCoord, TileMatrixSet};

/// Returns every tile at `zoom` touched by at least one footprint, keyed and
/// ordered by quadkey.
///
/// Only the tiles inside each footprint's own bounding range are tested, so
/// sparse or elongated inputs do not pay for the union bbox area.
pub fn burn_tiles(
    footprints: &[Footprint],
    zoom: u8,
    tms: TileMatrixSet,
) -> BTreeMap<String, TileCoord> {
    let mut burned = BTreeMap::new();

    for fp in footprints {
        let Some(bounds) = fp.bounds() else {
            continue;
        };
        for tile in tiles_in_bbox(&bounds, zoom, tms) {
            let key = quadkey_of(&tile, tms);
            if burned.contains_key(&key) {
                continue;
            }
            if bbox_polygon(&tms.bounds(&tile)).intersects(&fp.geometry) {
                burned.insert(key, tile);
            }
        }
    }
    burned
}
