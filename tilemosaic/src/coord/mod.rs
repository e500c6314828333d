//! Quadkey geometry primitives
//!
//! Conversions between geographic coordinates, tile coordinates and quadkeys,
//! plus the parent/child walks used to reconcile a query zoom level with the
//! zoom level a mosaic index is keyed at.

mod crs;
mod types;

pub use crs::{CoordTransformer, Crs};
pub use types::{
    BBox, CoordError, TileCoord, TileMatrixSet, EARTH_RADIUS_M, MAX_LAT, MAX_LON, MAX_ZOOM,
    MIN_LAT, MIN_LON, MIN_ZOOM,
};

const BBOX_EPSILON: f64 = 1e-6;

/// Converts geographic coordinates to Web Mercator tile coordinates.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees (-85.05112878 to 85.05112878)
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `zoom` - Zoom level (0 to 30)
///
/// # Returns
///
/// A `Result` containing the tile coordinates or an error if inputs are invalid.
#[inline]
pub fn to_tile_coords(lat: f64, lon: f64, zoom: u8) -> Result<TileCoord, CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    Ok(TileMatrixSet::WebMercatorQuad.tile_for(lon, lat, zoom))
}

/// Converts tile coordinates back to geographic coordinates.
///
/// Returns the latitude/longitude of the tile's northwest corner.
#[inline]
pub fn tile_to_lat_lon(tile: &TileCoord) -> (f64, f64) {
    let bounds = TileMatrixSet::WebMercatorQuad.bounds(tile);
    (bounds.north, bounds.west)
}

/// Encodes a Web Mercator tile as its quadkey.
#[inline]
pub fn tile_to_quadkey(tile: &TileCoord) -> String {
    quadkey_of(tile, TileMatrixSet::WebMercatorQuad)
}

/// Encodes a tile as a quadkey in the given tiling scheme.
///
/// One base-4 digit per zoom level, most significant level first. Digit bit 0
/// comes from the column, bit 1 from the row.
pub fn quadkey_of(tile: &TileCoord, tms: TileMatrixSet) -> String {
    let mut quadkey = String::with_capacity(tms.quadkey_len(tile.zoom));
    if tms.root_width() > 1 {
        let root = (tile.col as u64) >> tile.zoom;
        quadkey.push(if root == 0 { '0' } else { '1' });
    }

    for level in (1..=tile.zoom).rev() {
        let mask = 1u32 << (level - 1);
        let mut digit = b'0';
        if tile.col & mask != 0 {
            digit += 1;
        }
        if tile.row & mask != 0 {
            digit += 2;
        }
        quadkey.push(digit as char);
    }
    quadkey
}

/// Decodes a Web Mercator quadkey.
#[inline]
pub fn quadkey_to_tile(quadkey: &str) -> Result<TileCoord, CoordError> {
    tile_of_quadkey(quadkey, TileMatrixSet::WebMercatorQuad)
}

/// Decodes a quadkey in the given tiling scheme.
pub fn tile_of_quadkey(quadkey: &str, tms: TileMatrixSet) -> Result<TileCoord, CoordError> {
    let invalid = || CoordError::InvalidQuadkey(quadkey.to_string());

    let (root, digits) = if tms.root_width() > 1 {
        match quadkey.as_bytes().first() {
            Some(b'0') => (0u32, &quadkey[1..]),
            Some(b'1') => (1u32, &quadkey[1..]),
            _ => return Err(invalid()),
        }
    } else {
        (0u32, quadkey)
    };

    if digits.len() > MAX_ZOOM as usize {
        return Err(invalid());
    }

    let zoom = digits.len() as u8;
    let mut col = root << zoom;
    let mut row = 0u32;
    for (i, c) in digits.bytes().enumerate() {
        let mask = 1u32 << (zoom as usize - i - 1);
        match c {
            b'0' => {}
            b'1' => col |= mask,
            b'2' => row |= mask,
            b'3' => {
                col |= mask;
                row |= mask;
            }
            _ => return Err(invalid()),
        }
    }

    Ok(TileCoord { row, col, zoom })
}

/// True when `key` is a well-formed quadkey for `zoom` in the tiling scheme.
pub fn is_valid_quadkey(key: &str, zoom: u8, tms: TileMatrixSet) -> bool {
    key.len() == tms.quadkey_len(zoom) && tile_of_quadkey(key, tms).is_ok()
}

/// Walks `depth` levels up the quadtree.
///
/// Returns `None` when `depth` exceeds the tile's zoom.
#[inline]
pub fn parent_tile(tile: &TileCoord, depth: u8) -> Option<TileCoord> {
    if depth > tile.zoom {
        return None;
    }
    Some(TileCoord {
        row: tile.row >> depth,
        col: tile.col >> depth,
        zoom: tile.zoom - depth,
    })
}

/// Enumerates every descendant `depth` levels down, in quadkey order.
pub fn child_tiles(tile: &TileCoord, depth: u8) -> Vec<TileCoord> {
    let mut tiles = vec![*tile];
    for _ in 0..depth {
        let mut next = Vec::with_capacity(tiles.len() * 4);
        for t in &tiles {
            let (row, col, zoom) = (t.row * 2, t.col * 2, t.zoom + 1);
            next.push(TileCoord { row, col, zoom });
            next.push(TileCoord { row, col: col + 1, zoom });
            next.push(TileCoord { row: row + 1, col, zoom });
            next.push(TileCoord {
                row: row + 1,
                col: col + 1,
                zoom,
            });
        }
        tiles = next;
    }
    tiles
}

/// Resolves a tile at any zoom to the quadkeys of the index level.
///
/// - deeper than `quadkey_zoom`: the single ancestor quadkey
/// - shallower: all `4^depth` descendant quadkeys, in quadkey order
/// - equal: the tile's own quadkey
pub fn find_quadkeys(tile: &TileCoord, quadkey_zoom: u8, tms: TileMatrixSet) -> Vec<String> {
    use std::cmp::Ordering;

    match tile.zoom.cmp(&quadkey_zoom) {
        Ordering::Greater => {
            let depth = tile.zoom - quadkey_zoom;
            parent_tile(tile, depth)
                .map(|parent| vec![quadkey_of(&parent, tms)])
                .unwrap_or_default()
        }
        Ordering::Less => {
            let depth = quadkey_zoom - tile.zoom;
            child_tiles(tile, depth)
                .iter()
                .filter(|t| t.zoom == quadkey_zoom)
                .map(|t| quadkey_of(t, tms))
                .collect()
        }
        Ordering::Equal => vec![quadkey_of(tile, tms)],
    }
}

/// Enumerates the rectangular tile range covering a bbox at `zoom`,
/// row-major from the north-west corner.
///
/// The box is inset by a micro-degree so an edge lying exactly on a tile
/// boundary does not pull in the neighbouring row or column.
pub fn tiles_in_bbox(bbox: &BBox, zoom: u8, tms: TileMatrixSet) -> Vec<TileCoord> {
    let dx = BBOX_EPSILON.min((bbox.east - bbox.west).abs() / 2.0);
    let dy = BBOX_EPSILON.min((bbox.north - bbox.south).abs() / 2.0);
    let top_left = tms.tile_for(bbox.west + dx, bbox.north - dy, zoom);
    let bottom_right = tms.tile_for(bbox.east - dx, bbox.south + dy, zoom);

    let mut tiles = Vec::new();
    for row in top_left.row..=bottom_right.row {
        for col in top_left.col..=bottom_right.col {
            tiles.push(TileCoord { row, col, zoom });
        }
    }
    tiles
}
