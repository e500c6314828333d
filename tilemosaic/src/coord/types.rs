//! Coordinate type definitions

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Web Mercator valid latitude range
pub const MIN_LAT: f64 = -85.05112878;
pub const MAX_LAT: f64 = 85.05112878;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Zoom levels addressable by a quadkey index
pub const MIN_ZOOM: u8 = 0;
pub const MAX_ZOOM: u8 = 30;

/// WGS84 semi-major axis used by the spherical Mercator projection.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Tile coordinates in a quadtree tile matrix.
///
/// `col` is the matrix column (x), `row` the matrix row (y, 0 at north).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    /// Y coordinate (north-south), 0 at north
    pub row: u32,
    /// X coordinate (east-west), 0 at west
    pub col: u32,
    /// Zoom level (0-30)
    pub zoom: u8,
}

impl TileCoord {
    /// Creates a tile from slippy-map style `x/y/z` components.
    #[inline]
    pub fn from_xyz(x: u32, y: u32, z: u8) -> Self {
        Self {
            row: y,
            col: x,
            zoom: z,
        }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.col, self.row)
    }
}

/// Geographic bounding box as (west, south, east, north) in degrees.
///
/// Serialized as a plain four element array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BBox {
    pub const WORLD: BBox = BBox {
        west: MIN_LON,
        south: MIN_LAT,
        east: MAX_LON,
        north: MAX_LAT,
    };

    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Component-wise min/max merge of two boxes.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            west: self.west.min(other.west),
            south: self.south.min(other.south),
            east: self.east.max(other.east),
            north: self.north.max(other.north),
        }
    }

    /// True when west < east and south < north.
    pub fn is_ordered(&self) -> bool {
        self.west < self.east && self.south < self.north
    }

    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        (self.west..=self.east).contains(&lon) && (self.south..=self.north).contains(&lat)
    }

    pub fn intersects(&self, other: &BBox) -> bool {
        self.west <= other.east
            && other.west <= self.east
            && self.south <= other.north
            && other.south <= self.north
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.west + self.east) / 2.0,
            (self.south + self.north) / 2.0,
        )
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.west, self.south, self.east, self.north]
    }
}

impl From<[f64; 4]> for BBox {
    fn from(v: [f64; 4]) -> Self {
        BBox::new(v[0], v[1], v[2], v[3])
    }
}

impl Serialize for BBox {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_array().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BBox {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        <[f64; 4]>::deserialize(deserializer).map(BBox::from)
    }
}

/// Tiling scheme used to lay out the quadtree.
///
/// Both variants are strict quadtrees. `WorldCrs84Quad` has a 2x1 matrix
/// at zoom 0, so its quadkeys carry one extra leading digit selecting the
/// root column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TileMatrixSet {
    #[default]
    WebMercatorQuad,
    WorldCrs84Quad,
}

impl TileMatrixSet {
    /// OGC identifier of the tile matrix set.
    pub fn id(&self) -> &'static str {
        match self {
            TileMatrixSet::WebMercatorQuad => "WebMercatorQuad",
            TileMatrixSet::WorldCrs84Quad => "WorldCRS84Quad",
        }
    }

    /// Number of tile columns at zoom 0.
    #[inline]
    pub fn root_width(&self) -> u32 {
        match self {
            TileMatrixSet::WebMercatorQuad => 1,
            TileMatrixSet::WorldCrs84Quad => 2,
        }
    }

    #[inline]
    pub fn matrix_width(&self, zoom: u8) -> u64 {
        (self.root_width() as u64) << zoom
    }

    #[inline]
    pub fn matrix_height(&self, zoom: u8) -> u64 {
        1u64 << zoom
    }

    /// Length of a quadkey addressing a tile at `zoom`.
    #[inline]
    pub fn quadkey_len(&self, zoom: u8) -> usize {
        zoom as usize + usize::from(self.root_width() > 1)
    }

    /// Geographic extent covered by the whole matrix.
    pub fn extent(&self) -> BBox {
        match self {
            TileMatrixSet::WebMercatorQuad => BBox::WORLD,
            TileMatrixSet::WorldCrs84Quad => BBox::new(-180.0, -90.0, 180.0, 90.0),
        }
    }

    /// Returns the tile containing the point at `zoom`.
    ///
    /// Points outside the matrix extent are clamped to the nearest edge tile.
    pub fn tile_for(&self, lon: f64, lat: f64, zoom: u8) -> TileCoord {
        let width = self.matrix_width(zoom) as f64;
        let height = self.matrix_height(zoom) as f64;
        let extent = self.extent();
        let lon = lon.clamp(extent.west, extent.east);
        let lat = lat.clamp(extent.south, extent.north);

        let (fx, fy) = match self {
            TileMatrixSet::WebMercatorQuad => {
                let lat_rad = lat.to_radians();
                (
                    (lon + 180.0) / 360.0,
                    (1.0 - lat_rad.tan().asinh() / PI) / 2.0,
                )
            }
            TileMatrixSet::WorldCrs84Quad => ((lon + 180.0) / 360.0, (90.0 - lat) / 180.0),
        };

        let col = (fx * width).floor().clamp(0.0, width - 1.0) as u32;
        let row = (fy * height).floor().clamp(0.0, height - 1.0) as u32;
        TileCoord { row, col, zoom }
    }

    /// Geographic bounds of a tile.
    pub fn bounds(&self, tile: &TileCoord) -> BBox {
        let width = self.matrix_width(tile.zoom) as f64;
        let height = self.matrix_height(tile.zoom) as f64;
        let west = tile.col as f64 / width * 360.0 - 180.0;
        let east = (tile.col as f64 + 1.0) / width * 360.0 - 180.0;

        match self {
            TileMatrixSet::WebMercatorQuad => {
                let lat_at = |row: f64| (PI * (1.0 - 2.0 * row / height)).sinh().atan().to_degrees();
                BBox::new(west, lat_at(tile.row as f64 + 1.0), east, lat_at(tile.row as f64))
            }
            TileMatrixSet::WorldCrs84Quad => {
                let north = 90.0 - tile.row as f64 / height * 180.0;
                let south = 90.0 - (tile.row as f64 + 1.0) / height * 180.0;
                BBox::new(west, south, east, north)
            }
        }
    }

    /// Projects a geographic point into the matrix's native units
    /// (meters for Web Mercator, degrees for CRS84).
    pub fn to_native(&self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            TileMatrixSet::WebMercatorQuad => {
                let lat = lat.clamp(MIN_LAT, MAX_LAT).to_radians();
                let x = EARTH_RADIUS_M * lon.to_radians();
                let y = EARTH_RADIUS_M * (PI / 4.0 + lat / 2.0).tan().ln();
                (x, y)
            }
            TileMatrixSet::WorldCrs84Quad => (lon, lat),
        }
    }
}

impl fmt::Display for TileMatrixSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for TileMatrixSet {
    type Err = CoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "webmercatorquad" => Ok(TileMatrixSet::WebMercatorQuad),
            "worldcrs84quad" => Ok(TileMatrixSet::WorldCrs84Quad),
            _ => Err(CoordError::UnknownTileMatrixSet(s.to_string())),
        }
    }
}

impl Serialize for TileMatrixSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.id())
    }
}

impl<'de> Deserialize<'de> for TileMatrixSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Accept either the identifier or a full TMS object carrying an `id`.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Id(String),
            Object { id: String },
        }

        let id = match Repr::deserialize(deserializer)? {
            Repr::Id(id) | Repr::Object { id } => id,
        };
        id.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors that can occur during coordinate conversion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Latitude is outside the Web Mercator range
    #[error("Invalid latitude: {0} (must be between {min} and {max})", min = MIN_LAT, max = MAX_LAT)]
    InvalidLatitude(f64),

    #[error("Invalid longitude: {0} (must be between {min} and {max})", min = MIN_LON, max = MAX_LON)]
    InvalidLongitude(f64),

    #[error("Invalid zoom level: {0} (must be between {min} and {max})", min = MIN_ZOOM, max = MAX_ZOOM)]
    InvalidZoom(u8),

    /// Quadkey contains invalid characters or is too long
    #[error("Invalid quadkey: '{0}' (must contain only digits 0-3 and length <= {max})", max = MAX_ZOOM)]
    InvalidQuadkey(String),

    #[error("Unknown tile matrix set: '{0}'")]
    UnknownTileMatrixSet(String),

    /// EPSG code missing from the CRS database or not parseable
    #[error("Unsupported CRS: EPSG:{0}")]
    UnsupportedCrs(u32),

    #[error("Coordinate transform failed: {0}")]
    Transform(String),
}
