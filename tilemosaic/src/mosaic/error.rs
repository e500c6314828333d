//! Document validation and codec errors.

use thiserror::Error;

/// Errors raised while constructing, validating or (de)serializing a
/// mosaic document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DocumentError {
    /// A zoom field is outside 0-30
    #[error("{field} = {value} is out of range (0-30)")]
    InvalidZoom { field: &'static str, value: u8 },

    /// minzoom is greater than maxzoom
    #[error("minzoom {minzoom} is greater than maxzoom {maxzoom}")]
    ZoomOrder { minzoom: u8, maxzoom: u8 },

    /// Bounds are not ordered west < east, south < north
    #[error("Invalid bounds [{west}, {south}, {east}, {north}]: expected west < east and south < north")]
    InvalidBounds {
        west: f64,
        south: f64,
        east: f64,
        north: f64,
    },

    /// Tile key has the wrong length or a digit outside 0-3
    #[error("Invalid quadkey '{key}': expected {expected_len} digits in 0-3")]
    InvalidQuadkey { key: String, expected_len: usize },

    /// Document version is not a dotted integer string
    #[error("Invalid document version '{0}': expected dotted integers like 1.0.0")]
    InvalidVersion(String),

    /// Version bump would overflow the trailing component
    #[error("Cannot bump document version '{0}': trailing component is at its maximum")]
    VersionOverflow(String),

    /// JSON could not be parsed into a document
    #[error("Failed to parse mosaic document: {0}")]
    Parse(String),

    /// gzip encode/decode failed
    #[error("Compression error: {0}")]
    Compression(String),
}
