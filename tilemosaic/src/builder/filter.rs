//! Per-tile asset filtering by coverage fraction.

use geo::{Area, BooleanOps, MapCoords};
use geo_types::{Coord, MultiPolygon, Polygon};

use super::footprint::{bbox_polygon, Footprint};
use super::BuildError;
use crate::coord::{TileCoord, TileMatrixSet};

/// Default cap on assets listed per tile.
pub const DEFAULT_MAX_ITEMS_PER_TILE: usize = 20;

/// Knobs for the default coverage filter.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOptions {
    /// Drop assets covering no more than this fraction of the tile (0-1)
    pub minimum_tile_cover: Option<f64>,
    /// Order assets by descending coverage
    pub tile_cover_sort: bool,
    /// Keep at most this many assets per tile; 0 means unlimited
    pub maximum_items_per_tile: usize,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            minimum_tile_cover: None,
            tile_cover_sort: false,
            maximum_items_per_tile: DEFAULT_MAX_ITEMS_PER_TILE,
        }
    }
}

impl FilterOptions {
    pub fn with_minimum_tile_cover(mut self, cover: f64) -> Self {
        self.minimum_tile_cover = Some(cover);
        self
    }

    pub fn with_tile_cover_sort(mut self, sort: bool) -> Self {
        self.tile_cover_sort = sort;
        self
    }

    pub fn with_maximum_items_per_tile(mut self, max: usize) -> Self {
        self.maximum_items_per_tile = max;
        self
    }

    pub fn validate(&self) -> Result<(), BuildError> {
        match self.minimum_tile_cover {
            Some(cover) if !(0.0..=1.0).contains(&cover) => Err(BuildError::InvalidFilter(
                format!("minimum_tile_cover must be within 0-1, got {}", cover),
            )),
            _ => Ok(()),
        }
    }
}

/// An asset found to intersect the tile being filled.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    /// Position in the builder's input
    pub index: usize,
    pub footprint: &'a Footprint,
}

/// Selects and orders the assets listed for one tile.
///
/// Candidates arrive in input order; the returned order is the priority
/// order stored in the index.
pub trait AssetFilter: Send + Sync {
    fn filter<'a>(
        &self,
        tile: &TileCoord,
        tms: TileMatrixSet,
        candidates: Vec<Candidate<'a>>,
        options: &FilterOptions,
    ) -> Vec<Candidate<'a>>;
}

/// Coverage threshold, optional coverage sort, then item cap.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoverageFilter;

impl AssetFilter for CoverageFilter {
    fn filter<'a>(
        &self,
        tile: &TileCoord,
        tms: TileMatrixSet,
        candidates: Vec<Candidate<'a>>,
        options: &FilterOptions,
    ) -> Vec<Candidate<'a>> {
        let mut selected = candidates;

        if options.minimum_tile_cover.is_some() || options.tile_cover_sort {
            let mut scored: Vec<(f64, Candidate<'a>)> = selected
                .into_iter()
                .map(|c| (coverage_fraction(tile, tms, c.footprint), c))
                .collect();

            if let Some(min) = options.minimum_tile_cover {
                scored.retain(|(cover, _)| *cover > min);
            }
            if options.tile_cover_sort {
                // Stable: equal coverage keeps input order.
                scored.sort_by(|a, b| b.0.total_cmp(&a.0));
            }
            selected = scored.into_iter().map(|(_, c)| c).collect();
        }

        if options.maximum_items_per_tile > 0 {
            selected.truncate(options.maximum_items_per_tile);
        }
        selected
    }
}

fn to_native(tms: TileMatrixSet) -> impl Fn(Coord<f64>) -> Coord<f64> + Copy {
    move |c| {
        let (x, y) = tms.to_native(c.x, c.y);
        Coord { x, y }
    }
}

/// Fraction of the tile's area covered by the footprint, measured in the
/// tiling scheme's native units.
pub fn coverage_fraction(tile: &TileCoord, tms: TileMatrixSet, footprint: &Footprint) -> f64 {
    let tile_poly: Polygon<f64> = bbox_polygon(&tms.bounds(tile)).map_coords(to_native(tms));
    let tile_area = tile_poly.unsigned_area();
    let tile_poly = MultiPolygon(vec![tile_poly]);
    if tile_area <= 0.0 {
        return 0.0;
    }

    let geometry: MultiPolygon<f64> = footprint.geometry.map_coords(to_native(tms));
    let covered = tile_poly.intersection(&geometry).unsigned_area();
    (covered / tile_area).clamp(0.0, 1.0)
}
