//! R-tree over footprint envelopes.

use geo::Intersects;
use geo_types::Polygon;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

use super::Footprint;
use crate::coord::BBox;

type Entry = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// Overlap index over a footprint slice; query results are indices into it.
pub struct FootprintIndex<'a> {
    footprints: &'a [Footprint],
    tree: RTree<Entry>,
}

impl<'a> FootprintIndex<'a> {
    pub fn new(footprints: &'a [Footprint]) -> Self {
        let entries = footprints
            .iter()
            .enumerate()
            .filter_map(|(i, fp)| {
                let b = fp.bounds()?;
                Some(GeomWithData::new(
                    Rectangle::from_corners([b.west, b.south], [b.east, b.north]),
                    i,
                ))
            })
            .collect();

        Self {
            footprints,
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Indices of footprints whose geometry touches `area`, in input order.
    pub fn intersecting(&self, envelope: &BBox, area: &Polygon<f64>) -> Vec<usize> {
        let query = AABB::from_corners(
            [envelope.west, envelope.south],
            [envelope.east, envelope.north],
        );
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&query)
            .map(|entry| entry.data)
            .filter(|&i| area.intersects(&self.footprints[i].geometry))
            .collect();
        hits.sort_unstable();
        hits
    }
}
