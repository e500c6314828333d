//! EPSG coordinate reference systems and point reprojection.

use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use std::fmt;

use super::types::{BBox, CoordError};

/// A coordinate reference system identified by its EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Crs(pub u32);

impl Crs {
    /// Geographic WGS84, the CRS mosaic bounds are expressed in.
    pub const WGS84: Crs = Crs(4326);
    /// Spherical Web Mercator.
    pub const WEB_MERCATOR: Crs = Crs(3857);

    pub fn epsg(&self) -> u32 {
        self.0
    }

    fn proj_string(&self) -> Option<&'static str> {
        u16::try_from(self.0)
            .ok()
            .and_then(crs_definitions::from_code)
            .map(|def| def.proj4)
    }

    /// True for lon/lat systems, which proj4rs expects in radians.
    pub fn is_geographic(&self) -> bool {
        match self.proj_string() {
            Some(proj) => proj.contains("+proj=longlat"),
            None => self.0 == 4326,
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

impl std::str::FromStr for Crs {
    type Err = CoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s
            .trim()
            .trim_start_matches("EPSG:")
            .trim_start_matches("epsg:");
        code.parse::<u32>()
            .map(Crs)
            .map_err(|_| CoordError::Transform(format!("not an EPSG code: '{}'", s)))
    }
}

/// Reprojects points between two CRSs.
///
/// Identical source and target short-circuit to the identity transform.
pub struct CoordTransformer {
    source: Crs,
    target: Crs,
    projs: Option<(Proj, Proj)>,
}

impl CoordTransformer {
    pub fn new(source: Crs, target: Crs) -> Result<Self, CoordError> {
        if source == target {
            return Ok(Self {
                source,
                target,
                projs: None,
            });
        }

        let build = |crs: Crs| -> Result<Proj, CoordError> {
            let def = crs.proj_string().ok_or(CoordError::UnsupportedCrs(crs.0))?;
            Proj::from_proj_string(def)
                .map_err(|e| CoordError::Transform(format!("{}: {:?}", crs, e)))
        };

        Ok(Self {
            source,
            target,
            projs: Some((build(source)?, build(target)?)),
        })
    }

    pub fn is_identity(&self) -> bool {
        self.projs.is_none()
    }

    /// Transforms one point from source to target CRS.
    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64), CoordError> {
        let Some((source_proj, target_proj)) = &self.projs else {
            return Ok((x, y));
        };

        let mut point = if self.source.is_geographic() {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };

        transform(source_proj, target_proj, &mut point).map_err(|e| {
            CoordError::Transform(format!(
                "{} -> {} failed for ({}, {}): {:?}",
                self.source, self.target, x, y, e
            ))
        })?;

        if self.target.is_geographic() {
            Ok((point.0.to_degrees(), point.1.to_degrees()))
        } else {
            Ok((point.0, point.1))
        }
    }

    /// Envelope of `bbox` in the target CRS.
    ///
    /// Each edge is sampled at `EDGE_SAMPLES` points so boxes whose edges
    /// curve under the transform are not undersized.
    pub fn transform_bbox(&self, bbox: &BBox) -> Result<BBox, CoordError> {
        if self.is_identity() {
            return Ok(*bbox);
        }

        let (mut west, mut south) = (f64::INFINITY, f64::INFINITY);
        let (mut east, mut north) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        let width = bbox.east - bbox.west;
        let height = bbox.north - bbox.south;
        for i in 0..=EDGE_SAMPLES {
            let t = i as f64 / EDGE_SAMPLES as f64;
            let x = bbox.west + width * t;
            let y = bbox.south + height * t;
            for (px, py) in [(x, bbox.south), (x, bbox.north), (bbox.west, y), (bbox.east, y)] {
                let (tx, ty) = self.transform(px, py)?;
                west = west.min(tx);
                south = south.min(ty);
                east = east.max(tx);
                north = north.max(ty);
            }
        }
        Ok(BBox::new(west, south, east, north))
    }
}

/// Segments each bbox edge is split into by [`CoordTransformer::transform_bbox`].
const EDGE_SAMPLES: usize = 20;
