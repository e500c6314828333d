//! Asset footprints and their GeoJSON representation.

use geo::BoundingRect;
use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use super::BuildError;
use crate::coord::BBox;

/// Polygon coverage of one source asset plus its feature properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Footprint {
    /// Feature-level `id`, if the source carried one
    pub id: Option<String>,
    pub geometry: MultiPolygon<f64>,
    pub properties: Map<String, Value>,
}

impl Footprint {
    pub fn new(geometry: MultiPolygon<f64>, properties: Map<String, Value>) -> Self {
        Self {
            id: None,
            geometry,
            properties,
        }
    }

    /// Rectangular footprint for `path` covering `bbox`.
    pub fn from_bbox(path: impl Into<String>, bbox: BBox) -> Self {
        let mut properties = Map::new();
        properties.insert("path".to_string(), Value::String(path.into()));
        Self::new(MultiPolygon(vec![bbox_polygon(&bbox)]), properties)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Geographic bounding box of the geometry.
    pub fn bounds(&self) -> Option<BBox> {
        self.geometry
            .bounding_rect()
            .map(|r| BBox::new(r.min().x, r.min().y, r.max().x, r.max().y))
    }

    /// String value of a property; numbers are rendered as text.
    pub fn property_str(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Integer zoom hint stored under `key`.
    pub fn property_zoom(&self, key: &str) -> Option<u8> {
        self.properties
            .get(key)?
            .as_f64()
            .filter(|z| (0.0..=255.0).contains(z))
            .map(|z| z.round() as u8)
    }
}

/// Closed rectangle polygon for a bbox.
pub fn bbox_polygon(bbox: &BBox) -> Polygon<f64> {
    Polygon::new(
        LineString::from(vec![
            (bbox.west, bbox.south),
            (bbox.east, bbox.south),
            (bbox.east, bbox.north),
            (bbox.west, bbox.north),
            (bbox.west, bbox.south),
        ]),
        vec![],
    )
}

/// Extracts the asset identifier from a footprint.
#[derive(Clone, Default)]
pub enum Accessor {
    /// The `path` property
    #[default]
    Path,
    /// The feature `id`
    Id,
    /// Any named property
    Property(String),
    Custom(Arc<dyn Fn(&Footprint) -> Option<String> + Send + Sync>),
}

impl Accessor {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Footprint) -> Option<String> + Send + Sync + 'static,
    {
        Accessor::Custom(Arc::new(f))
    }

    pub fn extract(&self, footprint: &Footprint) -> Option<String> {
        match self {
            Accessor::Path => footprint.property_str("path"),
            Accessor::Id => footprint.id.clone(),
            Accessor::Property(key) => footprint.property_str(key),
            Accessor::Custom(f) => f(footprint),
        }
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accessor::Path => write!(f, "Accessor::Path"),
            Accessor::Id => write!(f, "Accessor::Id"),
            Accessor::Property(key) => write!(f, "Accessor::Property({:?})", key),
            Accessor::Custom(_) => write!(f, "Accessor::Custom(..)"),
        }
    }
}

// GeoJSON wire shapes. Positions may carry a third (elevation) ordinate,
// which is dropped.

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
enum GeometryRepr {
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
}

#[derive(Debug, Deserialize, Serialize)]
struct FeatureRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<Value>,
    geometry: GeometryRepr,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum GeoJsonRepr {
    FeatureCollection { features: Vec<FeatureRepr> },
    Feature(FeatureRepr),
}

fn ring(coords: &[Vec<f64>]) -> Result<LineString<f64>, BuildError> {
    coords
        .iter()
        .map(|pos| match pos.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => Err(BuildError::InvalidGeometry(format!(
                "position needs at least 2 ordinates, got {}",
                pos.len()
            ))),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::new)
}

fn polygon(rings: &[Vec<Vec<f64>>]) -> Result<Polygon<f64>, BuildError> {
    let (exterior, interiors) = rings
        .split_first()
        .ok_or_else(|| BuildError::InvalidGeometry("polygon has no rings".to_string()))?;
    Ok(Polygon::new(
        ring(exterior)?,
        interiors.iter().map(|r| ring(r)).collect::<Result<_, _>>()?,
    ))
}

impl TryFrom<FeatureRepr> for Footprint {
    type Error = BuildError;

    fn try_from(feature: FeatureRepr) -> Result<Self, Self::Error> {
        let geometry = match &feature.geometry {
            GeometryRepr::Polygon { coordinates } => MultiPolygon(vec![polygon(coordinates)?]),
            GeometryRepr::MultiPolygon { coordinates } => MultiPolygon(
                coordinates
                    .iter()
                    .map(|p| polygon(p))
                    .collect::<Result<_, _>>()?,
            ),
        };
        let id = feature.id.and_then(|v| match v {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

        Ok(Footprint {
            id,
            geometry,
            properties: feature.properties.unwrap_or_default(),
        })
    }
}

fn to_positions(ls: &LineString<f64>) -> Vec<Vec<f64>> {
    ls.coords().map(|c| vec![c.x, c.y]).collect()
}

impl From<&Footprint> for FeatureRepr {
    fn from(fp: &Footprint) -> Self {
        let coordinates = fp
            .geometry
            .iter()
            .map(|p| {
                std::iter::once(p.exterior())
                    .chain(p.interiors())
                    .map(to_positions)
                    .collect()
            })
            .collect();
        FeatureRepr {
            id: fp.id.clone().map(Value::String),
            geometry: GeometryRepr::MultiPolygon { coordinates },
            properties: Some(fp.properties.clone()),
        }
    }
}

/// Parses a GeoJSON `FeatureCollection` or single `Feature`.
///
/// Only `Polygon` and `MultiPolygon` geometries are accepted.
pub fn parse_footprints(json: &[u8]) -> Result<Vec<Footprint>, BuildError> {
    let repr: GeoJsonRepr =
        serde_json::from_slice(json).map_err(|e| BuildError::InvalidGeometry(e.to_string()))?;
    let features = match repr {
        GeoJsonRepr::FeatureCollection { features } => features,
        GeoJsonRepr::Feature(feature) => vec![feature],
    };
    features.into_iter().map(Footprint::try_from).collect()
}

/// Parses a list of already-decoded GeoJSON features.
pub fn footprints_from_values(features: Vec<Value>) -> Result<Vec<Footprint>, BuildError> {
    features
        .into_iter()
        .map(|v| {
            serde_json::from_value::<FeatureRepr>(v)
                .map_err(|e| BuildError::InvalidGeometry(e.to_string()))
                .and_then(Footprint::try_from)
        })
        .collect()
}

/// Renders footprints as a GeoJSON `FeatureCollection`.
pub fn to_feature_collection(footprints: &[Footprint]) -> Value {
    let features: Vec<Value> = footprints
        .iter()
        .map(|fp| {
            let mut feature = serde_json::to_value(FeatureRepr::from(fp)).unwrap_or(Value::Null);
            if let Value::Object(map) = &mut feature {
                map.insert("type".to_string(), Value::String("Feature".to_string()));
            }
            feature
        })
        .collect();

    serde_json::json!({
        "type": "FeatureCollection",
        "features": features,
    })
}
