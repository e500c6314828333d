//! Zoom range and data type reconciliation across footprints.

use std::collections::BTreeSet;
use tracing::warn;

use super::{BuildError, Footprint};

/// Property carrying the asset's native minimum zoom.
pub const MINZOOM_PROPERTY: &str = "minzoom";
/// Property carrying the asset's native maximum zoom.
pub const MAXZOOM_PROPERTY: &str = "maxzoom";
/// Property carrying the asset's pixel data type.
pub const DATATYPE_PROPERTY: &str = "datatype";

/// Checks that every footprint declaring a data type declares the same one.
pub fn check_data_types(footprints: &[Footprint]) -> Result<Option<String>, BuildError> {
    let types: BTreeSet<String> = footprints
        .iter()
        .filter_map(|fp| fp.property_str(DATATYPE_PROPERTY))
        .collect();

    if types.len() > 1 {
        return Err(BuildError::MultipleDataType(types.into_iter().collect()));
    }
    Ok(types.into_iter().next())
}

fn reconcile(footprints: &[Footprint], key: &'static str) -> Option<u8> {
    let values: BTreeSet<u8> = footprints
        .iter()
        .filter_map(|fp| fp.property_zoom(key))
        .collect();

    if values.len() > 1 {
        warn!(
            property = key,
            values = ?values,
            "Assets declare different zoom levels, using the highest"
        );
    }
    values.last().copied()
}

/// Resolves the document zoom range.
///
/// Explicit values win. Otherwise the per-footprint hints are used, taking the
/// maximum (with a warning) when they diverge. Data types are always checked.
pub fn resolve_zoom_range(
    footprints: &[Footprint],
    minzoom: Option<u8>,
    maxzoom: Option<u8>,
) -> Result<(u8, u8), BuildError> {
    check_data_types(footprints)?;

    let minzoom = match minzoom {
        Some(z) => z,
        None => reconcile(footprints, MINZOOM_PROPERTY).ok_or(BuildError::MissingZoom("minzoom"))?,
    };
    let maxzoom = match maxzoom {
        Some(z) => z,
        None => reconcile(footprints, MAXZOOM_PROPERTY).ok_or(BuildError::MissingZoom("maxzoom"))?,
    };
    Ok((minzoom, maxzoom))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::BBox;

    fn fp(minzoom: u8, maxzoom: u8, datatype: &str) -> Footprint {
        Footprint::from_bbox("a", BBox::new(0.0, 0.0, 1.0, 1.0))
            .with_property(MINZOOM_PROPERTY, minzoom)
            .with_property(MAXZOOM_PROPERTY, maxzoom)
            .with_property(DATATYPE_PROPERTY, datatype)
    }

    #[test]
    fn test_explicit_zooms_win() {
        let fps = vec![fp(5, 10, "uint8"), fp(6, 12, "uint8")];
        assert_eq!(resolve_zoom_range(&fps, Some(3), Some(9)).unwrap(), (3, 9));
    }

    #[test]
    fn test_divergent_hints_take_max() {
        let fps = vec![fp(5, 10, "uint8"), fp(6, 12, "uint8")];
        assert_eq!(resolve_zoom_range(&fps, None, None).unwrap(), (6, 12));
    }

    #[test]
    fn test_mixed_data_types_fail_even_with_override() {
        let fps = vec![fp(5, 10, "uint8"), fp(5, 10, "float32")];
        let err = resolve_zoom_range(&fps, Some(5), Some(10)).unwrap_err();
        assert_eq!(
            err,
            BuildError::MultipleDataType(vec!["float32".to_string(), "uint8".to_string()])
        );
    }

    #[test]
    fn test_missing_hints() {
        let fps = vec![Footprint::from_bbox("a", BBox::new(0.0, 0.0, 1.0, 1.0))];
        assert_eq!(
            resolve_zoom_range(&fps, None, Some(4)).unwrap_err(),
            BuildError::MissingZoom("minzoom")
        );
    }
}
