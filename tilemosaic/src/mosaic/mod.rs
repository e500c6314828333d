//! Mosaic document model
//!
//! A [`MosaicDocument`] maps quadkeys at a single index zoom level to ordered
//! lists of asset identifiers. Documents are validated at construction and
//! only change through [`MosaicDocument::merge`].

mod codec;
mod document;
mod error;

pub use codec::{
    decode_document, decode_for_path, encode_document, encode_for_path, is_gzip_path,
};
pub use document::{
    dedup_preserving_order, merge_asset_lists, Center, MosaicDocument, MosaicDraft,
    INITIAL_DOCUMENT_VERSION, MOSAICJSON_VERSION,
};
pub use error::DocumentError;

use crate::coord::BBox;
use std::fmt;
use std::str::FromStr;

/// Where newly indexed assets go relative to existing ones on update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeOrder {
    /// New assets take priority
    #[default]
    Prepend,
    /// Existing assets keep priority
    Append,
}

impl fmt::Display for MergeOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeOrder::Prepend => write!(f, "prepend"),
            MergeOrder::Append => write!(f, "append"),
        }
    }
}

impl FromStr for MergeOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "prepend" | "first" => Ok(MergeOrder::Prepend),
            "append" | "last" => Ok(MergeOrder::Append),
            other => Err(format!("unknown merge order '{}'", other)),
        }
    }
}

/// Component-wise union of two bounding boxes.
#[inline]
pub fn bounds_union(a: &BBox, b: &BBox) -> BBox {
    a.union(b)
}
