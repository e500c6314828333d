//! JSON and gzip encoding of documents.
//!
//! Compression is selected by a `.gz` suffix on the storage key or path.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use super::document::{MosaicDocument, MosaicDraft};
use super::error::DocumentError;

/// True when the key or path names a gzip-compressed document.
pub fn is_gzip_path(path: &str) -> bool {
    path.ends_with(".gz")
}

/// Serializes a document, gzip-compressing when `gzip` is set.
pub fn encode_document(doc: &MosaicDocument, gzip: bool) -> Result<Vec<u8>, DocumentError> {
    let json = serde_json::to_vec(doc).map_err(|e| DocumentError::Parse(e.to_string()))?;
    if !gzip {
        return Ok(json);
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .map_err(|e| DocumentError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| DocumentError::Compression(e.to_string()))
}

/// Parses a document, decompressing first when `gzip` is set.
pub fn decode_document(bytes: &[u8], gzip: bool) -> Result<MosaicDocument, DocumentError> {
    let json = if gzip {
        let mut decoded = Vec::new();
        GzDecoder::new(bytes)
            .read_to_end(&mut decoded)
            .map_err(|e| DocumentError::Compression(e.to_string()))?;
        decoded
    } else {
        bytes.to_vec()
    };

    let draft: MosaicDraft =
        serde_json::from_slice(&json).map_err(|e| DocumentError::Parse(e.to_string()))?;
    MosaicDocument::try_from(draft)
}

/// Encodes by path convention.
pub fn encode_for_path(doc: &MosaicDocument, path: &str) -> Result<Vec<u8>, DocumentError> {
    encode_document(doc, is_gzip_path(path))
}

/// Decodes by path convention.
pub fn decode_for_path(bytes: &[u8], path: &str) -> Result<MosaicDocument, DocumentError> {
    decode_document(bytes, is_gzip_path(path))
}
