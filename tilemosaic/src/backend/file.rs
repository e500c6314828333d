//! Local file backend.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{BackendError, StorageAdapter};
use crate::mosaic::{decode_for_path, encode_for_path, MosaicDocument};

const BACKEND: &str = "file";

/// Document stored as a (optionally gzip-compressed) JSON file.
///
/// Compression follows the `.gz` suffix of the path.
#[derive(Debug, Clone)]
pub struct FileAdapter {
    path: PathBuf,
    uri: String,
}

impl FileAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let uri = format!("file://{}", path.display());
        Self { path, uri }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn map_io(&self, err: std::io::Error) -> BackendError {
        if err.kind() == ErrorKind::NotFound {
            BackendError::not_found(BACKEND, self.location())
        } else {
            BackendError::io(BACKEND, self.location(), err)
        }
    }

    async fn store(&self, doc: &MosaicDocument) -> Result<(), BackendError> {
        let bytes = encode_for_path(doc, &self.location())?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.map_io(e))?;
        }
        tokio::fs::write(&self.path, &bytes)
            .await
            .map_err(|e| self.map_io(e))?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "Mosaic file written");
        Ok(())
    }
}

impl StorageAdapter for FileAdapter {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn uri(&self) -> &str {
        &self.uri
    }

    async fn read(&self) -> Result<MosaicDocument, BackendError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| self.map_io(e))?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "Mosaic file read");
        Ok(decode_for_path(&bytes, &self.location())?)
    }

    async fn write(&self, doc: &MosaicDocument, overwrite: bool) -> Result<(), BackendError> {
        let exists = tokio::fs::try_exists(&self.path)
            .await
            .map_err(|e| self.map_io(e))?;
        if exists && !overwrite {
            return Err(BackendError::already_exists(BACKEND, self.location()));
        }
        self.store(doc).await?;
        info!(path = %self.path.display(), quadkeys = doc.tiles().len(), "Mosaic written");
        Ok(())
    }

    async fn delete(&self) -> Result<(), BackendError> {
        tokio::fs::remove_file(&self.path)
            .await
            .map_err(|e| self.map_io(e))?;
        info!(path = %self.path.display(), "Mosaic file deleted");
        Ok(())
    }
}
