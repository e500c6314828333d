//! In-memory backend.

use parking_lot::RwLock;
use std::sync::Arc;

use super::{BackendError, StorageAdapter};
use crate::mosaic::MosaicDocument;

const BACKEND: &str = "memory";

/// Holds a document reference instead of persisting it.
///
/// There is nothing to read from; handles are created from an existing
/// document and `write` simply stores it.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    stored: RwLock<Option<Arc<MosaicDocument>>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last document written, if any.
    pub fn stored(&self) -> Option<Arc<MosaicDocument>> {
        self.stored.read().clone()
    }
}

impl StorageAdapter for MemoryAdapter {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn uri(&self) -> &str {
        "memory://"
    }

    fn cacheable(&self) -> bool {
        false
    }

    async fn read(&self) -> Result<MosaicDocument, BackendError> {
        Err(BackendError::unsupported(BACKEND, "read"))
    }

    async fn write(&self, doc: &MosaicDocument, overwrite: bool) -> Result<(), BackendError> {
        let mut stored = self.stored.write();
        if stored.is_some() && !overwrite {
            return Err(BackendError::already_exists(BACKEND, "memory://"));
        }
        *stored = Some(Arc::new(doc.clone()));
        Ok(())
    }

    async fn delete(&self) -> Result<(), BackendError> {
        match self.stored.write().take() {
            Some(_) => Ok(()),
            None => Err(BackendError::not_found(BACKEND, "memory://")),
        }
    }
}
