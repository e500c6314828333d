//! Backend error taxonomy.

use thiserror::Error;

use crate::builder::BuildError;
use crate::coord::CoordError;
use crate::http::HttpError;
use crate::mosaic::DocumentError;
use crate::search::SearchError;

/// Errors surfaced by backend handles.
///
/// Every storage-level variant carries the backend name and the key, path or
/// table it concerns.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    /// Document, object or table does not exist
    #[error("{backend}: {location} not found")]
    NotFound {
        backend: &'static str,
        location: String,
    },

    /// Write without overwrite on a target that already holds content
    #[error("{backend}: {location} already exists (use overwrite)")]
    AlreadyExists {
        backend: &'static str,
        location: String,
    },

    /// Query resolved to an empty asset list
    #[error("No assets found for {query}")]
    NoAssetsFound { query: String },

    /// Footprints declare irreconcilable data types
    #[error("Assets have multiple data types: {}", .0.join(", "))]
    MultipleDataType(Vec<String>),

    /// Remote pagination broke its own invariants
    #[error("{backend}: server reported {matched} matched items but returned {received}")]
    ProtocolViolation {
        backend: &'static str,
        matched: u64,
        received: u64,
    },

    /// Stored schema version differs from the supported one
    #[error("{backend}: {location} has schema version {found}, expected {expected}")]
    SchemaIncompatible {
        backend: &'static str,
        location: String,
        found: i64,
        expected: i64,
    },

    #[error("{backend}: unauthorized access to {location}")]
    Unauthorized {
        backend: &'static str,
        location: String,
    },

    #[error("{backend}: access to {location} forbidden")]
    Forbidden {
        backend: &'static str,
        location: String,
    },

    /// Any other failure reported by a remote service
    #[error("{backend}: upstream error{}: {message}", .status.map(|s| format!(" (status {})", s)).unwrap_or_default())]
    Upstream {
        backend: &'static str,
        status: Option<u16>,
        message: String,
    },

    /// Operation not available on this backend
    #[error("{backend}: {operation} is not supported")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    #[error("Invalid mosaic URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("{backend}: I/O error on {location}: {message}")]
    Io {
        backend: &'static str,
        location: String,
        message: String,
    },

    #[error("{backend}: cannot (de)serialize {location}: {message}")]
    Serialization {
        backend: &'static str,
        location: String,
        message: String,
    },

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Build(BuildError),

    #[error(transparent)]
    Coord(#[from] CoordError),
}

impl BackendError {
    pub fn not_found(backend: &'static str, location: impl Into<String>) -> Self {
        BackendError::NotFound {
            backend,
            location: location.into(),
        }
    }

    pub fn already_exists(backend: &'static str, location: impl Into<String>) -> Self {
        BackendError::AlreadyExists {
            backend,
            location: location.into(),
        }
    }

    pub fn unsupported(backend: &'static str, operation: &'static str) -> Self {
        BackendError::Unsupported { backend, operation }
    }

    pub fn io(backend: &'static str, location: impl Into<String>, err: impl ToString) -> Self {
        BackendError::Io {
            backend,
            location: location.into(),
            message: err.to_string(),
        }
    }

    pub fn serialization(
        backend: &'static str,
        location: impl Into<String>,
        err: impl ToString,
    ) -> Self {
        BackendError::Serialization {
            backend,
            location: location.into(),
            message: err.to_string(),
        }
    }

    pub fn upstream(backend: &'static str, status: Option<u16>, message: impl ToString) -> Self {
        BackendError::Upstream {
            backend,
            status,
            message: message.to_string(),
        }
    }

    /// Maps an upstream status code onto the taxonomy.
    pub fn from_status(
        backend: &'static str,
        location: impl Into<String>,
        status: u16,
        message: impl ToString,
    ) -> Self {
        let location = location.into();
        match status {
            401 => BackendError::Unauthorized { backend, location },
            403 => BackendError::Forbidden { backend, location },
            404 => BackendError::NotFound { backend, location },
            _ => BackendError::upstream(backend, Some(status), message),
        }
    }

    /// Maps an HTTP transport failure onto the taxonomy.
    pub fn from_http(backend: &'static str, location: impl Into<String>, err: HttpError) -> Self {
        match err.status() {
            Some(status) => BackendError::from_status(backend, location, status, &err),
            None => BackendError::upstream(backend, None, err),
        }
    }

    pub fn from_search(backend: &'static str, location: impl Into<String>, err: SearchError) -> Self {
        match err {
            SearchError::Http(e) => BackendError::from_http(backend, location, e),
            SearchError::ProtocolViolation { matched, received } => {
                BackendError::ProtocolViolation {
                    backend,
                    matched,
                    received,
                }
            }
            SearchError::InvalidResponse { url, reason } => {
                BackendError::serialization(backend, url, reason)
            }
            SearchError::Footprint(e) => e.into(),
        }
    }

    /// True for the "absent" family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound { .. })
    }
}

impl From<BuildError> for BackendError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::MultipleDataType(types) => BackendError::MultipleDataType(types),
            BuildError::Document(e) => BackendError::Document(e),
            other => BackendError::Build(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = |status| BackendError::from_status("http", "https://h/m.json", status, "x");
        assert!(matches!(err(401), BackendError::Unauthorized { .. }));
        assert!(matches!(err(403), BackendError::Forbidden { .. }));
        assert!(err(404).is_not_found());
        assert_eq!(
            err(500),
            BackendError::Upstream {
                backend: "http",
                status: Some(500),
                message: "x".to_string()
            }
        );
    }

    #[test]
    fn test_http_transport_failure_has_no_status() {
        let err = BackendError::from_http(
            "http",
            "https://h",
            HttpError::Request {
                url: "https://h".to_string(),
                reason: "timeout".to_string(),
            },
        );
        assert!(matches!(err, BackendError::Upstream { status: None, .. }));
    }

    #[test]
    fn test_multiple_data_type_is_lifted() {
        let err: BackendError =
            BuildError::MultipleDataType(vec!["uint8".into(), "float32".into()]).into();
        assert_eq!(
            err.to_string(),
            "Assets have multiple data types: uint8, float32"
        );
    }

    #[test]
    fn test_upstream_display() {
        let err = BackendError::upstream("s3", Some(503), "slow down");
        assert_eq!(err.to_string(), "s3: upstream error (status 503): slow down");
    }
}
