//! Read-only HTTP(S)/FTP backend.

use tracing::debug;

use super::{BackendError, StorageAdapter};
use crate::http::AsyncHttpClient;
use crate::mosaic::{decode_for_path, MosaicDocument};

const BACKEND: &str = "http";

/// Fetches a document with a GET request.
///
/// Compression follows the `.gz` suffix of the URL path.
pub struct HttpAdapter<C: AsyncHttpClient> {
    client: C,
    url: String,
}

impl<C: AsyncHttpClient> HttpAdapter<C> {
    pub fn new(client: C, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    fn url_path(&self) -> &str {
        self.url.split(['?', '#']).next().unwrap_or(&self.url)
    }
}

impl<C: AsyncHttpClient> StorageAdapter for HttpAdapter<C> {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn uri(&self) -> &str {
        &self.url
    }

    fn read_only(&self) -> bool {
        true
    }

    async fn read(&self) -> Result<MosaicDocument, BackendError> {
        let bytes = self
            .client
            .get(&self.url)
            .await
            .map_err(|e| BackendError::from_http(BACKEND, &self.url, e))?;
        debug!(url = %self.url, bytes = bytes.len(), "Mosaic fetched");
        Ok(decode_for_path(&bytes, self.url_path())?)
    }

    async fn write(&self, _doc: &MosaicDocument, _overwrite: bool) -> Result<(), BackendError> {
        Err(BackendError::unsupported(BACKEND, "write"))
    }

    async fn delete(&self) -> Result<(), BackendError> {
        Err(BackendError::unsupported(BACKEND, "delete"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::MockAsyncHttpClient;
    use crate::http::HttpError;
    use crate::mosaic::{encode_document, MosaicDraft};

    fn doc() -> MosaicDocument {
        let mut draft = MosaicDraft::default();
        draft.minzoom = 1;
        draft.maxzoom = 2;
        draft.tiles.insert("3".to_string(), vec!["x".to_string()]);
        MosaicDocument::try_from(draft).unwrap()
    }

    #[tokio::test]
    async fn test_reads_gzip_by_url_suffix() {
        let client = MockAsyncHttpClient {
            response: Ok(encode_document(&doc(), true).unwrap()),
        };
        let adapter = HttpAdapter::new(client, "https://host/m.json.gz?sig=abc");
        assert_eq!(adapter.read().await.unwrap(), doc());
    }

    #[tokio::test]
    async fn test_status_is_mapped() {
        let client = MockAsyncHttpClient {
            response: Err(HttpError::Status {
                status: 403,
                url: "https://host/m.json".to_string(),
            }),
        };
        let adapter = HttpAdapter::new(client, "https://host/m.json");
        assert!(matches!(
            adapter.read().await,
            Err(BackendError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn test_write_is_unsupported() {
        let client = MockAsyncHttpClient { response: Ok(vec![]) };
        let adapter = HttpAdapter::new(client, "https://host/m.json");
        assert!(matches!(
            adapter.write(&doc(), true).await,
            Err(BackendError::Unsupported { .. })
        ));
    }
}
