//! S3 object-store backend.

use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use super::aws::AwsSettings;
use super::{BackendError, StorageAdapter};
use crate::mosaic::{decode_for_path, encode_for_path, MosaicDocument};

const BACKEND: &str = "s3";

/// Document stored as a single object; updates rewrite the whole object.
#[derive(Debug, Clone)]
pub struct S3Adapter {
    client: Client,
    bucket: String,
    key: String,
    uri: String,
}

impl S3Adapter {
    /// Builds a client from the default AWS chain plus `settings`.
    pub async fn connect(
        bucket: impl Into<String>,
        key: impl Into<String>,
        settings: &AwsSettings,
    ) -> Self {
        let sdk_config = settings.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        if let Some(timeout) = settings.timeout_config() {
            builder = builder.timeout_config(timeout);
        }
        Self::from_client(Client::from_conf(builder.build()), bucket, key)
    }

    /// Uses a pre-built client.
    pub fn from_client(client: Client, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        let bucket = bucket.into();
        let key = key.into();
        let uri = format!("s3://{}/{}", bucket, key);
        Self {
            client,
            bucket,
            key,
            uri,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    async fn exists(&self) -> Result<bool, BackendError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(e)) if e.raw().status().as_u16() == 404 => Ok(false),
            Err(e) => Err(map_s3_error(e, &self.uri)),
        }
    }

    async fn put(&self, doc: &MosaicDocument) -> Result<(), BackendError> {
        let body = encode_for_path(doc, &self.key)?;
        let bytes = body.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| map_s3_error(e, &self.uri))?;
        debug!(uri = %self.uri, bytes, "Mosaic object written");
        Ok(())
    }
}

impl StorageAdapter for S3Adapter {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn uri(&self) -> &str {
        &self.uri
    }

    async fn read(&self) -> Result<MosaicDocument, BackendError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .map_err(|e| map_s3_error(e, &self.uri))?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| BackendError::io(BACKEND, &self.uri, e))?
            .into_bytes();
        debug!(uri = %self.uri, bytes = bytes.len(), "Mosaic object read");
        Ok(decode_for_path(&bytes, &self.key)?)
    }

    async fn write(&self, doc: &MosaicDocument, overwrite: bool) -> Result<(), BackendError> {
        if !overwrite && self.exists().await? {
            return Err(BackendError::already_exists(BACKEND, &self.uri));
        }
        self.put(doc).await?;
        info!(uri = %self.uri, quadkeys = doc.tiles().len(), "Mosaic written");
        Ok(())
    }

    async fn delete(&self) -> Result<(), BackendError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .map_err(|e| map_s3_error(e, &self.uri))?;
        info!(uri = %self.uri, "Mosaic object deleted");
        Ok(())
    }
}

fn map_s3_error<E>(err: SdkError<E>, uri: &str) -> BackendError
where
    E: std::error::Error + Send + Sync + 'static,
{
    match &err {
        SdkError::ServiceError(service_err) => {
            let status = service_err.raw().status().as_u16();
            BackendError::from_status(BACKEND, uri, status, DisplayErrorContext(&err))
        }
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            BackendError::upstream(BACKEND, None, DisplayErrorContext(&err))
        }
        _ => BackendError::upstream(BACKEND, None, DisplayErrorContext(&err)),
    }
}

/// Splits `s3://bucket/key` into its parts.
pub fn parse_s3_uri(uri: &str) -> Option<(String, String)> {
    let rest = uri.strip_prefix("s3://")?;
    let (bucket, key) = rest.split_once('/')?;
    if bucket.is_empty() || key.is_empty() {
        return None;
    }
    Some((bucket.to_string(), key.to_string()))
}
