//! DynamoDB wide-column backend.
//!
//! One table per mosaic, partition key `quadkey` (string). The sentinel row
//! `quadkey = "-1"` holds the document metadata as JSON; every other row holds
//! one quadkey and its asset list.
//!
//! Writes are not atomic across rows. Rows are always written before the
//! metadata row so an interrupted write or update leaves a document that is
//! behind, never ahead.

use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use aws_sdk_dynamodb::operation::batch_get_item::BatchGetItemError;
use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::operation::delete_table::DeleteTableError;
use aws_sdk_dynamodb::operation::describe_table::DescribeTableError;
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::scan::ScanError;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, KeySchemaElement, KeyType,
    KeysAndAttributes, PutRequest, ScalarAttributeType, TableStatus, WriteRequest,
};
use aws_sdk_dynamodb::Client;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::aws::AwsSettings;
use super::{BackendError, StorageAdapter};
use crate::mosaic::{MergeOrder, MosaicDocument, MosaicDraft};

const BACKEND: &str = "dynamodb";

/// Partition key attribute.
pub const QUADKEY_ATTR: &str = "quadkey";
/// Asset list attribute.
pub const ASSETS_ATTR: &str = "assets";
/// Metadata JSON attribute on the sentinel row.
pub const METADATA_ATTR: &str = "metadata";
/// Quadkey of the metadata row.
pub const METADATA_KEY: &str = "-1";

/// Maximum items per `BatchWriteItem` call.
pub const BATCH_SIZE: usize = 25;

/// Maximum keys per `BatchGetItem` call.
pub const BATCH_GET_SIZE: usize = 100;

const MAX_BATCH_RETRIES: u32 = 8;
const TABLE_POLL_INTERVAL: Duration = Duration::from_millis(500);
const TABLE_POLL_ATTEMPTS: u32 = 120;

/// Mosaic stored in a DynamoDB table.
#[derive(Debug, Clone)]
pub struct DynamoDbAdapter {
    client: Client,
    table: String,
    uri: String,
}

impl DynamoDbAdapter {
    /// Builds a client; a region from the URI takes precedence over settings.
    pub async fn connect(
        region: Option<&str>,
        table: impl Into<String>,
        settings: &AwsSettings,
    ) -> Self {
        let mut settings = settings.clone();
        if let Some(region) = region {
            settings.region = Some(region.to_string());
        }
        let sdk_config = settings.load().await;
        let mut builder = aws_sdk_dynamodb::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        if let Some(timeout) = settings.timeout_config() {
            builder = builder.timeout_config(timeout);
        }
        let client = Client::from_conf(builder.build());

        let table = table.into();
        let uri = format!(
            "dynamodb://{}/{}",
            settings.region.as_deref().unwrap_or_default(),
            table
        );
        Self { client, table, uri }
    }

    pub fn from_client(client: Client, table: impl Into<String>) -> Self {
        let table = table.into();
        let uri = format!("dynamodb:///{}", table);
        Self { client, table, uri }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn sdk_error<E>(&self, err: SdkError<E>) -> BackendError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        match &err {
            SdkError::ServiceError(service_err) => BackendError::from_status(
                BACKEND,
                &self.table,
                service_err.raw().status().as_u16(),
                DisplayErrorContext(&err),
            ),
            _ => BackendError::upstream(BACKEND, None, DisplayErrorContext(&err)),
        }
    }

    async fn table_status(&self) -> Result<Option<TableStatus>, BackendError> {
        match self
            .client
            .describe_table()
            .table_name(&self.table)
            .send()
            .await
        {
            Ok(out) => Ok(out.table().and_then(|t| t.table_status()).cloned()),
            Err(SdkError::ServiceError(e))
                if matches!(e.err(), DescribeTableError::ResourceNotFoundException(_)) =>
            {
                Ok(None)
            }
            Err(e) => Err(self.sdk_error(e)),
        }
    }

    async fn wait_for_table(&self, want_present: bool) -> Result<(), BackendError> {
        for _ in 0..TABLE_POLL_ATTEMPTS {
            let status = self.table_status().await?;
            let done = match (&status, want_present) {
                (Some(TableStatus::Active), true) => true,
                (None, false) => true,
                _ => false,
            };
            if done {
                return Ok(());
            }
            tokio::time::sleep(TABLE_POLL_INTERVAL).await;
        }
        Err(BackendError::upstream(
            BACKEND,
            None,
            format!("timed out waiting for table {}", self.table),
        ))
    }

    async fn create_table(&self) -> Result<(), BackendError> {
        let attribute = AttributeDefinition::builder()
            .attribute_name(QUADKEY_ATTR)
            .attribute_type(ScalarAttributeType::S)
            .build()
            .map_err(|e| BackendError::upstream(BACKEND, None, e))?;
        let key = KeySchemaElement::builder()
            .attribute_name(QUADKEY_ATTR)
            .key_type(KeyType::Hash)
            .build()
            .map_err(|e| BackendError::upstream(BACKEND, None, e))?;

        match self
            .client
            .create_table()
            .table_name(&self.table)
            .attribute_definitions(attribute)
            .key_schema(key)
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
        {
            Ok(_) => info!(table = %self.table, "Table created"),
            // Lost a creation race; the table is there either way.
            Err(SdkError::ServiceError(e))
                if matches!(e.err(), CreateTableError::ResourceInUseException(_)) =>
            {
                debug!(table = %self.table, "Table already exists");
            }
            Err(e) => return Err(self.sdk_error(e)),
        }
        self.wait_for_table(true).await
    }

    async fn get_row(&self, quadkey: &str) -> Result<Option<HashMap<String, AttributeValue>>, BackendError> {
        match self
            .client
            .get_item()
            .table_name(&self.table)
            .key(QUADKEY_ATTR, AttributeValue::S(quadkey.to_string()))
            .consistent_read(true)
            .send()
            .await
        {
            Ok(out) => Ok(out.item().cloned()),
            Err(SdkError::ServiceError(e))
                if matches!(e.err(), GetItemError::ResourceNotFoundException(_)) =>
            {
                Err(BackendError::not_found(BACKEND, &self.table))
            }
            Err(e) => Err(self.sdk_error(e)),
        }
    }

    /// Reads the rows of `quadkeys` in chunks of [`BATCH_GET_SIZE`],
    /// retrying unprocessed keys. Missing rows are absent from the result.
    async fn read_rows(&self, quadkeys: &[String]) -> Result<HashMap<String, Vec<String>>, BackendError> {
        let mut rows = HashMap::with_capacity(quadkeys.len());
        for chunk in quadkeys.chunks(BATCH_GET_SIZE) {
            let keys = chunk
                .iter()
                .map(|quadkey| {
                    HashMap::from([(
                        QUADKEY_ATTR.to_string(),
                        AttributeValue::S(quadkey.clone()),
                    )])
                })
                .collect();
            let request = KeysAndAttributes::builder()
                .set_keys(Some(keys))
                .consistent_read(true)
                .build()
                .map_err(|e| BackendError::upstream(BACKEND, None, e))?;

            let mut pending = Some(request);
            let mut attempt = 0;
            while let Some(request) = pending.take() {
                let out = self
                    .client
                    .batch_get_item()
                    .request_items(&self.table, request)
                    .send()
                    .await
                    .map_err(|e| {
                        let missing = matches!(
                            &e,
                            SdkError::ServiceError(s)
                                if matches!(s.err(), BatchGetItemError::ResourceNotFoundException(_))
                        );
                        if missing {
                            BackendError::not_found(BACKEND, &self.table)
                        } else {
                            self.sdk_error(e)
                        }
                    })?;

                let items = out.responses().and_then(|r| r.get(&self.table));
                for item in items.into_iter().flatten() {
                    if let Some(quadkey) = item.get(QUADKEY_ATTR).and_then(|v| v.as_s().ok()) {
                        rows.insert(quadkey.clone(), assets_of(item));
                    }
                }

                pending = out
                    .unprocessed_keys()
                    .and_then(|m| m.get(&self.table))
                    .filter(|k| !k.keys().is_empty())
                    .cloned();
                if let Some(left) = &pending {
                    attempt += 1;
                    if attempt > MAX_BATCH_RETRIES {
                        return Err(BackendError::upstream(
                            BACKEND,
                            None,
                            format!("{} keys left unprocessed after retries", left.keys().len()),
                        ));
                    }
                    warn!(table = %self.table, unprocessed = left.keys().len(), attempt, "Retrying unprocessed keys");
                    tokio::time::sleep(Duration::from_millis(50 << attempt)).await;
                }
            }
        }
        debug!(table = %self.table, requested = quadkeys.len(), found = rows.len(), "Rows read");
        Ok(rows)
    }

    /// Writes items in chunks of [`BATCH_SIZE`], retrying unprocessed ones.
    async fn batch_put(&self, items: Vec<HashMap<String, AttributeValue>>) -> Result<(), BackendError> {
        let total = items.len();
        let mut requests = Vec::with_capacity(total);
        for item in items {
            let put = PutRequest::builder()
                .set_item(Some(item))
                .build()
                .map_err(|e| BackendError::upstream(BACKEND, None, e))?;
            requests.push(WriteRequest::builder().put_request(put).build());
        }

        for chunk in requests.chunks(BATCH_SIZE) {
            let mut pending = chunk.to_vec();
            let mut attempt = 0;
            while !pending.is_empty() {
                let out = self
                    .client
                    .batch_write_item()
                    .request_items(&self.table, pending)
                    .send()
                    .await
                    .map_err(|e| self.sdk_error(e))?;
                pending = out
                    .unprocessed_items()
                    .and_then(|m| m.get(&self.table))
                    .cloned()
                    .unwrap_or_default();

                if !pending.is_empty() {
                    attempt += 1;
                    if attempt > MAX_BATCH_RETRIES {
                        return Err(BackendError::upstream(
                            BACKEND,
                            None,
                            format!("{} items left unprocessed after retries", pending.len()),
                        ));
                    }
                    warn!(table = %self.table, unprocessed = pending.len(), attempt, "Retrying unprocessed items");
                    tokio::time::sleep(Duration::from_millis(50 << attempt)).await;
                }
            }
        }
        debug!(table = %self.table, items = total, "Rows written");
        Ok(())
    }

    async fn put_metadata(&self, doc: &MosaicDocument) -> Result<(), BackendError> {
        let json = serde_json::to_string(&doc.metadata())
            .map_err(|e| BackendError::serialization(BACKEND, &self.table, e))?;
        self.client
            .put_item()
            .table_name(&self.table)
            .item(QUADKEY_ATTR, AttributeValue::S(METADATA_KEY.to_string()))
            .item(METADATA_ATTR, AttributeValue::S(json))
            .send()
            .await
            .map_err(|e| self.sdk_error(e))?;
        Ok(())
    }

    async fn put_rows(&self, rows: &BTreeMap<String, Vec<String>>) -> Result<(), BackendError> {
        let items = rows
            .iter()
            .map(|(quadkey, assets)| row_item(quadkey, assets))
            .collect();
        self.batch_put(items).await
    }
}

fn row_item(quadkey: &str, assets: &[String]) -> HashMap<String, AttributeValue> {
    HashMap::from([
        (QUADKEY_ATTR.to_string(), AttributeValue::S(quadkey.to_string())),
        (
            ASSETS_ATTR.to_string(),
            AttributeValue::L(assets.iter().cloned().map(AttributeValue::S).collect()),
        ),
    ])
}

fn assets_of(item: &HashMap<String, AttributeValue>) -> Vec<String> {
    item.get(ASSETS_ATTR)
        .and_then(|v| v.as_l().ok())
        .map(|list| {
            list.iter()
                .filter_map(|v| v.as_s().ok().cloned())
                .collect()
        })
        .unwrap_or_default()
}

impl StorageAdapter for DynamoDbAdapter {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn uri(&self) -> &str {
        &self.uri
    }

    fn stores_rows(&self) -> bool {
        true
    }

    async fn read(&self) -> Result<MosaicDocument, BackendError> {
        let item = self
            .get_row(METADATA_KEY)
            .await?
            .ok_or_else(|| BackendError::not_found(BACKEND, &self.table))?;
        let json = item
            .get(METADATA_ATTR)
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| {
                BackendError::serialization(BACKEND, &self.table, "metadata row has no metadata")
            })?;
        let draft: MosaicDraft = serde_json::from_str(json)
            .map_err(|e| BackendError::serialization(BACKEND, &self.table, e))?;
        Ok(MosaicDocument::try_from(draft)?)
    }

    async fn write(&self, doc: &MosaicDocument, overwrite: bool) -> Result<(), BackendError> {
        if self.table_status().await?.is_some() {
            if !overwrite {
                return Err(BackendError::already_exists(BACKEND, &self.table));
            }
            self.delete().await?;
        }
        self.create_table().await?;
        self.put_rows(doc.tiles()).await?;
        self.put_metadata(doc).await?;
        info!(table = %self.table, quadkeys = doc.tiles().len(), "Mosaic written");
        Ok(())
    }

    /// Merges against the stored metadata row rather than the handle's copy,
    /// so the version bump builds on the latest write. Rows are still written
    /// before the metadata row; concurrent updaters are not serialized.
    async fn apply_update(
        &self,
        _current: &MosaicDocument,
        delta: &MosaicDocument,
        order: MergeOrder,
    ) -> Result<(MosaicDocument, usize), BackendError> {
        let stored = self.read().await?;
        let quadkeys: Vec<String> = delta.quadkeys().map(str::to_string).collect();
        let mut draft = stored.metadata();
        draft.tiles.extend(self.read_rows(&quadkeys).await?);
        let mut merged = MosaicDocument::try_from(draft)?;
        let changed = merged.merge(delta, order)?;

        self.put_rows(&changed).await?;
        self.put_metadata(&merged).await?;
        info!(table = %self.table, quadkeys = changed.len(), version = %merged.version(), "Mosaic updated");
        Ok((merged, changed.len()))
    }

    async fn get_assets(
        &self,
        _doc: &MosaicDocument,
        quadkeys: &[String],
    ) -> Result<Vec<String>, BackendError> {
        let mut rows = self.read_rows(quadkeys).await?;
        Ok(quadkeys
            .iter()
            .filter_map(|quadkey| rows.remove(quadkey))
            .flatten()
            .collect())
    }

    async fn list_quadkeys(&self, _doc: &MosaicDocument) -> Result<Vec<String>, BackendError> {
        let mut quadkeys = Vec::new();
        let mut start_key = None;
        loop {
            let out = self
                .client
                .scan()
                .table_name(&self.table)
                .projection_expression(QUADKEY_ATTR)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| {
                    let missing = matches!(
                        &e,
                        SdkError::ServiceError(s)
                            if matches!(s.err(), ScanError::ResourceNotFoundException(_))
                    );
                    if missing {
                        BackendError::not_found(BACKEND, &self.table)
                    } else {
                        self.sdk_error(e)
                    }
                })?;

            quadkeys.extend(
                out.items()
                    .iter()
                    .filter_map(|item| item.get(QUADKEY_ATTR)?.as_s().ok().cloned())
                    .filter(|k| k != METADATA_KEY),
            );
            match out.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }
        quadkeys.sort();
        Ok(quadkeys)
    }

    async fn delete(&self) -> Result<(), BackendError> {
        match self
            .client
            .delete_table()
            .table_name(&self.table)
            .send()
            .await
        {
            Ok(_) => {}
            Err(SdkError::ServiceError(e))
                if matches!(e.err(), DeleteTableError::ResourceNotFoundException(_)) =>
            {
                return Err(BackendError::not_found(BACKEND, &self.table));
            }
            Err(e) => return Err(self.sdk_error(e)),
        }
        self.wait_for_table(false).await?;
        info!(table = %self.table, "Table deleted");
        Ok(())
    }
}

/// Splits `dynamodb://region/table` (region may be empty) into its parts.
pub fn parse_dynamodb_uri(uri: &str) -> Option<(Option<String>, String)> {
    let rest = uri.strip_prefix("dynamodb://")?;
    let (region, table) = rest.split_once('/')?;
    if table.is_empty() || table.contains('/') {
        return None;
    }
    let region = (!region.is_empty()).then(|| region.to_string());
    Some((region, table.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodb::operation::batch_get_item::BatchGetItemOutput;
    use aws_sdk_dynamodb::operation::batch_write_item::{BatchWriteItemInput, BatchWriteItemOutput};
    use aws_sdk_dynamodb::operation::create_table::CreateTableOutput;
    use aws_sdk_dynamodb::operation::delete_table::DeleteTableOutput;
    use aws_sdk_dynamodb::operation::describe_table::DescribeTableOutput;
    use aws_sdk_dynamodb::operation::get_item::{GetItemInput, GetItemOutput};
    use aws_sdk_dynamodb::operation::put_item::{PutItemInput, PutItemOutput};
    use aws_sdk_dynamodb::types::error::ResourceNotFoundException;
    use aws_sdk_dynamodb::types::TableDescription;
    use aws_smithy_mocks::{mock, mock_client, RuleMode};

    const TABLE: &str = "mosaics";

    fn doc(tiles: &[(&str, &[&str])]) -> MosaicDocument {
        let mut draft = MosaicDraft::default();
        draft.minzoom = 3;
        draft.maxzoom = 5;
        draft.name = Some("dyn".to_string());
        for (qk, assets) in tiles {
            draft
                .tiles
                .insert(qk.to_string(), assets.iter().map(|a| a.to_string()).collect());
        }
        MosaicDocument::try_from(draft).unwrap()
    }

    /// Document with `n` single-asset rows at zoom 3.
    fn doc_with_rows(n: usize) -> MosaicDocument {
        let mut draft = doc(&[]).metadata();
        for i in 0..n {
            let quadkey = format!("{}{}{}", i / 16, (i / 4) % 4, i % 4);
            draft.tiles.insert(quadkey, vec![format!("{}.tif", i)]);
        }
        MosaicDocument::try_from(draft).unwrap()
    }

    fn missing_table() -> ResourceNotFoundException {
        ResourceNotFoundException::builder()
            .message("Requested resource not found")
            .build()
    }

    fn active_table() -> DescribeTableOutput {
        DescribeTableOutput::builder()
            .table(
                TableDescription::builder()
                    .table_name(TABLE)
                    .table_status(TableStatus::Active)
                    .build(),
            )
            .build()
    }

    fn metadata_item(doc: &MosaicDocument) -> HashMap<String, AttributeValue> {
        HashMap::from([
            (QUADKEY_ATTR.to_string(), AttributeValue::S(METADATA_KEY.to_string())),
            (
                METADATA_ATTR.to_string(),
                AttributeValue::S(serde_json::to_string(&doc.metadata()).unwrap()),
            ),
        ])
    }

    fn batch_len(req: &BatchWriteItemInput) -> usize {
        req.request_items()
            .and_then(|m| m.get(TABLE))
            .map_or(0, Vec::len)
    }

    fn asks_for_metadata(req: &GetItemInput) -> bool {
        req.key()
            .and_then(|k| k.get(QUADKEY_ATTR))
            .and_then(|v| v.as_s().ok())
            .is_some_and(|k| k == METADATA_KEY)
    }

    fn stored_metadata(req: &PutItemInput) -> Option<&str> {
        let item = req.item()?;
        if item.get(QUADKEY_ATTR)?.as_s().ok()? != METADATA_KEY {
            return None;
        }
        item.get(METADATA_ATTR)?.as_s().ok().map(String::as_str)
    }

    #[test]
    fn test_parse_dynamodb_uri() {
        assert_eq!(
            parse_dynamodb_uri("dynamodb://us-west-2/mosaics"),
            Some((Some("us-west-2".to_string()), "mosaics".to_string()))
        );
        assert_eq!(
            parse_dynamodb_uri("dynamodb:///mosaics"),
            Some((None, "mosaics".to_string()))
        );
        assert_eq!(parse_dynamodb_uri("dynamodb://us-west-2"), None);
        assert_eq!(parse_dynamodb_uri("dynamodb://us-west-2/"), None);
    }

    #[test]
    fn test_row_item_roundtrip() {
        let assets = vec!["a.tif".to_string(), "b.tif".to_string()];
        let item = row_item("0123", &assets);
        assert_eq!(item[QUADKEY_ATTR].as_s().unwrap(), "0123");
        assert_eq!(assets_of(&item), assets);
    }

    #[tokio::test]
    async fn test_write_creates_table_then_rows_then_metadata() {
        let describe_missing = mock!(Client::describe_table).then_error(|| {
            DescribeTableError::ResourceNotFoundException(missing_table())
        });
        let create = mock!(Client::create_table)
            .match_requests(|req| req.table_name() == Some(TABLE))
            .then_output(|| CreateTableOutput::builder().build());
        let describe_active = mock!(Client::describe_table).then_output(active_table);
        let full_batch = mock!(Client::batch_write_item)
            .match_requests(|req| batch_len(req) == BATCH_SIZE)
            .then_output(|| BatchWriteItemOutput::builder().build());
        let last_batch = mock!(Client::batch_write_item)
            .match_requests(|req| batch_len(req) == 5)
            .then_output(|| BatchWriteItemOutput::builder().build());
        let metadata = mock!(Client::put_item)
            .match_requests(|req| stored_metadata(req).is_some())
            .then_output(|| PutItemOutput::builder().build());
        let client = mock_client!(
            aws_sdk_dynamodb,
            RuleMode::Sequential,
            [&describe_missing, &create, &describe_active, &full_batch, &last_batch, &metadata]
        );

        let adapter = DynamoDbAdapter::from_client(client, TABLE);
        adapter.write(&doc_with_rows(30), false).await.unwrap();

        assert_eq!(create.num_calls(), 1);
        assert_eq!(full_batch.num_calls(), 1);
        assert_eq!(last_batch.num_calls(), 1);
        assert_eq!(metadata.num_calls(), 1);
    }

    #[tokio::test]
    async fn test_write_without_overwrite_rejects_existing_table() {
        let describe_active = mock!(Client::describe_table).then_output(active_table);
        let client = mock_client!(aws_sdk_dynamodb, RuleMode::Sequential, [&describe_active]);

        let adapter = DynamoDbAdapter::from_client(client, TABLE);
        let err = adapter.write(&doc_with_rows(2), false).await.unwrap_err();
        assert!(matches!(err, BackendError::AlreadyExists { .. }));
        assert_eq!(describe_active.num_calls(), 1);
    }

    #[tokio::test]
    async fn test_unprocessed_rows_are_retried() {
        let describe_missing = mock!(Client::describe_table).then_error(|| {
            DescribeTableError::ResourceNotFoundException(missing_table())
        });
        let create = mock!(Client::create_table).then_output(|| CreateTableOutput::builder().build());
        let describe_active = mock!(Client::describe_table).then_output(active_table);
        let partial = mock!(Client::batch_write_item)
            .match_requests(|req| batch_len(req) == 3)
            .then_output(|| {
                let leftover = PutRequest::builder()
                    .set_item(Some(row_item("002", &["2.tif".to_string()])))
                    .build()
                    .unwrap();
                BatchWriteItemOutput::builder()
                    .unprocessed_items(
                        TABLE,
                        vec![WriteRequest::builder().put_request(leftover).build()],
                    )
                    .build()
            });
        let retry = mock!(Client::batch_write_item)
            .match_requests(|req| batch_len(req) == 1)
            .then_output(|| BatchWriteItemOutput::builder().build());
        let metadata = mock!(Client::put_item).then_output(|| PutItemOutput::builder().build());
        let client = mock_client!(
            aws_sdk_dynamodb,
            RuleMode::Sequential,
            [&describe_missing, &create, &describe_active, &partial, &retry, &metadata]
        );

        let adapter = DynamoDbAdapter::from_client(client, TABLE);
        adapter.write(&doc_with_rows(3), false).await.unwrap();
        assert_eq!(partial.num_calls(), 1);
        assert_eq!(retry.num_calls(), 1);
    }

    #[tokio::test]
    async fn test_read_metadata_row_and_batch_assets() {
        let stored = doc(&[]);
        let get_metadata = mock!(Client::get_item)
            .match_requests(asks_for_metadata)
            .then_output(move || {
                GetItemOutput::builder()
                    .set_item(Some(metadata_item(&stored)))
                    .build()
            });
        let batch_get = mock!(Client::batch_get_item)
            .match_requests(|req| {
                req.request_items()
                    .and_then(|m| m.get(TABLE))
                    .is_some_and(|k| k.keys().len() == 3 && k.consistent_read() == Some(true))
            })
            .then_output(|| {
                // Rows come back out of request order; 002 has no row.
                BatchGetItemOutput::builder()
                    .responses(
                        TABLE,
                        vec![
                            row_item("000", &["a.tif".to_string()]),
                            row_item("001", &["b.tif".to_string()]),
                        ],
                    )
                    .build()
            });
        let client = mock_client!(aws_sdk_dynamodb, RuleMode::Sequential, [&get_metadata, &batch_get]);

        let adapter = DynamoDbAdapter::from_client(client, TABLE);
        let read = adapter.read().await.unwrap();
        assert_eq!(read.name(), Some("dyn"));
        assert_eq!(read.minzoom(), 3);
        assert!(read.tiles().is_empty());

        let quadkeys = ["001", "002", "000"].map(String::from);
        assert_eq!(
            adapter.get_assets(&read, &quadkeys).await.unwrap(),
            vec!["b.tif", "a.tif"]
        );
        assert_eq!(batch_get.num_calls(), 1);
    }

    #[tokio::test]
    async fn test_read_missing_table_is_not_found() {
        let get_missing = mock!(Client::get_item)
            .then_error(|| GetItemError::ResourceNotFoundException(missing_table()));
        let client = mock_client!(aws_sdk_dynamodb, RuleMode::Sequential, [&get_missing]);

        let adapter = DynamoDbAdapter::from_client(client, TABLE);
        assert!(adapter.read().await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_update_merges_against_stored_rows() {
        let stored = doc(&[]);
        let get_metadata = mock!(Client::get_item)
            .match_requests(asks_for_metadata)
            .then_output(move || {
                GetItemOutput::builder()
                    .set_item(Some(metadata_item(&stored)))
                    .build()
            });
        let batch_get = mock!(Client::batch_get_item).then_output(|| {
            BatchGetItemOutput::builder()
                .responses(TABLE, vec![row_item("000", &["a.tif".to_string()])])
                .build()
        });
        let batch_write = mock!(Client::batch_write_item)
            .match_requests(|req| {
                let merged = req
                    .request_items()
                    .and_then(|m| m.get(TABLE))
                    .and_then(|r| r.first())
                    .and_then(|w| w.put_request())
                    .map(|p| assets_of(p.item()));
                batch_len(req) == 1 && merged == Some(vec!["a.tif".to_string(), "n.tif".to_string()])
            })
            .then_output(|| BatchWriteItemOutput::builder().build());
        let metadata = mock!(Client::put_item)
            .match_requests(|req| {
                stored_metadata(req).is_some_and(|json| json.contains(r#""version":"1.0.1""#))
            })
            .then_output(|| PutItemOutput::builder().build());
        let client = mock_client!(
            aws_sdk_dynamodb,
            RuleMode::Sequential,
            [&get_metadata, &batch_get, &batch_write, &metadata]
        );

        let adapter = DynamoDbAdapter::from_client(client, TABLE);
        let stale = doc(&[]);
        let (merged, changed) = adapter
            .apply_update(&stale, &doc(&[("000", &["n.tif"])]), MergeOrder::Append)
            .await
            .unwrap();
        assert_eq!(changed, 1);
        assert_eq!(merged.version(), "1.0.1");
        assert_eq!(metadata.num_calls(), 1);
    }

    #[tokio::test]
    async fn test_delete_waits_for_table_removal() {
        let delete = mock!(Client::delete_table).then_output(|| DeleteTableOutput::builder().build());
        let gone = mock!(Client::describe_table).then_error(|| {
            DescribeTableError::ResourceNotFoundException(missing_table())
        });
        let client = mock_client!(aws_sdk_dynamodb, RuleMode::Sequential, [&delete, &gone]);

        let adapter = DynamoDbAdapter::from_client(client, TABLE);
        adapter.delete().await.unwrap();
        assert_eq!(gone.num_calls(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_table_is_not_found() {
        let delete = mock!(Client::delete_table)
            .then_error(|| DeleteTableError::ResourceNotFoundException(missing_table()));
        let client = mock_client!(aws_sdk_dynamodb, RuleMode::Sequential, [&delete]);

        let adapter = DynamoDbAdapter::from_client(client, TABLE);
        assert!(adapter.delete().await.unwrap_err().is_not_found());
    }
}
