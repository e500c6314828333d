//! SQLite relational backend.
//!
//! A database holds any number of mosaics. Document-level fields live in the
//! shared `mosaicjson_metadata` table keyed by mosaic name; each mosaic gets
//! its own `(quadkey TEXT, assets JSON)` table named after it. The schema
//! generation is stored in `PRAGMA user_version`.

use parking_lot::Mutex;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};

use super::{BackendError, StorageAdapter};
use crate::coord::{BBox, TileMatrixSet};
use crate::mosaic::{Center, MergeOrder, MosaicDocument, MosaicDraft};

const BACKEND: &str = "sqlite";

/// Schema generation this build reads and writes.
pub const SCHEMA_VERSION: i64 = 1;

/// Shared table holding document-level fields.
pub const METADATA_TABLE: &str = "mosaicjson_metadata";

static MOSAIC_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("valid regex"));

/// Checks that `name` can be used as a mosaic table name.
fn validate_name(name: &str) -> Result<(), String> {
    if !MOSAIC_NAME.is_match(name) {
        return Err(format!(
            "invalid mosaic name '{}': must match [A-Za-z0-9_.-]+",
            name
        ));
    }
    if name == METADATA_TABLE {
        return Err(format!("'{}' is reserved", METADATA_TABLE));
    }
    Ok(())
}

/// Mosaic stored in a SQLite database.
///
/// Queries run on the blocking pool; the connection is shared with those
/// tasks and serialized by the mutex.
#[derive(Debug)]
pub struct SqliteAdapter {
    conn: Arc<Mutex<Option<Connection>>>,
    path: PathBuf,
    table: MosaicTable,
}

impl SqliteAdapter {
    /// Opens (or creates) the database and checks its schema version.
    pub fn open(path: impl AsRef<Path>, name: impl Into<String>) -> Result<Self, BackendError> {
        let path = path.as_ref().to_path_buf();
        let name = name.into();
        let uri = format!("sqlite:///{}:{}", path.display(), name);
        validate_name(&name).map_err(|reason| BackendError::InvalidUri {
            uri: uri.clone(),
            reason,
        })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| BackendError::io(BACKEND, &uri, e))?;
        }
        let conn = Connection::open(&path).map_err(|e| BackendError::io(BACKEND, &uri, e))?;
        init_schema(&conn, &uri)?;
        debug!(uri = %uri, "Database opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            path,
            table: MosaicTable { name, uri },
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mosaic_name(&self) -> &str {
        &self.table.name
    }

    /// Names of every mosaic stored in the database at `path`.
    pub fn list_mosaics(path: impl AsRef<Path>) -> Result<Vec<String>, BackendError> {
        let location = path.as_ref().display().to_string();
        if !path.as_ref().exists() {
            return Err(BackendError::not_found(BACKEND, location));
        }
        let conn = Connection::open(path.as_ref()).map_err(|e| db_error(&location, e))?;
        init_schema(&conn, &location)?;
        let mut stmt = conn
            .prepare(&format!("SELECT name FROM {} ORDER BY name", METADATA_TABLE))
            .map_err(|e| db_error(&location, e))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| db_error(&location, e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| db_error(&location, e))?;
        Ok(names)
    }

    /// Runs `f` against the open connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, BackendError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &MosaicTable) -> Result<T, BackendError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let table = self.table.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            let conn = guard
                .as_mut()
                .ok_or_else(|| BackendError::io(BACKEND, &table.uri, "connection closed"))?;
            f(conn, &table)
        })
        .await
        .map_err(|e| BackendError::io(BACKEND, &self.table.uri, e))?
    }
}

/// Name and URI of one mosaic's table, moved into blocking tasks.
#[derive(Debug, Clone)]
struct MosaicTable {
    name: String,
    uri: String,
}

impl MosaicTable {
    fn quoted(&self) -> String {
        format!("\"{}\"", self.name)
    }

    fn fetch_assets(
        &self,
        conn: &Connection,
        quadkeys: &[String],
    ) -> Result<Vec<(String, Vec<String>)>, BackendError> {
        let mut stmt = conn
            .prepare(&format!("SELECT assets FROM {} WHERE quadkey = ?1", self.quoted()))
            .map_err(|e| db_error(&self.uri, e))?;
        let mut rows = Vec::new();
        for quadkey in quadkeys {
            let json: Option<String> = stmt
                .query_row(params![quadkey], |row| row.get(0))
                .optional()
                .map_err(|e| db_error(&self.uri, e))?;
            if let Some(json) = json {
                let assets: Vec<String> = serde_json::from_str(&json)
                    .map_err(|e| BackendError::serialization(BACKEND, &self.uri, e))?;
                rows.push((quadkey.clone(), assets));
            }
        }
        Ok(rows)
    }

    fn exists(&self, tx: &Transaction<'_>) -> Result<bool, BackendError> {
        let count: i64 = tx
            .query_row(
                &format!("SELECT COUNT(*) FROM {} WHERE name = ?1", METADATA_TABLE),
                params![self.name],
                |row| row.get(0),
            )
            .map_err(|e| db_error(&self.uri, e))?;
        Ok(count > 0)
    }

    fn drop_mosaic(&self, tx: &Transaction<'_>) -> Result<(), BackendError> {
        tx.execute(
            &format!("DELETE FROM {} WHERE name = ?1", METADATA_TABLE),
            params![self.name],
        )
        .map_err(|e| db_error(&self.uri, e))?;
        tx.execute(&format!("DROP TABLE IF EXISTS {}", self.quoted()), [])
            .map_err(|e| db_error(&self.uri, e))?;
        Ok(())
    }

    fn upsert_metadata(&self, tx: &Transaction<'_>, doc: &MosaicDocument) -> Result<(), BackendError> {
        let bounds = serde_json::to_string(&doc.bounds())
            .map_err(|e| BackendError::serialization(BACKEND, &self.uri, e))?;
        let center = serde_json::to_string(&doc.center())
            .map_err(|e| BackendError::serialization(BACKEND, &self.uri, e))?;
        let tms = doc.metadata().tilematrixset.map(|t| t.id().to_string());

        tx.execute(
            &format!(
                "INSERT OR REPLACE INTO {} (name, mosaicjson, description, version, attribution, \
                 minzoom, maxzoom, quadkey_zoom, bounds, center, tilematrixset, asset_prefix, \
                 mosaic_name) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                METADATA_TABLE
            ),
            params![
                self.name,
                doc.spec_version(),
                doc.description(),
                doc.version(),
                doc.attribution(),
                doc.minzoom(),
                doc.maxzoom(),
                doc.quadkey_zoom(),
                bounds,
                center,
                tms,
                doc.asset_prefix(),
                doc.name(),
            ],
        )
        .map_err(|e| db_error(&self.uri, e))?;
        Ok(())
    }

    /// Inserts or replaces one row per quadkey.
    fn upsert_rows(
        &self,
        tx: &Transaction<'_>,
        rows: &BTreeMap<String, Vec<String>>,
    ) -> Result<(), BackendError> {
        let mut stmt = tx
            .prepare(&format!(
                "INSERT OR REPLACE INTO {} (quadkey, assets) VALUES (?1, ?2)",
                self.quoted()
            ))
            .map_err(|e| db_error(&self.uri, e))?;
        for (quadkey, assets) in rows {
            stmt.execute(params![quadkey, assets_json(assets, &self.uri)?])
                .map_err(|e| db_error(&self.uri, e))?;
        }
        Ok(())
    }

    fn read_metadata(&self, conn: &Connection) -> Result<MosaicDraft, BackendError> {
        let row = conn
            .query_row(
                &format!(
                    "SELECT mosaicjson, description, version, attribution, minzoom, maxzoom, \
                     quadkey_zoom, bounds, center, tilematrixset, asset_prefix, mosaic_name \
                     FROM {} WHERE name = ?1",
                    METADATA_TABLE
                ),
                params![self.name],
                |row| {
                    Ok(MetadataRow {
                        mosaicjson: row.get(0)?,
                        description: row.get(1)?,
                        version: row.get(2)?,
                        attribution: row.get(3)?,
                        minzoom: row.get(4)?,
                        maxzoom: row.get(5)?,
                        quadkey_zoom: row.get(6)?,
                        bounds: row.get(7)?,
                        center: row.get(8)?,
                        tilematrixset: row.get(9)?,
                        asset_prefix: row.get(10)?,
                        name: row.get(11)?,
                    })
                },
            )
            .optional()
            .map_err(|e| db_error(&self.uri, e))?
            .ok_or_else(|| BackendError::not_found(BACKEND, &self.uri))?;
        row.into_draft(&self.uri)
    }

    /// Reads the stored metadata and the rows `delta` touches, merges and
    /// writes back, all in one write-locked transaction.
    fn merge_update(
        &self,
        conn: &mut Connection,
        delta: &MosaicDocument,
        order: MergeOrder,
    ) -> Result<(MosaicDocument, usize), BackendError> {
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| db_error(&self.uri, e))?;

        let mut draft = self.read_metadata(&tx)?;
        let quadkeys: Vec<String> = delta.quadkeys().map(str::to_string).collect();
        draft.tiles.extend(self.fetch_assets(&tx, &quadkeys)?);
        let mut merged = MosaicDocument::try_from(draft)?;
        let changed = merged.merge(delta, order)?;

        self.upsert_rows(&tx, &changed)?;
        self.upsert_metadata(&tx, &merged)?;
        tx.commit().map_err(|e| db_error(&self.uri, e))?;
        Ok((merged, changed.len()))
    }
}

struct MetadataRow {
    mosaicjson: String,
    description: Option<String>,
    version: String,
    attribution: Option<String>,
    minzoom: u8,
    maxzoom: u8,
    quadkey_zoom: u8,
    bounds: String,
    center: String,
    tilematrixset: Option<String>,
    asset_prefix: Option<String>,
    name: Option<String>,
}

impl MetadataRow {
    fn into_draft(self, uri: &str) -> Result<MosaicDraft, BackendError> {
        let bounds: BBox = serde_json::from_str(&self.bounds)
            .map_err(|e| BackendError::serialization(BACKEND, uri, e))?;
        let center: Center = serde_json::from_str(&self.center)
            .map_err(|e| BackendError::serialization(BACKEND, uri, e))?;
        let tilematrixset = self
            .tilematrixset
            .map(|id| id.parse::<TileMatrixSet>())
            .transpose()
            .map_err(|e| BackendError::serialization(BACKEND, uri, e))?;

        Ok(MosaicDraft {
            mosaicjson: self.mosaicjson,
            name: self.name,
            description: self.description,
            version: self.version,
            attribution: self.attribution,
            minzoom: self.minzoom,
            maxzoom: self.maxzoom,
            quadkey_zoom: Some(self.quadkey_zoom),
            bounds,
            center: Some(center),
            tiles: BTreeMap::new(),
            tilematrixset,
            asset_prefix: self.asset_prefix,
        })
    }
}

fn db_error(location: &str, err: rusqlite::Error) -> BackendError {
    BackendError::io(BACKEND, location, err)
}

fn assets_json(assets: &[String], uri: &str) -> Result<String, BackendError> {
    serde_json::to_string(assets).map_err(|e| BackendError::serialization(BACKEND, uri, e))
}

/// Creates the metadata table on a fresh database, otherwise checks the
/// stored schema generation.
fn init_schema(conn: &Connection, location: &str) -> Result<(), BackendError> {
    let version: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| db_error(location, e))?;

    if version != 0 && version != SCHEMA_VERSION {
        return Err(BackendError::SchemaIncompatible {
            backend: BACKEND,
            location: location.to_string(),
            found: version,
            expected: SCHEMA_VERSION,
        });
    }

    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {} (
                name TEXT PRIMARY KEY,
                mosaicjson TEXT NOT NULL,
                description TEXT,
                version TEXT NOT NULL,
                attribution TEXT,
                minzoom INTEGER NOT NULL,
                maxzoom INTEGER NOT NULL,
                quadkey_zoom INTEGER NOT NULL,
                bounds TEXT NOT NULL,
                center TEXT NOT NULL,
                tilematrixset TEXT,
                asset_prefix TEXT,
                mosaic_name TEXT
            )",
            METADATA_TABLE
        ),
        [],
    )
    .map_err(|e| db_error(location, e))?;

    if version == 0 {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .map_err(|e| db_error(location, e))?;
    }
    Ok(())
}

impl StorageAdapter for SqliteAdapter {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn uri(&self) -> &str {
        &self.table.uri
    }

    fn stores_rows(&self) -> bool {
        true
    }

    async fn read(&self) -> Result<MosaicDocument, BackendError> {
        let draft = self
            .with_conn(|conn, table| table.read_metadata(conn))
            .await?;
        Ok(MosaicDocument::try_from(draft)?)
    }

    async fn write(&self, doc: &MosaicDocument, overwrite: bool) -> Result<(), BackendError> {
        let doc = doc.clone();
        let quadkeys = doc.tiles().len();
        self.with_conn(move |conn, table| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|e| db_error(&table.uri, e))?;
            if table.exists(&tx)? {
                if !overwrite {
                    return Err(BackendError::already_exists(BACKEND, &table.uri));
                }
                table.drop_mosaic(&tx)?;
            }

            tx.execute(
                &format!(
                    "CREATE TABLE {} (quadkey TEXT PRIMARY KEY, assets JSON NOT NULL)",
                    table.quoted()
                ),
                [],
            )
            .map_err(|e| db_error(&table.uri, e))?;
            table.upsert_rows(&tx, doc.tiles())?;
            table.upsert_metadata(&tx, &doc)?;
            tx.commit().map_err(|e| db_error(&table.uri, e))
        })
        .await?;
        info!(uri = %self.table.uri, quadkeys, "Mosaic written");
        Ok(())
    }

    async fn apply_update(
        &self,
        _current: &MosaicDocument,
        delta: &MosaicDocument,
        order: MergeOrder,
    ) -> Result<(MosaicDocument, usize), BackendError> {
        let delta = delta.clone();
        let (merged, changed) = self
            .with_conn(move |conn, table| table.merge_update(conn, &delta, order))
            .await?;
        info!(
            uri = %self.table.uri,
            quadkeys = changed,
            version = %merged.version(),
            "Mosaic rows updated"
        );
        Ok((merged, changed))
    }

    async fn get_assets(
        &self,
        _doc: &MosaicDocument,
        quadkeys: &[String],
    ) -> Result<Vec<String>, BackendError> {
        let quadkeys = quadkeys.to_vec();
        let rows = self
            .with_conn(move |conn, table| table.fetch_assets(conn, &quadkeys))
            .await?;
        Ok(rows.into_iter().flat_map(|(_, assets)| assets).collect())
    }

    async fn list_quadkeys(&self, _doc: &MosaicDocument) -> Result<Vec<String>, BackendError> {
        self.with_conn(|conn, table| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT quadkey FROM {} ORDER BY quadkey",
                    table.quoted()
                ))
                .map_err(|e| db_error(&table.uri, e))?;
            let quadkeys = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| db_error(&table.uri, e))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| db_error(&table.uri, e))?;
            Ok(quadkeys)
        })
        .await
    }

    async fn delete(&self) -> Result<(), BackendError> {
        self.with_conn(|conn, table| {
            let tx = conn.transaction().map_err(|e| db_error(&table.uri, e))?;
            if !table.exists(&tx)? {
                return Err(BackendError::not_found(BACKEND, &table.uri));
            }
            table.drop_mosaic(&tx)?;
            tx.commit().map_err(|e| db_error(&table.uri, e))
        })
        .await?;
        info!(uri = %self.table.uri, "Mosaic deleted");
        Ok(())
    }

    fn close(&mut self) -> Result<(), BackendError> {
        if let Some(conn) = self.conn.lock().take() {
            conn.close().map_err(|(_, e)| db_error(&self.table.uri, e))?;
        }
        Ok(())
    }
}

/// Splits `sqlite:///path/to/file.db:name` into database path and mosaic
/// name. The path is everything between `sqlite:///` and the last `:`, so
/// `sqlite:///mosaics.db:x` is relative and `sqlite:////data/mosaics.db:x`
/// absolute. Anything else is rejected.
pub fn parse_sqlite_uri(uri: &str) -> Result<(PathBuf, String), BackendError> {
    let invalid = |reason: String| BackendError::InvalidUri {
        uri: uri.to_string(),
        reason,
    };
    let rest = uri
        .strip_prefix("sqlite:///")
        .ok_or_else(|| invalid("expected sqlite:///path:name".to_string()))?;
    let (path, name) = rest
        .rsplit_once(':')
        .ok_or_else(|| invalid("missing ':name' suffix".to_string()))?;
    if path.is_empty() {
        return Err(invalid("empty database path".to_string()));
    }
    validate_name(name).map_err(invalid)?;
    Ok((PathBuf::from(path), name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn doc(tiles: &[(&str, &[&str])]) -> MosaicDocument {
        let mut draft = MosaicDraft::default();
        draft.minzoom = 1;
        draft.maxzoom = 3;
        draft.name = Some("test".to_string());
        for (qk, assets) in tiles {
            draft
                .tiles
                .insert(qk.to_string(), assets.iter().map(|a| a.to_string()).collect());
        }
        MosaicDocument::try_from(draft).unwrap()
    }

    #[test]
    fn test_parse_sqlite_uri() {
        let (path, name) = parse_sqlite_uri("sqlite:///mosaic.db:test").unwrap();
        assert_eq!(path, PathBuf::from("mosaic.db"));
        assert_eq!(name, "test");

        let (path, name) = parse_sqlite_uri("sqlite:////data/mosaics.db:landsat_8.v2").unwrap();
        assert_eq!(path, PathBuf::from("/data/mosaics.db"));
        assert_eq!(name, "landsat_8.v2");

        assert!(parse_sqlite_uri("sqlite://data/mosaics.db:x").is_err());
        assert!(parse_sqlite_uri("sqlite:///data/mosaics.db").is_err());
        assert!(parse_sqlite_uri("sqlite:///data/mosaics.db:bad name").is_err());
        assert!(parse_sqlite_uri("sqlite:///data/mosaics.db:").is_err());
    }

    #[test]
    fn test_metadata_table_name_is_reserved() {
        assert!(matches!(
            parse_sqlite_uri("sqlite:///m.db:mosaicjson_metadata"),
            Err(BackendError::InvalidUri { .. })
        ));

        let dir = TempDir::new().unwrap();
        assert!(matches!(
            SqliteAdapter::open(dir.path().join("m.db"), METADATA_TABLE),
            Err(BackendError::InvalidUri { .. })
        ));
    }

    #[test]
    fn test_uri_round_trips_through_parse() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("m.db");
        let adapter = SqliteAdapter::open(&path, "one").unwrap();
        assert_eq!(
            parse_sqlite_uri(adapter.uri()).unwrap(),
            (path, "one".to_string())
        );
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let adapter = SqliteAdapter::open(dir.path().join("m.db"), "one").unwrap();
        let original = doc(&[("0", &["a"]), ("1", &["b", "c"])]);
        adapter.write(&original, false).await.unwrap();

        let read = adapter.read().await.unwrap();
        assert_eq!(read.name(), Some("test"));
        assert_eq!(read.minzoom(), 1);
        assert!(read.tiles().is_empty());

        assert_eq!(
            adapter.list_quadkeys(&read).await.unwrap(),
            vec!["0".to_string(), "1".to_string()]
        );
        assert_eq!(
            adapter
                .get_assets(&read, &["1".to_string()])
                .await
                .unwrap(),
            vec!["b".to_string(), "c".to_string()]
        );
    }

    #[tokio::test]
    async fn test_write_without_overwrite_keeps_rows() {
        let dir = TempDir::new().unwrap();
        let adapter = SqliteAdapter::open(dir.path().join("m.db"), "one").unwrap();
        adapter.write(&doc(&[("0", &["a"])]), false).await.unwrap();

        let err = adapter
            .write(&doc(&[("2", &["z"])]), false)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::AlreadyExists { .. }));

        let current = adapter.read().await.unwrap();
        assert_eq!(
            adapter.list_quadkeys(&current).await.unwrap(),
            vec!["0".to_string()]
        );
    }

    #[tokio::test]
    async fn test_update_touches_changed_rows() {
        let dir = TempDir::new().unwrap();
        let adapter = SqliteAdapter::open(dir.path().join("m.db"), "one").unwrap();
        adapter
            .write(&doc(&[("0", &["a"]), ("1", &["b"])]), false)
            .await
            .unwrap();

        let current = adapter.read().await.unwrap();
        let (merged, changed) = adapter
            .apply_update(&current, &doc(&[("1", &["n"]), ("2", &["n"])]), MergeOrder::Prepend)
            .await
            .unwrap();
        assert_eq!(changed, 2);
        assert_eq!(merged.version(), "1.0.1");

        assert_eq!(
            adapter
                .get_assets(&current, &["0".to_string(), "1".to_string(), "2".to_string()])
                .await
                .unwrap(),
            vec!["a", "n", "b", "n"]
        );
    }

    #[tokio::test]
    async fn test_updates_from_two_handles_both_land() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("m.db");
        let first = SqliteAdapter::open(&path, "shared").unwrap();
        first.write(&doc(&[("0", &["a"])]), false).await.unwrap();
        let second = SqliteAdapter::open(&path, "shared").unwrap();

        // Both handles read the metadata before either updates.
        let seen_by_first = first.read().await.unwrap();
        let seen_by_second = second.read().await.unwrap();

        let (after_first, _) = first
            .apply_update(&seen_by_first, &doc(&[("0", &["x"])]), MergeOrder::Append)
            .await
            .unwrap();
        let (after_second, _) = second
            .apply_update(&seen_by_second, &doc(&[("0", &["y"])]), MergeOrder::Append)
            .await
            .unwrap();

        assert_eq!(after_first.version(), "1.0.1");
        assert_eq!(after_second.version(), "1.0.2");
        assert_eq!(first.read().await.unwrap().version(), "1.0.2");
        assert_eq!(
            first
                .get_assets(&seen_by_first, &["0".to_string()])
                .await
                .unwrap(),
            vec!["a", "x", "y"]
        );
    }

    #[tokio::test]
    async fn test_schema_version_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("m.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.pragma_update(None, "user_version", 7).unwrap();
        }
        let err = SqliteAdapter::open(&path, "one").unwrap_err();
        assert!(matches!(
            err,
            BackendError::SchemaIncompatible {
                found: 7,
                expected: SCHEMA_VERSION,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("m.db");
        let a = SqliteAdapter::open(&path, "alpha").unwrap();
        let b = SqliteAdapter::open(&path, "beta").unwrap();
        a.write(&doc(&[("0", &["a"])]), false).await.unwrap();
        b.write(&doc(&[("0", &["b"])]), false).await.unwrap();

        assert_eq!(
            SqliteAdapter::list_mosaics(&path).unwrap(),
            vec!["alpha".to_string(), "beta".to_string()]
        );

        a.delete().await.unwrap();
        assert_eq!(
            SqliteAdapter::list_mosaics(&path).unwrap(),
            vec!["beta".to_string()]
        );
        assert!(a.read().await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_close_releases_connection() {
        let dir = TempDir::new().unwrap();
        let mut adapter = SqliteAdapter::open(dir.path().join("m.db"), "one").unwrap();
        adapter.close().unwrap();
        assert!(matches!(
            adapter.read().await,
            Err(BackendError::Io { .. })
        ));
    }
}
