//! SQLite-backed metadata store

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use depot_core::FileRecord;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use time::OffsetDateTime;
use tracing::{debug, instrument};

use crate::metadata::{LookupKey, MetadataStore};
use crate::{Result, StorageError};

// `seq` is the paging order: AUTOINCREMENT never hands out a value twice, so
// the order of surviving rows is stable across deletes.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    logical_name TEXT NOT NULL UNIQUE,
    size_bytes INTEGER NOT NULL,
    created_at INTEGER NOT NULL
)
"#;

type FileRow = (String, String, i64, i64);

/// Metadata store backed by a SQLite database file.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path` and run migrations.
    pub async fn new(path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        debug!(path = %path.display(), "Metadata store opened");
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn record_from_row(row: FileRow) -> Result<FileRecord> {
    let (id, logical_name, size_bytes, created_at) = row;
    let created_at = OffsetDateTime::from_unix_timestamp(created_at)
        .map_err(|e| StorageError::InvalidRow(format!("created_at for {}: {}", id, e)))?;
    let size_bytes = u64::try_from(size_bytes)
        .map_err(|_| StorageError::InvalidRow(format!("negative size for {}", id)))?;

    Ok(FileRecord {
        id,
        logical_name,
        size_bytes,
        created_at,
    })
}

fn clamp(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl MetadataStore for SqliteStore {
    #[instrument(skip(self, record), fields(id = %record.id))]
    async fn insert(&self, record: &FileRecord) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO files (id, logical_name, size_bytes, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.logical_name)
        .bind(clamp(record.size_bytes))
        .bind(record.created_at.unix_timestamp())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => {
                debug!(rows = done.rows_affected(), "Inserted file record");
                Ok(())
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StorageError::AlreadyExists(format!(
                    "record with id '{}' or name '{}'",
                    record.id, record.logical_name
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn find_by_key(&self, key: LookupKey, value: &str) -> Result<FileRecord> {
        let sql = match key {
            LookupKey::Id => {
                "SELECT id, logical_name, size_bytes, created_at FROM files WHERE id = ?"
            }
            LookupKey::Name => {
                "SELECT id, logical_name, size_bytes, created_at FROM files WHERE logical_name = ?"
            }
        };

        let row: Option<FileRow> = sqlx::query_as(sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => record_from_row(row),
            None => Err(StorageError::RecordNotFound(format!(
                "{} = '{}'",
                key.column(),
                value
            ))),
        }
    }

    #[instrument(skip(self))]
    async fn delete_by_key(&self, key: LookupKey, value: &str) -> Result<()> {
        let sql = match key {
            LookupKey::Id => "DELETE FROM files WHERE id = ?",
            LookupKey::Name => "DELETE FROM files WHERE logical_name = ?",
        };

        let done = sqlx::query(sql).bind(value).execute(&self.pool).await?;
        if done.rows_affected() == 0 {
            return Err(StorageError::RecordNotFound(format!(
                "{} = '{}'",
                key.column(),
                value
            )));
        }

        debug!(rows = done.rows_affected(), "Deleted file record");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_paged(&self, limit: u64, offset: u64) -> Result<Vec<FileRecord>> {
        let rows: Vec<FileRow> = sqlx::query_as(
            "SELECT id, logical_name, size_bytes, created_at FROM files ORDER BY seq LIMIT ? OFFSET ?",
        )
        .bind(clamp(limit))
        .bind(clamp(offset))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(record_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn list_all(&self) -> Result<Vec<FileRecord>> {
        let rows: Vec<FileRow> = sqlx::query_as(
            "SELECT id, logical_name, size_bytes, created_at FROM files ORDER BY seq",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(record_from_row).collect()
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_store() -> (SqliteStore, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("meta.db"), 1).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let (store, _dir) = create_test_store().await;
        let record = FileRecord::new("notes.txt").with_size(12);
        store.insert(&record).await.unwrap();

        let by_id = store.find_by_key(LookupKey::Id, &record.id).await.unwrap();
        assert_eq!(by_id, record);

        let by_name = store.find_by_key(LookupKey::Name, "notes.txt").await.unwrap();
        assert_eq!(by_name.id, record.id);
    }

    #[tokio::test]
    async fn test_find_missing_is_not_found() {
        let (store, _dir) = create_test_store().await;
        let err = store.find_by_key(LookupKey::Id, "nope").await.unwrap_err();
        assert!(matches!(err, StorageError::RecordNotFound(_)));
    }

    #[tokio::test]
    async fn test_duplicate_name_is_unique_violation() {
        let (store, _dir) = create_test_store().await;
        store.insert(&FileRecord::new("a.txt")).await.unwrap();

        let err = store.insert(&FileRecord::new("a.txt")).await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_lookup_value_is_bound_not_interpolated() {
        let (store, _dir) = create_test_store().await;
        store.insert(&FileRecord::new("a.txt")).await.unwrap();

        let err = store
            .find_by_key(LookupKey::Name, "x' OR '1'='1")
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = store
            .delete_by_key(LookupKey::Name, "x' OR '1'='1")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_key() {
        let (store, _dir) = create_test_store().await;
        let record = FileRecord::new("gone.bin");
        store.insert(&record).await.unwrap();

        store.delete_by_key(LookupKey::Id, &record.id).await.unwrap();
        let err = store.delete_by_key(LookupKey::Id, &record.id).await.unwrap_err();
        assert!(matches!(err, StorageError::RecordNotFound(_)));
    }

    #[tokio::test]
    async fn test_paging_follows_insertion_order() {
        let (store, _dir) = create_test_store().await;
        let mut ids = Vec::new();
        for i in 0..7 {
            let record = FileRecord::new(format!("file-{}", i));
            ids.push(record.id.clone());
            store.insert(&record).await.unwrap();
        }

        let mut seen = Vec::new();
        let mut offset = 0;
        loop {
            let page = store.list_paged(3, offset).await.unwrap();
            if page.is_empty() {
                break;
            }
            seen.extend(page.into_iter().map(|r| r.id));
            offset += 3;
        }
        assert_eq!(seen, ids);

        assert!(store.list_paged(0, 0).await.unwrap().is_empty());
        assert!(store.list_paged(10, 100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_order_is_stable_across_deletes() {
        let (store, _dir) = create_test_store().await;
        let first = FileRecord::new("first");
        let second = FileRecord::new("second");
        let third = FileRecord::new("third");
        for r in [&first, &second, &third] {
            store.insert(r).await.unwrap();
        }

        store.delete_by_key(LookupKey::Id, &second.id).await.unwrap();
        let again = FileRecord::new("second");
        store.insert(&again).await.unwrap();

        let names: Vec<_> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(names, vec![first.id, third.id, again.id]);
    }

    #[tokio::test]
    async fn test_reopen_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("meta.db");
        let record = FileRecord::new("persisted");
        {
            let store = SqliteStore::new(&path, 1).await.unwrap();
            store.insert(&record).await.unwrap();
            store.health_check().await.unwrap();
            store.close().await;
        }

        let store = SqliteStore::new(&path, 1).await.unwrap();
        let found = store.find_by_key(LookupKey::Id, &record.id).await.unwrap();
        assert_eq!(found.logical_name, "persisted");
    }
}
