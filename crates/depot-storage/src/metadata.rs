//! Metadata store contract.

use async_trait::async_trait;
use depot_core::FileRecord;

use crate::Result;

/// Column a point lookup or delete is keyed on.
///
/// A closed set: callers choose a variant, never a column name, so no caller
/// text ever reaches the SQL statement itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKey {
    Id,
    Name,
}

impl LookupKey {
    pub fn column(&self) -> &'static str {
        match self {
            LookupKey::Id => "id",
            LookupKey::Name => "logical_name",
        }
    }
}

/// Persistence for [`FileRecord`] rows.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a new record. A duplicate id or logical name fails with
    /// [`StorageError::AlreadyExists`](crate::StorageError::AlreadyExists).
    async fn insert(&self, record: &FileRecord) -> Result<()>;

    /// Fetch the record whose `key` column equals `value`.
    async fn find_by_key(&self, key: LookupKey, value: &str) -> Result<FileRecord>;

    /// Delete the record whose `key` column equals `value`.
    async fn delete_by_key(&self, key: LookupKey, value: &str) -> Result<()>;

    /// One page of records in insertion order.
    async fn list_paged(&self, limit: u64, offset: u64) -> Result<Vec<FileRecord>>;

    /// Every record in insertion order.
    async fn list_all(&self) -> Result<Vec<FileRecord>>;

    /// Check database connectivity.
    async fn health_check(&self) -> Result<()>;
}
