//! File metadata domain model

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Metadata row describing one stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub logical_name: String,
    pub size_bytes: u64,
    #[serde(with = "time::serde::timestamp")]
    pub created_at: OffsetDateTime,
}

impl FileRecord {
    /// Build a record with a freshly generated identifier.
    pub fn new(logical_name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            logical_name: logical_name.into(),
            size_bytes: 0,
            // Whole seconds so the value survives a round trip through the store.
            created_at: OffsetDateTime::now_utc()
                .replace_nanosecond(0)
                .unwrap_or_else(|_| OffsetDateTime::now_utc()),
        }
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = size_bytes;
        self
    }
}

/// One window of the metadata listing, ordered by insertion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
    pub records: Vec<FileRecord>,
}

impl Page {
    pub fn empty(limit: u64, offset: u64) -> Self {
        Self {
            limit,
            offset,
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
