use std::path::Path;
use std::sync::Arc;

use depot_core::{Error, FileRecord, Page, Result};
use depot_storage::{BlobStore, LookupKey, MetadataStore, StorageError};
use tokio::io::AsyncRead;
use tracing::{debug, error, info, warn};

/// A record together with its blob content.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub record: FileRecord,
    pub content: Vec<u8>,
}

/// Keeps blobs and their metadata rows in agreement.
///
/// Holds no mutable state of its own; concurrent calls rely on the
/// metadata store's constraints and on atomic filesystem operations.
#[derive(Clone)]
pub struct Coordinator {
    metadata: Arc<dyn MetadataStore>,
}

impl Coordinator {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    /// One page of file records, in insertion order.
    pub async fn list_files(&self, limit: u64, offset: u64) -> Result<Page> {
        debug!(limit, offset, "ListFiles invoked");
        if limit == 0 {
            return Ok(Page::empty(limit, offset));
        }

        let records = self
            .metadata
            .list_paged(limit, offset)
            .await
            .map_err(|e| internal("list file records", e))?;

        Ok(Page {
            limit,
            offset,
            records,
        })
    }

    /// Store `content` as a new blob under `destination` and record it.
    ///
    /// Returns the new record; its `id` is freshly generated.
    pub async fn write_file<R>(
        &self,
        content: Option<R>,
        logical_name: &str,
        destination: &Path,
    ) -> Result<FileRecord>
    where
        R: AsyncRead + Unpin + Send,
    {
        let Some(mut content) = content else {
            return Err(Error::bad_request("missing file content"));
        };
        let name = logical_name.trim();
        if name.is_empty() {
            return Err(Error::bad_request("file name must not be empty"));
        }

        let record = FileRecord::new(name);
        debug!(id = %record.id, name, "WriteFile invoked");

        match self.metadata.find_by_key(LookupKey::Name, name).await {
            Ok(existing) => {
                warn!(name, existing_id = %existing.id, "Rejected write: name already stored");
                return Err(name_conflict(name));
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(internal("look up file name", e)),
        }

        let blobs = BlobStore::new(destination);
        let size = match blobs.write_exclusive(&record.id, &mut content).await {
            Ok(size) => size,
            Err(e) => {
                // The partial file is already gone; an existing blob under
                // this id belongs to someone else and must not be touched.
                error!(id = %record.id, error = %e, "Failed to write blob");
                return Err(Error::internal(format!("could not store content of '{}'", name)));
            }
        };

        let record = record.with_size(size);
        match self.metadata.insert(&record).await {
            Ok(()) => {
                info!(id = %record.id, name, bytes = size, "File stored");
                Ok(record)
            }
            Err(e) if e.is_unique_violation() => {
                // Lost a race on the name; nothing can reference this blob.
                warn!(id = %record.id, name, "Rejected write: name stored concurrently");
                discard_blob(&blobs, &record.id).await;
                Err(name_conflict(name))
            }
            Err(e) => {
                error!(
                    id = %record.id,
                    name,
                    error = %e,
                    "Blob written but metadata insert failed; blob is orphaned"
                );
                Err(Error::internal(format!("could not record metadata of '{}'", name)))
            }
        }
    }

    /// Fetch the record and full content of a stored file.
    pub async fn get_file(&self, id: &str, source: &Path) -> Result<StoredFile> {
        debug!(id, "GetFile invoked");

        let record = match self.metadata.find_by_key(LookupKey::Id, id).await {
            Ok(record) => record,
            Err(e) if e.is_not_found() => return Err(file_not_found(id)),
            Err(e) => return Err(internal("look up file record", e)),
        };

        let blobs = BlobStore::new(source);
        match blobs.exists(id).await {
            Ok(true) => {}
            Ok(false) => {
                error!(
                    id,
                    name = %record.logical_name,
                    "Integrity anomaly: record exists but blob is missing"
                );
                return Err(file_not_found(id));
            }
            Err(e) => return Err(classify_blob(id, "check blob", e)),
        }

        let content = blobs
            .read(id)
            .await
            .map_err(|e| classify_blob(id, "read blob", e))?;

        info!(id, bytes = content.len(), "File retrieved");
        Ok(StoredFile { record, content })
    }

    /// Remove a stored file. The blob goes first; the record is only
    /// touched once the blob is gone.
    pub async fn delete_file(&self, id: &str, source: &Path) -> Result<()> {
        debug!(id, "DeleteFile invoked");

        let blobs = BlobStore::new(source);
        match blobs.exists(id).await {
            Ok(true) => {}
            Ok(false) => return Err(file_not_found(id)),
            Err(e) => return Err(classify_blob(id, "check blob", e)),
        }

        blobs
            .remove(id)
            .await
            .map_err(|e| classify_blob(id, "remove blob", e))?;

        match self.metadata.delete_by_key(LookupKey::Id, id).await {
            Ok(()) => info!(id, "File deleted"),
            Err(e) if e.is_not_found() => {
                error!(id, "Integrity anomaly: deleted blob had no metadata record");
            }
            Err(e) => {
                error!(
                    id,
                    error = %e,
                    "Blob removed but metadata delete failed; record is orphaned"
                );
            }
        }
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        self.metadata
            .health_check()
            .await
            .map_err(|e| internal("reach metadata store", e))
    }
}

fn name_conflict(name: &str) -> Error {
    Error::conflict(format!("a file named '{}' already exists", name))
}

fn file_not_found(id: &str) -> Error {
    Error::not_found(format!("file {}", id))
}

/// Log the store failure and hand back an opaque internal error.
pub(crate) fn internal(action: &str, err: StorageError) -> Error {
    error!(error = %err, "Failed to {}", action);
    Error::internal(format!("failed to {}", action))
}

fn classify_blob(id: &str, action: &str, err: StorageError) -> Error {
    match err {
        StorageError::BlobNotFound(_) | StorageError::InvalidId(_) => file_not_found(id),
        other => internal(action, other),
    }
}

async fn discard_blob(blobs: &BlobStore, id: &str) {
    match blobs.remove(id).await {
        Ok(()) => debug!(id, "Discarded blob"),
        Err(e) if e.is_not_found() => {}
        Err(e) => warn!(id, error = %e, "Failed to discard blob"),
    }
}
