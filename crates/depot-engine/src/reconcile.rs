//! Out-of-band consistency check between blobs and metadata.
//!
//! Reports orphans; it never deletes a blob or a record. The only thing it
//! may remove is temporary files from interrupted writes.

use std::collections::HashSet;
use std::path::Path;

use depot_core::{FileRecord, Result};
use depot_storage::BlobStore;
use serde::Serialize;
use tracing::{info, warn};

use crate::coordinator::{Coordinator, internal};

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    /// Blobs on disk with no metadata record.
    pub orphan_blobs: Vec<String>,
    /// Records whose blob is missing.
    pub orphan_records: Vec<FileRecord>,
    /// Temporary write files found.
    pub partial_files: usize,
    pub partials_removed: usize,
}

impl ReconcileReport {
    pub fn is_consistent(&self) -> bool {
        self.orphan_blobs.is_empty() && self.orphan_records.is_empty()
    }
}

impl Coordinator {
    /// Compare every record against the blobs under `source`.
    pub async fn reconcile(&self, source: &Path, prune_partials: bool) -> Result<ReconcileReport> {
        let blobs = BlobStore::new(source);

        let records = self
            .metadata()
            .list_all()
            .await
            .map_err(|e| internal("list file records", e))?;
        let blob_ids = blobs
            .list_ids()
            .await
            .map_err(|e| internal("list blobs", e))?;
        let partials = blobs
            .list_partials()
            .await
            .map_err(|e| internal("list temporary files", e))?;

        let recorded: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let on_disk: HashSet<&str> = blob_ids.iter().map(String::as_str).collect();

        let orphan_blobs: Vec<String> = blob_ids
            .iter()
            .filter(|id| !recorded.contains(id.as_str()))
            .cloned()
            .collect();
        let orphan_records: Vec<FileRecord> = records
            .iter()
            .filter(|r| !on_disk.contains(r.id.as_str()))
            .cloned()
            .collect();

        for id in &orphan_blobs {
            warn!(id = %id, "Orphan blob: no metadata record");
        }
        for record in &orphan_records {
            warn!(id = %record.id, name = %record.logical_name, "Orphan record: blob missing");
        }

        let partials_removed = if prune_partials && !partials.is_empty() {
            blobs
                .remove_partials()
                .await
                .map_err(|e| internal("remove temporary files", e))?
        } else {
            0
        };

        let report = ReconcileReport {
            orphan_blobs,
            orphan_records,
            partial_files: partials.len(),
            partials_removed,
        };
        info!(
            records = records.len(),
            blobs = blob_ids.len(),
            orphan_blobs = report.orphan_blobs.len(),
            orphan_records = report.orphan_records.len(),
            partials = report.partial_files,
            "Reconciliation finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_storage::{MetadataStore, SqliteStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_reports_both_kinds_of_orphan() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("files");
        let store = Arc::new(SqliteStore::new(dir.path().join("meta.db"), 1).await.unwrap());
        let coordinator = Coordinator::new(store.clone());

        let kept = coordinator
            .write_file(Some(&b"fine"[..]), "kept", &folder)
            .await
            .unwrap();

        // record without blob
        let lost = coordinator
            .write_file(Some(&b"lost"[..]), "lost", &folder)
            .await
            .unwrap();
        std::fs::remove_file(folder.join(&lost.id)).unwrap();

        // blob without record
        std::fs::write(folder.join("stray-id"), b"stray").unwrap();
        // interrupted write
        std::fs::write(folder.join(".x.partial-1"), b"half").unwrap();

        let report = coordinator.reconcile(&folder, false).await.unwrap();
        assert!(!report.is_consistent());
        assert_eq!(report.orphan_blobs, vec!["stray-id".to_string()]);
        assert_eq!(report.orphan_records.len(), 1);
        assert_eq!(report.orphan_records[0].id, lost.id);
        assert_eq!(report.partial_files, 1);
        assert_eq!(report.partials_removed, 0);

        // Nothing was repaired.
        assert!(folder.join("stray-id").exists());
        assert!(store.list_all().await.unwrap().iter().any(|r| r.id == lost.id));
        assert!(folder.join(&kept.id).exists());
    }

    #[tokio::test]
    async fn test_prune_removes_only_partials() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("files");
        let store = Arc::new(SqliteStore::new(dir.path().join("meta.db"), 1).await.unwrap());
        let coordinator = Coordinator::new(store);

        coordinator
            .write_file(Some(&b"ok"[..]), "ok", &folder)
            .await
            .unwrap();
        std::fs::write(folder.join(".y.partial-2"), b"half").unwrap();

        let report = coordinator.reconcile(&folder, true).await.unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.partials_removed, 1);
        assert!(!folder.join(".y.partial-2").exists());
    }
}
