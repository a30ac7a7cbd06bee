//! Write-once blob storage on the local filesystem
//!
//! Each blob lives at `{root}/{id}`. Writes land in a hidden temporary file
//! next to it and are published with a hard link, which fails if the target
//! already exists. A reader therefore sees either nothing or the complete
//! blob, and an interrupted write never occupies an id.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, instrument, warn};

use crate::{Result, StorageError};

const PARTIAL_MARKER: &str = ".partial-";

/// Blob store rooted at one directory.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if it doesn't exist.
    pub async fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Get the file path for an id.
    ///
    /// Ids are single path components; anything that could address a file
    /// outside the root, or collide with a temporary file, is rejected.
    pub fn path_for_id(&self, id: &str) -> Result<PathBuf> {
        let valid = !id.is_empty()
            && !id.starts_with('.')
            && !id.contains(['/', '\\', '\0'])
            && id != "..";
        if !valid {
            return Err(StorageError::InvalidId(id.to_string()));
        }
        Ok(self.root.join(id))
    }

    /// Copy `reader` into a new blob named `id`, returning the byte count.
    ///
    /// Fails with [`StorageError::AlreadyExists`] if the id is taken. On any
    /// failure no file is left under the id.
    #[instrument(skip(self, reader), fields(root = %self.root.display()))]
    pub async fn write_exclusive<R>(&self, id: &str, reader: &mut R) -> Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let path = self.path_for_id(id)?;
        self.ensure_root().await?;

        let temp_path = self
            .root
            .join(format!(".{}{}{}", id, PARTIAL_MARKER, uuid::Uuid::new_v4()));

        let written = match copy_to_new_file(&temp_path, reader).await {
            Ok(n) => n,
            Err(e) => {
                discard(&temp_path).await;
                return Err(e);
            }
        };

        let linked = fs::hard_link(&temp_path, &path).await;
        discard(&temp_path).await;
        match linked {
            Ok(()) => {
                debug!(bytes = written, "Blob written");
                Ok(written)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StorageError::AlreadyExists(format!("blob {}", id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Check if blob exists
    pub async fn exists(&self, id: &str) -> Result<bool> {
        let path = self.path_for_id(id)?;
        Ok(fs::try_exists(&path).await?)
    }

    /// Read the full content of a blob.
    #[instrument(skip(self))]
    pub async fn read(&self, id: &str) -> Result<Vec<u8>> {
        let path = self.path_for_id(id)?;
        fs::read(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::BlobNotFound(id.to_string())
            } else {
                StorageError::Io(e)
            }
        })
    }

    /// Remove a blob. Unlink is atomic: readers see the whole file or none.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: &str) -> Result<()> {
        let path = self.path_for_id(id)?;
        fs::remove_file(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::BlobNotFound(id.to_string())
            } else {
                StorageError::Io(e)
            }
        })
    }

    /// Ids of every published blob, sorted. A missing root is empty.
    pub async fn list_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for (name, _) in self.entries().await? {
            if !name.starts_with('.') {
                ids.push(name);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Temporary files left behind by interrupted writes.
    pub async fn list_partials(&self) -> Result<Vec<PathBuf>> {
        let mut partials: Vec<PathBuf> = self
            .entries()
            .await?
            .into_iter()
            .filter(|(name, _)| is_partial(name))
            .map(|(_, path)| path)
            .collect();
        partials.sort();
        Ok(partials)
    }

    /// Delete leftover temporary files, returning how many were removed.
    pub async fn remove_partials(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.list_partials().await? {
            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }

    async fn entries(&self) -> Result<Vec<(String, PathBuf)>> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                entries.push((name.to_string(), entry.path()));
            }
        }
        Ok(entries)
    }
}

fn is_partial(name: &str) -> bool {
    name.starts_with('.') && name.contains(PARTIAL_MARKER)
}

async fn copy_to_new_file<R>(path: &Path, reader: &mut R) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    let written = tokio::io::copy(reader, &mut file).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await
        && e.kind() != ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "Failed to remove temporary blob file");
    }
}
