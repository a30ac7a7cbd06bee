//! Error types for depot-storage

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid blob id: {0}")]
    InvalidId(String),

    #[error("Invalid row: {0}")]
    InvalidRow(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::RecordNotFound(_) | StorageError::BlobNotFound(_)
        )
    }

    /// True for a uniqueness violation, whether already classified by the
    /// store or still a raw database error.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            StorageError::AlreadyExists(_) => true,
            StorageError::Database(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(StorageError::RecordNotFound("x".into()).is_not_found());
        assert!(StorageError::BlobNotFound("x".into()).is_not_found());
        assert!(!StorageError::AlreadyExists("x".into()).is_not_found());

        assert!(StorageError::AlreadyExists("x".into()).is_unique_violation());
        assert!(!StorageError::Database(sqlx::Error::RowNotFound).is_unique_violation());
        assert!(!StorageError::Io(std::io::Error::other("disk")).is_unique_violation());
    }
}
