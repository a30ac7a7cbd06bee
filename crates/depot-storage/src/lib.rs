//! Storage layer for depot
//!
//! This crate provides:
//! - The metadata store contract and its SQLite implementation
//! - Blob storage (one file per identifier, write-once)

pub mod blob;
pub mod db;
pub mod error;
pub mod metadata;

pub use blob::BlobStore;
pub use db::SqliteStore;
pub use error::{Result, StorageError};
pub use metadata::{LookupKey, MetadataStore};
