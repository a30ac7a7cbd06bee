//! Core domain models for depot
//!
//! This crate contains:
//! - Domain models (FileRecord, Page)
//! - The error taxonomy shared by the coordinator and the HTTP boundary
//! - Log layer definitions for runtime level control

pub mod error;
pub mod observability;
pub mod record;

pub use error::{Error, ErrorKind, Result};
pub use observability::{LevelControl, LogLayer, LogLevels, parse_level};
pub use record::{FileRecord, Page};
