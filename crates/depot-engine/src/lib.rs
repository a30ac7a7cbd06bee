//! Storage coordination for depot
//!
//! The [`Coordinator`] is the only component that touches both the metadata
//! store and the blob directory, and the only place their agreement is
//! enforced.

pub mod coordinator;
pub mod reconcile;

pub use coordinator::{Coordinator, StoredFile};
pub use reconcile::ReconcileReport;
